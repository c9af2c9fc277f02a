//! 과거 캔들 데이터를 제공하는 거래소 어댑터.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - `KlineSource` trait: 심볼 목록 및 구간 캔들 조회 인터페이스
//! - Binance REST 커넥터 (요청 간격 제한 포함)
//! - 시뮬레이션 거래소 (상장일/공백 구간을 재현하는 결정적 데이터 소스)

pub mod connector;
pub mod error;
pub mod simulated;
pub mod traits;

pub use connector::binance::{BinanceClient, BinanceConfig, MAX_KLINE_LIMIT};
pub use error::*;
pub use simulated::{SimulatedListing, SimulatedSource, SourceCall};
pub use traits::*;
