//! # Kline Core
//!
//! 캔들 백필 크롤러의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! 이 크레이트는 워크스페이스 전반에서 사용되는 기본 타입을 제공합니다:
//! - 심볼 및 캔들 간격 정의
//! - OHLCV 캔들(Bar)과 진행 기록(ProgressRecord)
//! - 윈도우/간격 계산 (UTC 기준)
//! - 시계 추상화
//! - 로깅 인프라

pub mod clock;
pub mod domain;
pub mod error;
pub mod logging;
pub mod types;
pub mod window;

pub use clock::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
pub use types::*;
pub use window::*;
