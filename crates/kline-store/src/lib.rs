//! 캔들 데이터 저장소.
//!
//! 이 crate는 다음을 제공합니다:
//! - `KlineStore` trait: 진행 기록/캔들 저장 인터페이스
//! - PostgreSQL 저장소 (UNNEST 파라미터 일괄 삽입, 마이그레이션)
//! - 인메모리 저장소 (테스트/드라이런)
//! - 테이블 크기 지표
//! - 심볼별 크롤링 결과 기록

pub mod crawl_log;
pub mod error;
pub mod memory;
pub mod metrics;
pub mod postgres;
pub mod traits;

pub use crawl_log::{CrawlLogEntry, LogLevel};
pub use error::{DataError, Result};
pub use memory::MemoryKlineStore;
pub use metrics::{format_bytes, TableMetrics};
pub use postgres::{DatabaseConfig, PgKlineStore};
pub use traits::*;
