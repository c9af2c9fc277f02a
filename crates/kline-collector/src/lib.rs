//! Gap-aware kline backfill crawler.
//!
//! 이 crate는 거래소 분봉 이력을 상장 시점부터 현재까지 저장하는 크롤러를 제공합니다:
//! - 시작일 탐색 (일봉 → 분봉 2단계)
//! - 공백 구간을 건너뛰는 페이지 단위 크롤링
//! - 심볼 필터링, 진행 기록, 재개 지점 관리

pub mod config;
pub mod error;
pub mod modules;
pub mod observer;
pub mod stats;

pub use config::{CollectorConfig, CrawlConfig, CrawlOverrides};
pub use error::{CollectorError, Result};
pub use modules::{Orchestrator, Resolution, StartDateResolver, SymbolOutcome};
pub use observer::{CrawlObserver, NoopObserver, TracingObserver};
pub use stats::CollectionStats;
