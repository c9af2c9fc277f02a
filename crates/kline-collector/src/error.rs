//! 에러 타입 정의.

use kline_core::CoreError;
use kline_exchange::ExchangeError;
use kline_store::DataError;
use thiserror::Error;

/// Collector 에러 타입
#[derive(Debug, Error)]
pub enum CollectorError {
    /// 설정 에러 (시작 시점에 치명적)
    #[error("Configuration error: {0}")]
    Config(String),

    /// 거래소 전송 실패
    #[error("Exchange error: {0}")]
    Exchange(#[from] ExchangeError),

    /// 저장소 에러
    #[error("Database error: {0}")]
    Database(#[from] DataError),

    /// 도메인 값 에러
    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, CollectorError>;
