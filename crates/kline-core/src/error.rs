//! 핵심 도메인 에러 타입.

use thiserror::Error;

/// 도메인 값 파싱/검증 에러.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// 잘못된 심볼 토큰
    #[error("잘못된 심볼: {0}")]
    InvalidSymbol(String),

    /// 지원하지 않는 캔들 간격
    #[error("잘못된 간격: {0}")]
    InvalidInterval(String),
}
