//! 거래소 어댑터 trait 정의.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kline_core::{Bar, Interval, Symbol};

use crate::ExchangeError;

/// 거래소 작업을 위한 Result 타입.
pub type ExchangeResult<T> = Result<T, ExchangeError>;

/// 과거 캔들 데이터 소스.
///
/// 빈 결과는 "해당 구간에 데이터 없음"을 뜻합니다. 요청 한도 초과나 전송
/// 실패는 반드시 `ExchangeError`로 구분해서 반환해야 합니다.
#[async_trait]
pub trait KlineSource: Send + Sync {
    /// 거래소 이름 반환.
    fn name(&self) -> &str;

    /// 거래 가능한 심볼 전체 조회.
    async fn list_symbols(&self) -> ExchangeResult<Vec<Symbol>>;

    /// `[start, end]` 구간의 캔들을 시간순으로 최대 `limit`개 조회.
    ///
    /// `open_time`이 구간 안에 있는 캔들만 반환합니다.
    async fn get_bars(
        &self,
        symbol: &Symbol,
        interval: Interval,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: u32,
    ) -> ExchangeResult<Vec<Bar>>;
}
