//! 시장 데이터 타입.
//!
//! - `Bar` - OHLCV 캔들스틱
//! - `ProgressRecord` - 심볼별로 발견된 최초 캔들 시각

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{Interval, Price, Quantity, Symbol};
use crate::window::{is_aligned, truncate};

/// OHLCV 캔들스틱.
///
/// 거래소 태그는 저장 시점에 붙습니다 (`insert_bars(bars, exchange)`).
/// 캔들의 고유 키는 `(exchange, symbol, open_time)`입니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// 거래 심볼
    pub symbol: Symbol,
    /// 캔들 간격
    pub interval: Interval,
    /// 캔들 시작 시간
    pub open_time: DateTime<Utc>,
    /// 캔들 종료 시간
    pub close_time: DateTime<Utc>,
    /// 시가
    pub open: Price,
    /// 고가
    pub high: Price,
    /// 저가
    pub low: Price,
    /// 종가
    pub close: Price,
    /// 거래량 (기준 자산 단위)
    pub volume: Quantity,
    /// 거래대금 (호가 자산 단위)
    pub quote_volume: Decimal,
    /// 체결 건수
    pub trade_count: u64,
    /// 시장가 매수 체결량 (기준 자산)
    pub taker_buy_base_volume: Decimal,
    /// 시장가 매수 체결대금 (호가 자산)
    pub taker_buy_quote_volume: Decimal,
}

impl Bar {
    /// `open_time`을 캔들 간격 경계로 내린 캔들을 반환합니다.
    ///
    /// 저장 전에 항상 호출합니다. 소스가 정렬된 값을 준다고 가정하지 않습니다.
    pub fn truncated(mut self) -> Self {
        self.open_time = truncate(self.open_time, self.interval);
        self
    }

    /// `open_time`이 간격 경계에 맞는지 확인.
    pub fn is_aligned(&self) -> bool {
        is_aligned(self.open_time, self.interval)
    }
}

/// 심볼의 최초 캔들 시각 기록.
///
/// 한 번 저장되면 정답으로 취급하며 다시 계산하지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    /// 심볼
    pub symbol: Symbol,
    /// 최초 분봉 시작 시각
    pub start_date: DateTime<Utc>,
}

impl ProgressRecord {
    /// 새 진행 기록 생성.
    pub fn new(symbol: Symbol, start_date: DateTime<Utc>) -> Self {
        Self { symbol, start_date }
    }
}
