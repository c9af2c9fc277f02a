//! 시뮬레이션 거래소.
//!
//! 상장일, 점검 공백, 상장 폐지를 결정적으로 재현하는 인메모리 데이터 소스입니다.
//! 캔들은 요청 시점에 규칙으로 생성되므로 수년치 분봉도 메모리를 쓰지 않습니다.
//!
//! 모든 요청은 호출 로그에 남고, 심볼별로 전송 실패를 주입할 수 있습니다.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use kline_core::{truncate, Bar, Interval, Symbol};
use rust_decimal::Decimal;

use crate::traits::{ExchangeResult, KlineSource};
use crate::ExchangeError;

/// 시뮬레이션 심볼의 거래 이력.
#[derive(Debug, Clone)]
pub struct SimulatedListing {
    /// 첫 분봉 시각
    pub listed_at: DateTime<Utc>,
    /// 상장 폐지 시각 (이 시각부터 캔들 없음)
    pub delisted_at: Option<DateTime<Utc>>,
    /// 캔들이 없는 구간 `[start, end)`
    pub gaps: Vec<(DateTime<Utc>, DateTime<Utc>)>,
}

impl SimulatedListing {
    /// `listed_at`부터 계속 거래되는 심볼.
    pub fn listed_at(listed_at: DateTime<Utc>) -> Self {
        Self {
            listed_at,
            delisted_at: None,
            gaps: Vec::new(),
        }
    }

    /// 공백 구간 추가.
    pub fn with_gap(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.gaps.push((start, end));
        self
    }

    /// 상장 폐지 시각 지정.
    pub fn delisted_at(mut self, at: DateTime<Utc>) -> Self {
        self.delisted_at = Some(at);
        self
    }

    /// `[lo, hi)` 안에 거래가 있었던 분이 하나라도 있는지 확인.
    fn has_activity(&self, lo: DateTime<Utc>, hi: DateTime<Utc>) -> bool {
        let mut cursor = lo.max(self.listed_at);
        let hi = match self.delisted_at {
            Some(delisted) => hi.min(delisted),
            None => hi,
        };

        while cursor < hi {
            match self
                .gaps
                .iter()
                .find(|(start, end)| *start <= cursor && cursor < *end)
            {
                Some((_, end)) => cursor = *end,
                None => return true,
            }
        }
        false
    }
}

/// 시뮬레이션 거래소에 들어온 캔들 요청.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCall {
    pub symbol: Symbol,
    pub interval: Interval,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub limit: u32,
}

/// 결정적 인메모리 거래소.
pub struct SimulatedSource {
    /// 이 시각 이후에 시작하는 캔들은 아직 없음
    now: DateTime<Utc>,
    /// 상장 순서
    symbols: Vec<Symbol>,
    listings: HashMap<Symbol, SimulatedListing>,
    calls: Mutex<Vec<SourceCall>>,
    list_calls: AtomicUsize,
    /// 심볼별 정상 응답 허용 횟수 (초과 시 전송 실패)
    failures: Mutex<HashMap<Symbol, usize>>,
}

impl SimulatedSource {
    /// 새 시뮬레이션 거래소 생성.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            symbols: Vec::new(),
            listings: HashMap::new(),
            calls: Mutex::new(Vec::new()),
            list_calls: AtomicUsize::new(0),
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// 심볼 추가 (목록 순서 유지).
    pub fn with_listing(mut self, symbol: impl Into<String>, listing: SimulatedListing) -> Self {
        let symbol = Symbol::new(symbol);
        if !self.listings.contains_key(&symbol) {
            self.symbols.push(symbol.clone());
        }
        self.listings.insert(symbol, listing);
        self
    }

    /// 해당 심볼의 캔들 요청을 `successes`번 성공시킨 뒤부터 실패시킵니다.
    pub fn fail_after(&self, symbol: &str, successes: usize) {
        let mut failures = self.failures.lock().unwrap_or_else(|e| e.into_inner());
        failures.insert(Symbol::new(symbol), successes);
    }

    /// 주입된 실패 제거.
    pub fn clear_failures(&self) {
        self.failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    /// 전체 캔들 요청 로그.
    pub fn calls(&self) -> Vec<SourceCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// 특정 심볼의 캔들 요청 로그.
    pub fn calls_for(&self, symbol: &str) -> Vec<SourceCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.symbol.as_str() == symbol)
            .collect()
    }

    /// 요청 로그 초기화.
    pub fn clear_calls(&self) {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// `list_symbols` 호출 횟수.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// 지정한 시각의 캔들 생성. 가격은 분 인덱스에서 결정적으로 계산합니다.
    fn make_bar(symbol: &Symbol, interval: Interval, open_time: DateTime<Utc>) -> Bar {
        let minute = open_time.timestamp().div_euclid(60);
        let base = Decimal::from(100 + minute.rem_euclid(50));
        Bar {
            symbol: symbol.clone(),
            interval,
            open_time,
            close_time: open_time + interval.duration() - Duration::milliseconds(1),
            open: base,
            high: base + Decimal::ONE,
            low: base - Decimal::ONE,
            close: base + Decimal::new(5, 1),
            volume: Decimal::from(10),
            quote_volume: base * Decimal::from(10),
            trade_count: 10,
            taker_buy_base_volume: Decimal::from(4),
            taker_buy_quote_volume: base * Decimal::from(4),
        }
    }

    fn check_failure(&self, symbol: &Symbol) -> ExchangeResult<()> {
        let failures = self.failures.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(successes) = failures.get(symbol) {
            let made = self
                .calls
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .iter()
                .filter(|c| &c.symbol == symbol)
                .count();
            // 현재 요청은 이미 로그에 포함됨
            if made > *successes {
                return Err(ExchangeError::NetworkError(format!(
                    "simulated transport failure for {}",
                    symbol
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl KlineSource for SimulatedSource {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn list_symbols(&self) -> ExchangeResult<Vec<Symbol>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.symbols.clone())
    }

    async fn get_bars(
        &self,
        symbol: &Symbol,
        interval: Interval,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: u32,
    ) -> ExchangeResult<Vec<Bar>> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(SourceCall {
                symbol: symbol.clone(),
                interval,
                start,
                end,
                limit,
            });
        self.check_failure(symbol)?;

        let listing = self
            .listings
            .get(symbol)
            .ok_or_else(|| ExchangeError::SymbolNotFound(symbol.to_string()))?;

        let step = interval.duration();
        let mut open_time = truncate(start, interval);
        if open_time < start {
            open_time += step;
        }

        let mut bars = Vec::new();
        while open_time <= end && open_time <= self.now && bars.len() < limit as usize {
            let bar_end = (open_time + step).min(self.now + Duration::minutes(1));
            if listing.has_activity(open_time, bar_end) {
                bars.push(Self::make_bar(symbol, interval, open_time));
            }
            open_time += step;
        }

        Ok(bars)
    }
}
