//! 인메모리 저장소.
//!
//! PostgreSQL과 같은 고유성 규칙을 따르는 테스트/드라이런용 구현입니다.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kline_core::{Bar, ProgressRecord, Symbol};

use crate::crawl_log::CrawlLogEntry;
use crate::error::{DataError, Result};
use crate::traits::{validate_page, KlineStore};

type BarKey = (String, Symbol);

#[derive(Default)]
struct State {
    /// (exchange, symbol) -> open_time -> bar
    bars: HashMap<BarKey, BTreeMap<DateTime<Utc>, Bar>>,
    progress: BTreeMap<Symbol, DateTime<Utc>>,
    /// 기록 순서대로
    logs: Vec<CrawlLogEntry>,
    insert_calls: usize,
    /// 남은 정상 insert 횟수 (0이 되면 이후 insert 실패)
    insert_budget: Option<usize>,
}

/// 인메모리 캔들 저장소.
#[derive(Default)]
pub struct MemoryKlineStore {
    state: Mutex<State>,
}

impl MemoryKlineStore {
    /// 빈 저장소 생성.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 저장된 캔들 (open_time 순).
    pub fn bars(&self, symbol: &str, exchange: &str) -> Vec<Bar> {
        let key = (exchange.to_string(), Symbol::new(symbol));
        self.lock()
            .bars
            .get(&key)
            .map(|bars| bars.values().cloned().collect())
            .unwrap_or_default()
    }

    /// 전체 캔들 수.
    pub fn bar_count(&self) -> usize {
        self.lock().bars.values().map(|bars| bars.len()).sum()
    }

    /// `insert_bars` 호출 횟수 (빈 페이지 포함).
    pub fn insert_calls(&self) -> usize {
        self.lock().insert_calls
    }

    /// 저장된 크롤링 기록 (기록 순).
    pub fn logs(&self) -> Vec<CrawlLogEntry> {
        self.lock().logs.clone()
    }

    /// `successes`번 이후의 insert를 실패시킵니다.
    pub fn fail_inserts_after(&self, successes: usize) {
        self.lock().insert_budget = Some(successes);
    }

    /// 주입된 insert 실패 제거.
    pub fn clear_failures(&self) {
        self.lock().insert_budget = None;
    }
}

#[async_trait]
impl KlineStore for MemoryKlineStore {
    async fn get_progress(&self, symbol: &Symbol) -> Result<Option<DateTime<Utc>>> {
        Ok(self.lock().progress.get(symbol).copied())
    }

    async fn set_progress(&self, symbol: &Symbol, start_date: DateTime<Utc>) -> Result<()> {
        self.lock()
            .progress
            .entry(symbol.clone())
            .or_insert(start_date);
        Ok(())
    }

    async fn get_all_progress(&self) -> Result<Vec<ProgressRecord>> {
        Ok(self
            .lock()
            .progress
            .iter()
            .map(|(symbol, start_date)| ProgressRecord::new(symbol.clone(), *start_date))
            .collect())
    }

    async fn get_latest_close(
        &self,
        symbol: &Symbol,
        exchange: &str,
    ) -> Result<Option<DateTime<Utc>>> {
        let key = (exchange.to_string(), symbol.clone());
        Ok(self
            .lock()
            .bars
            .get(&key)
            .and_then(|bars| bars.values().map(|b| b.close_time).max()))
    }

    async fn insert_bars(&self, bars: &[Bar], exchange: &str) -> Result<u64> {
        let mut state = self.lock();
        state.insert_calls += 1;

        if let Some(budget) = state.insert_budget.as_mut() {
            if *budget == 0 {
                return Err(DataError::InsertError(
                    "simulated insert failure".to_string(),
                ));
            }
            *budget -= 1;
        }

        validate_page(bars)?;

        let mut inserted = 0;
        for bar in bars {
            let key = (exchange.to_string(), bar.symbol.clone());
            let series = state.bars.entry(key).or_default();
            if !series.contains_key(&bar.open_time) {
                series.insert(bar.open_time, bar.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn append_log(&self, entry: &CrawlLogEntry) -> Result<()> {
        self.lock().logs.push(entry.clone());
        Ok(())
    }

    async fn recent_logs(&self, limit: usize) -> Result<Vec<CrawlLogEntry>> {
        Ok(self.lock().logs.iter().rev().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use kline_core::Interval;
    use rust_decimal_macros::dec;

    use crate::crawl_log::LogLevel;

    fn bar(symbol: &str, open_time: DateTime<Utc>) -> Bar {
        Bar {
            symbol: Symbol::new(symbol),
            interval: Interval::M1,
            open_time,
            close_time: open_time + Duration::minutes(1) - Duration::milliseconds(1),
            open: dec!(1.0),
            high: dec!(1.2),
            low: dec!(0.9),
            close: dec!(1.1),
            volume: dec!(5),
            quote_volume: dec!(5.5),
            trade_count: 3,
            taker_buy_base_volume: dec!(2),
            taker_buy_quote_volume: dec!(2.2),
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2019, 6, 1, 0, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_insert_skips_existing_open_times() {
        let store = MemoryKlineStore::new();
        let first = vec![bar("ETHBTC", t0()), bar("ETHBTC", t0() + Duration::minutes(1))];
        let second = vec![
            bar("ETHBTC", t0() + Duration::minutes(1)),
            bar("ETHBTC", t0() + Duration::minutes(2)),
        ];

        assert_eq!(store.insert_bars(&first, "Binance").await.unwrap(), 2);
        assert_eq!(store.insert_bars(&second, "Binance").await.unwrap(), 1);
        assert_eq!(store.bar_count(), 3);

        // 거래소가 다르면 별개의 행
        assert_eq!(store.insert_bars(&first, "Other").await.unwrap(), 2);
        assert_eq!(store.bars("ETHBTC", "Binance").len(), 3);
    }

    #[tokio::test]
    async fn test_latest_close() {
        let store = MemoryKlineStore::new();
        let symbol = Symbol::new("ETHBTC");
        assert_eq!(store.get_latest_close(&symbol, "Binance").await.unwrap(), None);

        let page = vec![bar("ETHBTC", t0()), bar("ETHBTC", t0() + Duration::minutes(4))];
        store.insert_bars(&page, "Binance").await.unwrap();

        let latest = store.get_latest_close(&symbol, "Binance").await.unwrap();
        assert_eq!(latest, Some(page[1].close_time));
        assert_eq!(store.get_latest_close(&symbol, "Other").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_progress_is_write_once() {
        let store = MemoryKlineStore::new();
        let symbol = Symbol::new("LTCBTC");

        store.set_progress(&symbol, t0()).await.unwrap();
        store
            .set_progress(&symbol, t0() + Duration::days(3))
            .await
            .unwrap();

        assert_eq!(store.get_progress(&symbol).await.unwrap(), Some(t0()));
        let all = store.get_all_progress().await.unwrap();
        assert_eq!(all, vec![ProgressRecord::new(symbol, t0())]);
    }

    #[tokio::test]
    async fn test_recent_logs_newest_first() {
        let store = MemoryKlineStore::new();
        for (i, symbol) in ["ETHBTC", "LTCBTC", "BNBBTC"].iter().enumerate() {
            let entry = CrawlLogEntry::new(
                t0() + Duration::minutes(i as i64),
                LogLevel::Info,
                Symbol::new(*symbol),
                "Binance",
                "crawled",
                "done",
            );
            store.append_log(&entry).await.unwrap();
        }

        let recent = store.recent_logs(2).await.unwrap();
        let symbols: Vec<&str> = recent.iter().map(|e| e.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["BNBBTC", "LTCBTC"]);
        assert_eq!(store.logs().len(), 3);
    }

    #[tokio::test]
    async fn test_rejected_page_is_not_partially_written() {
        let store = MemoryKlineStore::new();
        let page = vec![
            bar("ETHBTC", t0()),
            bar("ETHBTC", t0() + Duration::seconds(90)),
        ];

        assert!(store.insert_bars(&page, "Binance").await.is_err());
        assert_eq!(store.bar_count(), 0);

        store.fail_inserts_after(0);
        assert!(store.insert_bars(&page[..1], "Binance").await.is_err());
        store.clear_failures();
        assert_eq!(store.insert_bars(&page[..1], "Binance").await.unwrap(), 1);
    }
}
