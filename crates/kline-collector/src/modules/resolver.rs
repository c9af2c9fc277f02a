//! 시작일 탐색.
//!
//! 1. 일봉 단위로 하한부터 윈도우를 넘기며 첫 일봉을 찾습니다 (coarse).
//! 2. 첫 일봉 전날부터 분봉 윈도우를 넘기며 첫 분봉을 찾습니다 (fine).
//!
//! 크롤 도중 공백을 만나면 fine 단계만 수행해 데이터가 다시 시작하는 지점을 찾습니다.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use kline_core::{truncate, Bar, Clock, Interval, Symbol, Window};
use kline_exchange::{ExchangeError, KlineSource};

use crate::config::{clamp_page_size, default_history_floor};
use crate::observer::CrawlObserver;

/// 시작일 탐색 결과.
#[derive(Debug)]
pub enum Resolution {
    /// 첫 캔들 시각 (분 단위로 절삭)
    Found(DateTime<Utc>),
    /// 현재 시각까지 캔들 없음
    NotListed,
    /// 전송 실패로 중단
    Aborted(ExchangeError),
}

impl Resolution {
    /// 찾은 시각. 데이터가 없거나 중단되면 `None`.
    pub fn found(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Found(ts) => Some(*ts),
            _ => None,
        }
    }
}

/// 심볼의 최초 분봉 시각 탐색기.
#[derive(Clone)]
pub struct StartDateResolver {
    source: Arc<dyn KlineSource>,
    clock: Arc<dyn Clock>,
    observer: Arc<dyn CrawlObserver>,
    page_size: u32,
    history_floor: DateTime<Utc>,
}

impl StartDateResolver {
    pub fn new(
        source: Arc<dyn KlineSource>,
        clock: Arc<dyn Clock>,
        observer: Arc<dyn CrawlObserver>,
    ) -> Self {
        Self {
            source,
            clock,
            observer,
            page_size: kline_exchange::MAX_KLINE_LIMIT,
            history_floor: default_history_floor(),
        }
    }

    /// 페이지당 캔들 수 지정. 허용 범위를 벗어나면 가장 가까운 값으로 맞춥니다.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = clamp_page_size(page_size);
        self
    }

    /// 하한 미지정 시 사용할 탐색 시작 시각.
    pub fn with_history_floor(mut self, history_floor: DateTime<Utc>) -> Self {
        self.history_floor = history_floor;
        self
    }

    /// `lower_bound` 이후 첫 분봉 시각을 찾습니다.
    pub async fn resolve(&self, symbol: &Symbol, lower_bound: Option<DateTime<Utc>>) -> Resolution {
        let started = Instant::now();
        let lower_bound = lower_bound.unwrap_or(self.history_floor);

        let resolution = match self.locate(symbol, lower_bound).await {
            Ok(Some(start)) => Resolution::Found(start),
            Ok(None) => Resolution::NotListed,
            Err(e) => {
                self.observer.resolve_failed(symbol, &e);
                return Resolution::Aborted(e);
            }
        };

        self.observer
            .start_resolved(symbol, resolution.found(), started.elapsed());
        resolution
    }

    /// `after` 이후 데이터가 다시 시작하는 분봉 시각을 찾습니다.
    pub async fn resolve_after(&self, symbol: &Symbol, after: DateTime<Utc>) -> Resolution {
        match self.first_bar(symbol, Interval::M1, after).await {
            Ok(Some(bar)) => Resolution::Found(truncate(bar.open_time, Interval::M1)),
            Ok(None) => Resolution::NotListed,
            Err(e) => {
                self.observer.resolve_failed(symbol, &e);
                Resolution::Aborted(e)
            }
        }
    }

    async fn locate(
        &self,
        symbol: &Symbol,
        lower_bound: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, ExchangeError> {
        let Some(day) = self.first_bar(symbol, Interval::D1, lower_bound).await? else {
            return Ok(None);
        };

        // 하한 이후의 분봉이 첫 일봉 전날에 있을 수 있음
        let fine_from = lower_bound.max(day.open_time - Duration::days(1));
        tracing::debug!(
            symbol = %symbol,
            first_day = %day.open_time,
            fine_from = %fine_from,
            "첫 일봉 발견"
        );

        let minute = self.first_bar(symbol, Interval::M1, fine_from).await?;
        Ok(minute.map(|bar| truncate(bar.open_time, Interval::M1)))
    }

    /// `from`부터 윈도우를 넘기며 첫 캔들을 찾습니다. 현재 시각을 지나면 `None`.
    async fn first_bar(
        &self,
        symbol: &Symbol,
        interval: Interval,
        from: DateTime<Utc>,
    ) -> Result<Option<Bar>, ExchangeError> {
        let mut window = Window::starting_at(from, interval, self.page_size);

        while window.start <= self.clock.now() {
            let bars = self
                .source
                .get_bars(symbol, interval, window.start, window.end, self.page_size)
                .await?;

            if let Some(first) = bars.into_iter().min_by_key(|b| b.open_time) {
                return Ok(Some(first));
            }
            window = window.next();
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use kline_core::FixedClock;
    use kline_exchange::{SimulatedListing, SimulatedSource};

    use crate::observer::NoopObserver;

    fn resolver(source: Arc<SimulatedSource>, now: DateTime<Utc>) -> StartDateResolver {
        StartDateResolver::new(source, Arc::new(FixedClock(now)), Arc::new(NoopObserver))
    }

    #[tokio::test]
    async fn test_resolves_minute_of_listing() {
        let listed = Utc.with_ymd_and_hms(2018, 2, 9, 7, 31, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2018, 6, 1, 0, 0, 0).unwrap();
        let source = Arc::new(
            SimulatedSource::new(now).with_listing("NANOBTC", SimulatedListing::listed_at(listed)),
        );

        let resolution = resolver(source, now)
            .resolve(&Symbol::new("NANOBTC"), None)
            .await;
        assert_eq!(resolution.found(), Some(listed));
    }

    #[tokio::test]
    async fn test_minutes_before_first_day_bar_are_found() {
        // 하한이 12:00이므로 상장일의 일봉(00:00 시작)은 요청 범위 밖
        let listed = Utc.with_ymd_and_hms(2016, 3, 4, 18, 5, 0).unwrap();
        let lower = Utc.with_ymd_and_hms(2016, 3, 4, 12, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2016, 4, 1, 0, 0, 0).unwrap();
        let source = Arc::new(
            SimulatedSource::new(now).with_listing("XYZBTC", SimulatedListing::listed_at(listed)),
        );

        let resolution = resolver(source, now)
            .resolve(&Symbol::new("XYZBTC"), Some(lower))
            .await;
        assert_eq!(resolution.found(), Some(listed));
    }

    #[tokio::test]
    async fn test_not_listed_and_aborted() {
        let now = Utc.with_ymd_and_hms(2016, 1, 1, 0, 0, 0).unwrap();
        let source = Arc::new(SimulatedSource::new(now).with_listing(
            "LATEUSDT",
            SimulatedListing::listed_at(now + Duration::days(10)),
        ));
        let resolver = resolver(source.clone(), now);

        let resolution = resolver.resolve(&Symbol::new("LATEUSDT"), None).await;
        assert!(matches!(resolution, Resolution::NotListed));

        source.fail_after("LATEUSDT", 0);
        let resolution = resolver.resolve(&Symbol::new("LATEUSDT"), None).await;
        assert!(matches!(resolution, Resolution::Aborted(_)));
        assert_eq!(resolution.found(), None);
    }

    #[tokio::test]
    async fn test_resolve_after_skips_gap() {
        let listed = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let gap_end = listed + Duration::minutes(2500);
        let now = listed + Duration::days(5);
        let source = Arc::new(SimulatedSource::new(now).with_listing(
            "GAPUSDT",
            SimulatedListing::listed_at(listed).with_gap(listed + Duration::minutes(100), gap_end),
        ));

        let resolution = resolver(source, now)
            .resolve_after(&Symbol::new("GAPUSDT"), listed + Duration::minutes(120))
            .await;
        assert_eq!(resolution.found(), Some(gap_end));
    }

    #[tokio::test]
    async fn test_page_size_is_clamped() {
        let from = Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap();
        let listed = from + Duration::minutes(3);
        let now = from + Duration::days(1);
        let source = Arc::new(
            SimulatedSource::new(now).with_listing("ONEBTC", SimulatedListing::listed_at(listed)),
        );

        let resolution = resolver(source.clone(), now)
            .with_page_size(1)
            .resolve_after(&Symbol::new("ONEBTC"), from)
            .await;

        assert_eq!(resolution.found(), Some(listed));
        let calls = source.calls();
        assert!(!calls.is_empty());
        assert!(calls.iter().all(|c| c.limit == crate::config::MIN_PAGE_SIZE));
        assert!(calls.windows(2).all(|w| w[0].start < w[1].start));
    }
}
