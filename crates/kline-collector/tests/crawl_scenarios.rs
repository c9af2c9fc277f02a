//! 시뮬레이션 거래소 + 인메모리 저장소 기반 크롤링 시나리오 테스트.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Timelike, Utc};
use kline_collector::modules::{CrawlEngine, StopReason};
use kline_collector::{
    CrawlConfig, CrawlObserver, NoopObserver, Orchestrator, StartDateResolver, SymbolOutcome,
};
use kline_core::{Clock, FixedClock, Interval, Symbol, Window};
use kline_exchange::{SimulatedListing, SimulatedSource};
use kline_store::{KlineStore, MemoryKlineStore};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Resolved(Symbol, Option<DateTime<Utc>>),
    Page(Symbol, DateTime<Utc>),
    Gap(Symbol, DateTime<Utc>, DateTime<Utc>),
    Finished(Symbol, &'static str, usize, usize),
}

#[derive(Default)]
struct RecordingObserver {
    events: Mutex<Vec<Event>>,
}

impl RecordingObserver {
    fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

impl CrawlObserver for RecordingObserver {
    fn start_resolved(&self, symbol: &Symbol, start: Option<DateTime<Utc>>, _elapsed: Duration) {
        self.push(Event::Resolved(symbol.clone(), start));
    }

    fn page_persisted(
        &self,
        symbol: &Symbol,
        window: &Window,
        _fetched: usize,
        _inserted: u64,
        _elapsed: Duration,
    ) {
        self.push(Event::Page(symbol.clone(), window.start));
    }

    fn gap_bridged(&self, symbol: &Symbol, from: DateTime<Utc>, to: DateTime<Utc>) {
        self.push(Event::Gap(symbol.clone(), from, to));
    }

    fn symbol_finished(
        &self,
        symbol: &Symbol,
        outcome: &SymbolOutcome,
        position: usize,
        total: usize,
        _elapsed: Duration,
    ) {
        self.push(Event::Finished(
            symbol.clone(),
            outcome.label(),
            position,
            total,
        ));
    }
}

fn floor() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2015, 1, 1, 12, 0, 0).unwrap()
}

fn config_for(symbols: &[&str]) -> CrawlConfig {
    CrawlConfig {
        symbols: symbols.iter().map(|s| Symbol::new(*s)).collect(),
        ..CrawlConfig::default()
    }
}

fn orchestrator(
    source: &Arc<SimulatedSource>,
    store: &Arc<MemoryKlineStore>,
    now: DateTime<Utc>,
    config: &CrawlConfig,
    observer: Arc<dyn CrawlObserver>,
) -> Orchestrator {
    Orchestrator::new(
        source.clone(),
        store.clone(),
        Arc::new(FixedClock(now)),
        config,
        observer,
    )
    .unwrap()
}

fn assert_aligned_and_unique(store: &MemoryKlineStore, symbol: &str) {
    let bars = store.bars(symbol, "Binance");
    assert!(bars
        .iter()
        .all(|b| b.open_time.second() == 0 && b.open_time.nanosecond() == 0));
    assert!(bars.windows(2).all(|w| w[0].open_time < w[1].open_time));
}

#[tokio::test]
async fn test_listing_at_day_500_with_maintenance_gap() {
    let listed = Utc.with_ymd_and_hms(2016, 5, 15, 8, 17, 0).unwrap();
    assert_eq!((listed - floor()).num_days(), 499);

    let gap_start = listed + ChronoDuration::minutes(1500);
    let gap_end = listed + ChronoDuration::minutes(4000);
    let now = listed + ChronoDuration::minutes(6000);

    let source = Arc::new(SimulatedSource::new(now).with_listing(
        "ETHBTC",
        SimulatedListing::listed_at(listed).with_gap(gap_start, gap_end),
    ));
    let store = Arc::new(MemoryKlineStore::new());
    let observer = Arc::new(RecordingObserver::default());

    let stats = orchestrator(&source, &store, now, &CrawlConfig::default(), observer.clone())
        .run(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(stats.success, 1);
    assert_eq!(stats.gaps_bridged, 1);
    assert_eq!(stats.total_klines, 3500);

    let symbol = Symbol::new("ETHBTC");
    assert_eq!(store.get_progress(&symbol).await.unwrap(), Some(listed));

    let bars = store.bars("ETHBTC", "Binance");
    assert_eq!(bars.len(), 3500);
    assert_eq!(bars.first().map(|b| b.open_time), Some(listed));
    // 현재 시각에 시작한 분봉은 아직 닫히지 않음
    assert_eq!(
        bars.last().map(|b| b.open_time),
        Some(now - ChronoDuration::minutes(1))
    );
    assert!(bars
        .iter()
        .all(|b| b.open_time < gap_start || b.open_time >= gap_end));
    assert_aligned_and_unique(&store, "ETHBTC");

    let events = observer.events();
    assert!(events.contains(&Event::Resolved(symbol.clone(), Some(listed))));
    let gaps: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, Event::Gap(..)))
        .collect();
    assert_eq!(gaps.len(), 1);
    assert!(matches!(gaps[0], Event::Gap(_, _, to) if *to == gap_end));
    assert_eq!(
        events.last(),
        Some(&Event::Finished(symbol, "crawled", 1, 1))
    );
}

#[tokio::test]
async fn test_cursor_only_moves_forward() {
    let listed = Utc.with_ymd_and_hms(2019, 9, 1, 0, 0, 0).unwrap();
    let now = listed + ChronoDuration::minutes(4200);
    let source = Arc::new(SimulatedSource::new(now).with_listing(
        "BNBUSDT",
        SimulatedListing::listed_at(listed)
            .with_gap(listed + ChronoDuration::minutes(800), listed + ChronoDuration::minutes(2900)),
    ));
    let store = Arc::new(MemoryKlineStore::new());
    let observer = Arc::new(RecordingObserver::default());

    orchestrator(&source, &store, now, &CrawlConfig::default(), observer.clone())
        .run(&CancellationToken::new())
        .await
        .unwrap();

    let minute_starts: Vec<_> = source
        .calls_for("BNBUSDT")
        .into_iter()
        .filter(|c| c.interval == Interval::M1)
        .map(|c| c.start)
        .collect();
    assert!(minute_starts.windows(2).all(|w| w[0] <= w[1]));

    let page_starts: Vec<_> = observer
        .events()
        .into_iter()
        .filter_map(|e| match e {
            Event::Page(_, start) => Some(start),
            _ => None,
        })
        .collect();
    assert!(page_starts.len() >= 3);
    assert!(page_starts.windows(2).all(|w| w[0] < w[1]));
    assert_aligned_and_unique(&store, "BNBUSDT");
}

#[tokio::test]
async fn test_resolver_is_idempotent() {
    let listed = Utc.with_ymd_and_hms(2020, 11, 23, 14, 2, 0).unwrap();
    let now = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
    let source = Arc::new(
        SimulatedSource::new(now).with_listing("DOTUSDT", SimulatedListing::listed_at(listed)),
    );
    let resolver = StartDateResolver::new(
        source.clone(),
        Arc::new(FixedClock(now)),
        Arc::new(NoopObserver),
    );
    let symbol = Symbol::new("DOTUSDT");

    let first = resolver.resolve(&symbol, None).await.found();
    let first_calls = source.calls();
    source.clear_calls();
    let second = resolver.resolve(&symbol, None).await.found();

    assert_eq!(first, Some(listed));
    assert_eq!(first, second);
    assert_eq!(first_calls, source.calls());
}

#[tokio::test]
async fn test_all_empty_crawl_persists_nothing() {
    let listed = Utc.with_ymd_and_hms(2018, 1, 1, 0, 0, 0).unwrap();
    let delisted = listed + ChronoDuration::days(2);
    let now = listed + ChronoDuration::days(4);
    let source = Arc::new(SimulatedSource::new(now).with_listing(
        "BCCBTC",
        SimulatedListing::listed_at(listed).delisted_at(delisted),
    ));
    let store = Arc::new(MemoryKlineStore::new());
    let clock: Arc<dyn Clock> = Arc::new(FixedClock(now));
    let resolver = StartDateResolver::new(source.clone(), clock.clone(), Arc::new(NoopObserver));
    let engine = CrawlEngine::new(
        source.clone(),
        store.clone(),
        clock,
        resolver,
        Arc::new(NoopObserver),
        "Binance",
        1000,
    );

    let report = engine
        .crawl(
            &Symbol::new("BCCBTC"),
            delisted + ChronoDuration::hours(1),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.stop, StopReason::EndOfData);
    assert_eq!(report.pages, 0);
    assert_eq!(store.insert_calls(), 0);
    assert_eq!(store.bar_count(), 0);

    // 현재 시각 이후에서 시작하면 바로 종료
    let report = engine
        .crawl(
            &Symbol::new("BCCBTC"),
            now + ChronoDuration::minutes(1),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(report.stop, StopReason::CaughtUp);
    assert_eq!(store.insert_calls(), 0);
}

#[tokio::test]
async fn test_unlisted_symbol_is_skipped() {
    let now = Utc.with_ymd_and_hms(2017, 1, 1, 0, 0, 0).unwrap();
    let source = Arc::new(SimulatedSource::new(now).with_listing(
        "FUTUREBTC",
        SimulatedListing::listed_at(now + ChronoDuration::days(30)),
    ));
    let store = Arc::new(MemoryKlineStore::new());

    let stats = orchestrator(&source, &store, now, &CrawlConfig::default(), Arc::new(NoopObserver))
        .run(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(stats.total, 1);
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.errors, 0);
    assert!(store.get_all_progress().await.unwrap().is_empty());
    assert_eq!(store.bar_count(), 0);
}

#[tokio::test]
async fn test_allow_list_touches_one_symbol_of_fifty() {
    let listed = Utc.with_ymd_and_hms(2021, 6, 1, 0, 0, 0).unwrap();
    let now = listed + ChronoDuration::minutes(10);

    let mut source = SimulatedSource::new(now);
    for i in 0..49 {
        source = source.with_listing(format!("COIN{}USDT", i), SimulatedListing::listed_at(listed));
    }
    source = source.with_listing("BTCUSDT", SimulatedListing::listed_at(listed));
    let source = Arc::new(source);
    let store = Arc::new(MemoryKlineStore::new());

    let stats = orchestrator(
        &source,
        &store,
        now,
        &config_for(&["BTCUSDT"]),
        Arc::new(NoopObserver),
    )
    .run(&CancellationToken::new())
    .await
    .unwrap();

    assert_eq!(stats.total, 1);
    assert_eq!(source.list_calls(), 1);
    assert!(!source.calls().is_empty());
    assert!(source.calls().iter().all(|c| c.symbol.as_str() == "BTCUSDT"));
    assert_eq!(store.bars("BTCUSDT", "Binance").len(), 10);
}

#[tokio::test]
async fn test_failed_symbol_resumes_on_next_run() {
    let listed = Utc.with_ymd_and_hms(2015, 3, 1, 0, 0, 0).unwrap();
    let now = listed + ChronoDuration::minutes(5000);
    let source = Arc::new(
        SimulatedSource::new(now)
            .with_listing("XUSDT", SimulatedListing::listed_at(listed))
            .with_listing("YUSDT", SimulatedListing::listed_at(listed))
            .with_listing("ZUSDT", SimulatedListing::listed_at(listed)),
    );
    let store = Arc::new(MemoryKlineStore::new());
    let observer = Arc::new(RecordingObserver::default());
    let config = CrawlConfig::default();

    // 시작일 탐색 3회 + 페이지 2개 이후 전송 실패
    source.fail_after("YUSDT", 5);

    let stats = orchestrator(&source, &store, now, &config, observer.clone())
        .run(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(stats.total, 3);
    assert_eq!(stats.success, 2);
    assert_eq!(stats.errors, 1);
    assert_eq!(store.bars("XUSDT", "Binance").len(), 5000);
    assert_eq!(store.bars("ZUSDT", "Binance").len(), 5000);
    assert!(observer
        .events()
        .contains(&Event::Finished(Symbol::new("YUSDT"), "failed", 2, 3)));

    let partial = store.bars("YUSDT", "Binance");
    assert_eq!(partial.len(), 1999);
    let last_close = partial.last().map(|b| b.close_time).unwrap();

    // 다음 실행: 저장된 마지막 캔들부터 재개
    source.clear_failures();
    source.clear_calls();

    let stats = orchestrator(&source, &store, now, &config, Arc::new(NoopObserver))
        .run(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(stats.errors, 0);
    let resumed = source.calls_for("YUSDT");
    assert_eq!(resumed[0].interval, Interval::M1);
    assert_eq!(resumed[0].start, last_close);
    assert_eq!(store.bars("YUSDT", "Binance").len(), 5000);
    assert_aligned_and_unique(&store, "YUSDT");
}

#[tokio::test]
async fn test_concurrent_run_matches_sequential() {
    let listed = Utc.with_ymd_and_hms(2020, 2, 1, 0, 0, 0).unwrap();
    let now = listed + ChronoDuration::minutes(2500);
    let names = ["AUSDT", "BUSDT", "CUSDT", "DUSDT"];

    let mut source = SimulatedSource::new(now);
    for (i, name) in names.iter().enumerate() {
        source = source.with_listing(
            *name,
            SimulatedListing::listed_at(listed + ChronoDuration::minutes(i as i64 * 100)),
        );
    }
    let source = Arc::new(source);
    let store = Arc::new(MemoryKlineStore::new());
    let config = CrawlConfig {
        concurrency: 3,
        ..CrawlConfig::default()
    };
    let observer = Arc::new(RecordingObserver::default());

    let stats = orchestrator(&source, &store, now, &config, observer.clone())
        .run(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(stats.success, 4);
    for (i, name) in names.iter().enumerate() {
        assert_eq!(store.bars(name, "Binance").len(), 2500 - i * 100);
        assert_aligned_and_unique(&store, name);
    }

    let mut positions: Vec<usize> = observer
        .events()
        .into_iter()
        .filter_map(|e| match e {
            Event::Finished(_, _, position, 4) => Some(position),
            _ => None,
        })
        .collect();
    positions.sort_unstable();
    assert_eq!(positions, vec![1, 2, 3, 4]);
}
