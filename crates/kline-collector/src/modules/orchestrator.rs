//! 심볼 단위 크롤링 오케스트레이션.
//!
//! 거래소 심볼 목록을 필터링한 뒤 심볼마다 시작일을 확인하고,
//! 저장된 마지막 캔들부터 크롤링을 이어갑니다.
//! 한 심볼의 실패는 기록만 하고 다음 심볼로 넘어갑니다.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use kline_core::{Clock, Symbol};
use kline_exchange::KlineSource;
use kline_store::{CrawlLogEntry, KlineStore, LogLevel};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::config::CrawlConfig;
use crate::error::CollectorError;
use crate::modules::crawl::{CrawlEngine, CrawlReport, StopReason};
use crate::modules::filter::SymbolFilter;
use crate::modules::resolver::{Resolution, StartDateResolver};
use crate::observer::CrawlObserver;
use crate::{CollectionStats, Result};

/// 심볼 하나의 처리 결과.
#[derive(Debug)]
pub enum SymbolOutcome {
    /// 크롤링 완료 (취소로 중간에 멈춘 경우 포함)
    Crawled(CrawlReport),
    /// 거래 이력 없음
    NotListed,
    /// 시작일 탐색 중 전송 실패
    ResolveFailed,
    /// 크롤링 중 실패
    Failed(CollectorError),
    /// 시작 전에 취소됨
    Cancelled,
}

impl SymbolOutcome {
    /// 결과 구분 이름.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Crawled(_) => "crawled",
            Self::NotListed => "not_listed",
            Self::ResolveFailed => "resolve_failed",
            Self::Failed(_) => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// `crawl_log`에 남길 기록으로 변환.
    pub fn log_entry(
        &self,
        symbol: &Symbol,
        exchange: &str,
        logged_at: DateTime<Utc>,
    ) -> CrawlLogEntry {
        let entry = |level, message: &str| {
            CrawlLogEntry::new(
                logged_at,
                level,
                symbol.clone(),
                exchange,
                self.label(),
                message,
            )
            .with_source(env!("CARGO_PKG_NAME"))
        };

        match self {
            Self::Crawled(report) => entry(LogLevel::Info, "crawl finished").with_properties(json!({
                "pages": report.pages,
                "bars": report.bars,
                "inserted": report.inserted,
                "gaps_bridged": report.gaps_bridged,
                "stop": format!("{:?}", report.stop),
                "cursor": report.cursor.to_rfc3339(),
                "elapsed_ms": report.elapsed.as_millis() as u64,
            })),
            Self::NotListed => entry(LogLevel::Info, "no trading history, skipped"),
            Self::ResolveFailed => entry(LogLevel::Warn, "start date unresolved, skipped"),
            Self::Failed(error) => {
                entry(LogLevel::Error, "crawl failed").with_exception(error.to_string())
            }
            Self::Cancelled => entry(LogLevel::Info, "cancelled before start"),
        }
    }
}

/// 심볼 크롤링 오케스트레이터.
pub struct Orchestrator {
    source: Arc<dyn KlineSource>,
    store: Arc<dyn KlineStore>,
    clock: Arc<dyn Clock>,
    resolver: StartDateResolver,
    engine: CrawlEngine,
    observer: Arc<dyn CrawlObserver>,
    filter: SymbolFilter,
    exchange_tag: String,
    concurrency: usize,
}

impl Orchestrator {
    /// 설정을 검증한 뒤 오케스트레이터를 생성합니다.
    pub fn new(
        source: Arc<dyn KlineSource>,
        store: Arc<dyn KlineStore>,
        clock: Arc<dyn Clock>,
        config: &CrawlConfig,
        observer: Arc<dyn CrawlObserver>,
    ) -> Result<Self> {
        config.validate()?;

        let resolver = StartDateResolver::new(source.clone(), clock.clone(), observer.clone())
            .with_page_size(config.page_size)
            .with_history_floor(config.history_floor);
        let engine = CrawlEngine::new(
            source.clone(),
            store.clone(),
            clock.clone(),
            resolver.clone(),
            observer.clone(),
            config.exchange_tag.clone(),
            config.page_size,
        );

        Ok(Self {
            source,
            store,
            clock,
            resolver,
            engine,
            observer,
            filter: SymbolFilter::from_config(config),
            exchange_tag: config.exchange_tag.clone(),
            concurrency: config.concurrency,
        })
    }

    /// 시작일 탐색기.
    pub fn resolver(&self) -> &StartDateResolver {
        &self.resolver
    }

    /// 전체 크롤링 1회 실행.
    ///
    /// 심볼 목록 조회 실패와 설정 오류만 실행 전체를 중단시킵니다.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<CollectionStats> {
        let started = Instant::now();

        let universe = self.source.list_symbols().await?;
        let listed = universe.len();
        let symbols = self.filter.apply(universe)?;
        let total = symbols.len();

        tracing::info!(
            exchange = self.source.name(),
            listed = listed,
            targets = total,
            concurrency = self.concurrency,
            "크롤링 시작"
        );

        let progress: HashMap<Symbol, DateTime<Utc>> = self
            .store
            .get_all_progress()
            .await?
            .into_iter()
            .map(|record| (record.symbol, record.start_date))
            .collect();
        tracing::debug!(records = progress.len(), "진행 기록 로드");

        let progress = &progress;
        let mut outcomes = stream::iter(symbols)
            .map(|symbol| async move {
                let known_start = progress.get(&symbol).copied();
                let outcome = self.crawl_symbol(&symbol, known_start, cancel).await;
                (symbol, outcome)
            })
            .buffer_unordered(self.concurrency);

        let mut stats = CollectionStats::new();
        let mut finished = 0;
        while let Some((symbol, outcome)) = outcomes.next().await {
            finished += 1;
            self.observer
                .symbol_finished(&symbol, &outcome, finished, total, started.elapsed());
            self.append_log(&symbol, &outcome).await;
            stats.record(&outcome);
        }

        stats.elapsed = started.elapsed();
        Ok(stats)
    }

    /// 심볼 결과를 저장소에 기록합니다. 기록 실패는 크롤링 결과에 영향을 주지 않습니다.
    async fn append_log(&self, symbol: &Symbol, outcome: &SymbolOutcome) {
        let entry = outcome.log_entry(symbol, &self.exchange_tag, self.clock.now());
        if let Err(e) = self.store.append_log(&entry).await {
            tracing::warn!(symbol = %symbol, error = %e, "크롤링 기록 저장 실패");
        }
    }

    /// 심볼 하나를 처리합니다. 실패는 결과로 돌려주며 전파하지 않습니다.
    pub async fn crawl_symbol(
        &self,
        symbol: &Symbol,
        known_start: Option<DateTime<Utc>>,
        cancel: &CancellationToken,
    ) -> SymbolOutcome {
        if cancel.is_cancelled() {
            return SymbolOutcome::Cancelled;
        }

        let start = match known_start {
            Some(start) => start,
            None => match self.resolver.resolve(symbol, None).await {
                Resolution::Found(start) => {
                    if let Err(e) = self.store.set_progress(symbol, start).await {
                        return SymbolOutcome::Failed(e.into());
                    }
                    start
                }
                Resolution::NotListed => return SymbolOutcome::NotListed,
                Resolution::Aborted(_) => return SymbolOutcome::ResolveFailed,
            },
        };

        let cursor = match self.store.get_latest_close(symbol, &self.exchange_tag).await {
            Ok(Some(latest)) => latest,
            Ok(None) => start,
            Err(e) => return SymbolOutcome::Failed(e.into()),
        };

        match self.engine.crawl(symbol, cursor, cancel).await {
            Ok(report) if report.stop == StopReason::Cancelled && report.pages == 0 => {
                SymbolOutcome::Cancelled
            }
            Ok(report) => SymbolOutcome::Crawled(report),
            Err(e) => SymbolOutcome::Failed(e),
        }
    }
}
