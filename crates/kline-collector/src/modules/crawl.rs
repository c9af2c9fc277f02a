//! 페이지 단위 분봉 크롤링.
//!
//! 커서에서 시작해 `page_size`개 분봉 윈도우를 차례로 조회하고 저장합니다.
//!
//! - 캔들이 있으면 open_time을 분 단위로 절삭해 닫힌 분봉을 저장하고 윈도우 끝으로 이동
//! - 닫히지 않은 분봉만 남으면 따라잡은 것으로 보고 종료
//! - 빈 윈도우가 현재 시각 이후면 따라잡은 것으로 보고 종료
//! - 빈 윈도우가 현재 시각 이전이면 공백으로 보고 재개 지점을 탐색해 건너뜀

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use kline_core::{Bar, Clock, Interval, Symbol, Window};
use kline_exchange::KlineSource;
use kline_store::KlineStore;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::clamp_page_size;
use crate::modules::resolver::{Resolution, StartDateResolver};
use crate::observer::CrawlObserver;
use crate::Result;

/// 크롤링 종료 사유.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// 현재 시각까지 모두 저장
    CaughtUp,
    /// 공백 이후 더 이상 데이터가 없음 (상장 폐지 등)
    EndOfData,
    /// 취소 요청
    Cancelled,
}

/// 심볼 하나의 크롤링 결과.
#[derive(Debug, Clone)]
pub struct CrawlReport {
    /// 저장한 페이지 수
    pub pages: usize,
    /// 조회해서 저장 요청한 캔들 수
    pub bars: usize,
    /// 새로 저장된 행 수 (중복 제외)
    pub inserted: u64,
    /// 건너뛴 공백 수
    pub gaps_bridged: usize,
    /// 종료 사유
    pub stop: StopReason,
    /// 마지막 커서
    pub cursor: DateTime<Utc>,
    /// 소요 시간
    pub elapsed: Duration,
}

/// 분봉 크롤 엔진.
#[derive(Clone)]
pub struct CrawlEngine {
    source: Arc<dyn KlineSource>,
    store: Arc<dyn KlineStore>,
    clock: Arc<dyn Clock>,
    resolver: StartDateResolver,
    observer: Arc<dyn CrawlObserver>,
    exchange_tag: String,
    page_size: u32,
}

impl CrawlEngine {
    pub fn new(
        source: Arc<dyn KlineSource>,
        store: Arc<dyn KlineStore>,
        clock: Arc<dyn Clock>,
        resolver: StartDateResolver,
        observer: Arc<dyn CrawlObserver>,
        exchange_tag: impl Into<String>,
        page_size: u32,
    ) -> Self {
        Self {
            source,
            store,
            clock,
            resolver,
            observer,
            exchange_tag: exchange_tag.into(),
            page_size: clamp_page_size(page_size),
        }
    }

    /// `cursor`부터 현재 시각까지 분봉을 저장합니다.
    ///
    /// 전송/저장 실패는 이 심볼의 크롤링만 중단시키며 그대로 반환됩니다.
    /// 이미 저장된 페이지는 남아 있으므로 다음 실행에서 이어서 진행합니다.
    pub async fn crawl(
        &self,
        symbol: &Symbol,
        cursor: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<CrawlReport> {
        let span = kline_core::crawl_span!("crawl", symbol, self.exchange_tag);
        self.run(symbol, cursor, cancel).instrument(span).await
    }

    async fn run(
        &self,
        symbol: &Symbol,
        mut cursor: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<CrawlReport> {
        let started = Instant::now();
        let mut pages = 0;
        let mut bars_total = 0;
        let mut inserted_total = 0;
        let mut gaps_bridged = 0;

        let stop = loop {
            if cancel.is_cancelled() {
                break StopReason::Cancelled;
            }

            let window = Window::starting_at(cursor, Interval::M1, self.page_size);
            let page_started = Instant::now();
            let bars = self
                .source
                .get_bars(symbol, Interval::M1, window.start, window.end, self.page_size)
                .await?;

            if bars.is_empty() {
                if window.start > self.clock.now() {
                    break StopReason::CaughtUp;
                }

                self.observer.gap_detected(symbol, &window);
                match self.resolver.resolve_after(symbol, window.end).await {
                    Resolution::Found(next) => {
                        self.observer.gap_bridged(symbol, window.end, next);
                        gaps_bridged += 1;
                        cursor = next;
                        continue;
                    }
                    Resolution::NotListed => break StopReason::EndOfData,
                    Resolution::Aborted(e) => return Err(e.into()),
                }
            }

            // 아직 닫히지 않은 분봉은 저장하지 않고 다음 실행에서 다시 받음
            let now = self.clock.now();
            let bars: Vec<Bar> = bars
                .into_iter()
                .map(Bar::truncated)
                .filter(|b| b.close_time <= now)
                .collect();
            if bars.is_empty() {
                break StopReason::CaughtUp;
            }

            let inserted = self.store.insert_bars(&bars, &self.exchange_tag).await?;

            pages += 1;
            bars_total += bars.len();
            inserted_total += inserted;
            self.observer
                .page_persisted(symbol, &window, bars.len(), inserted, page_started.elapsed());

            if tracing::enabled!(tracing::Level::DEBUG) {
                self.report_table_metrics().await;
            }

            cursor = window.end;
        };

        Ok(CrawlReport {
            pages,
            bars: bars_total,
            inserted: inserted_total,
            gaps_bridged,
            stop,
            cursor,
            elapsed: started.elapsed(),
        })
    }

    async fn report_table_metrics(&self) {
        match self.store.table_metrics().await {
            Ok(Some(metrics)) => self.observer.table_metrics(&metrics),
            Ok(None) => {}
            Err(e) => tracing::debug!(error = %e, "테이블 크기 조회 실패"),
        }
    }
}
