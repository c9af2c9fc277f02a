//! 크롤링 이벤트 관찰자.
//!
//! 리졸버/크롤 엔진/오케스트레이터는 진행 상황을 `CrawlObserver`로만 보고합니다.
//! 관찰자는 결과에 영향을 주지 않으며, 기본 구현은 `tracing` 이벤트를 남깁니다.

use std::time::Duration;

use chrono::{DateTime, Utc};
use kline_core::{Symbol, Window};
use kline_exchange::ExchangeError;
use kline_store::TableMetrics;

use crate::modules::SymbolOutcome;

/// 크롤링 이벤트 수신자. 모든 메서드는 기본적으로 아무것도 하지 않습니다.
pub trait CrawlObserver: Send + Sync {
    /// 시작일 탐색 완료 (`None`이면 데이터 없음)
    fn start_resolved(&self, _symbol: &Symbol, _start: Option<DateTime<Utc>>, _elapsed: Duration) {
    }

    /// 시작일/재개 지점 탐색 중 전송 실패
    fn resolve_failed(&self, _symbol: &Symbol, _error: &ExchangeError) {}

    /// 페이지 저장 완료
    fn page_persisted(
        &self,
        _symbol: &Symbol,
        _window: &Window,
        _fetched: usize,
        _inserted: u64,
        _elapsed: Duration,
    ) {
    }

    /// 현재 시각 이전의 빈 윈도우 발견
    fn gap_detected(&self, _symbol: &Symbol, _window: &Window) {}

    /// 공백 구간 건너뜀
    fn gap_bridged(&self, _symbol: &Symbol, _from: DateTime<Utc>, _to: DateTime<Utc>) {}

    /// 캔들 테이블 크기
    fn table_metrics(&self, _metrics: &TableMetrics) {}

    /// 심볼 처리 종료. `position`은 완료 순서 (1부터).
    fn symbol_finished(
        &self,
        _symbol: &Symbol,
        _outcome: &SymbolOutcome,
        _position: usize,
        _total: usize,
        _elapsed: Duration,
    ) {
    }
}

/// 이벤트를 무시하는 관찰자.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl CrawlObserver for NoopObserver {}

/// `tracing` 이벤트로 기록하는 관찰자.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl CrawlObserver for TracingObserver {
    fn start_resolved(&self, symbol: &Symbol, start: Option<DateTime<Utc>>, elapsed: Duration) {
        match start {
            Some(start) => tracing::info!(
                symbol = %symbol,
                start = %start,
                elapsed = format!("{:.1}s", elapsed.as_secs_f64()),
                "시작일 확인"
            ),
            None => tracing::info!(symbol = %symbol, "거래 이력 없음"),
        }
    }

    fn resolve_failed(&self, symbol: &Symbol, error: &ExchangeError) {
        tracing::warn!(symbol = %symbol, error = %error, "시작일 탐색 실패");
    }

    fn page_persisted(
        &self,
        symbol: &Symbol,
        window: &Window,
        fetched: usize,
        inserted: u64,
        elapsed: Duration,
    ) {
        tracing::debug!(
            symbol = %symbol,
            start = %window.start,
            end = %window.end,
            fetched = fetched,
            inserted = inserted,
            elapsed_ms = elapsed.as_millis() as u64,
            "페이지 저장"
        );
    }

    fn gap_detected(&self, symbol: &Symbol, window: &Window) {
        tracing::debug!(
            symbol = %symbol,
            start = %window.start,
            end = %window.end,
            "빈 구간 발견, 재개 지점 탐색"
        );
    }

    fn gap_bridged(&self, symbol: &Symbol, from: DateTime<Utc>, to: DateTime<Utc>) {
        tracing::info!(
            symbol = %symbol,
            from = %from,
            to = %to,
            gap_minutes = (to - from).num_minutes(),
            "공백 구간 건너뜀"
        );
    }

    fn table_metrics(&self, metrics: &TableMetrics) {
        tracing::debug!(metrics = %metrics.summary(), "테이블 크기");
    }

    fn symbol_finished(
        &self,
        symbol: &Symbol,
        outcome: &SymbolOutcome,
        position: usize,
        total: usize,
        elapsed: Duration,
    ) {
        let progress = format!("{}/{}", position, total);
        let elapsed = format!("{:.1}s", elapsed.as_secs_f64());

        match outcome {
            SymbolOutcome::Crawled(report) => tracing::info!(
                symbol = %symbol,
                progress = progress,
                elapsed = elapsed,
                pages = report.pages,
                inserted = report.inserted,
                gaps_bridged = report.gaps_bridged,
                stop = ?report.stop,
                "심볼 크롤링 완료"
            ),
            SymbolOutcome::NotListed => tracing::info!(
                symbol = %symbol,
                progress = progress,
                elapsed = elapsed,
                "데이터 없음, 건너뜀"
            ),
            SymbolOutcome::ResolveFailed => tracing::warn!(
                symbol = %symbol,
                progress = progress,
                elapsed = elapsed,
                "시작일 미확인, 건너뜀"
            ),
            SymbolOutcome::Failed(error) => tracing::error!(
                symbol = %symbol,
                progress = progress,
                elapsed = elapsed,
                error = %error,
                "심볼 크롤링 실패"
            ),
            SymbolOutcome::Cancelled => tracing::info!(
                symbol = %symbol,
                progress = progress,
                elapsed = elapsed,
                "취소됨"
            ),
        }
    }
}
