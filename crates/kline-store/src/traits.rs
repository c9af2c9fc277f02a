//! 저장소 인터페이스.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kline_core::{Bar, ProgressRecord, Symbol};

use crate::crawl_log::CrawlLogEntry;
use crate::error::{DataError, Result};
use crate::metrics::TableMetrics;

/// 진행 기록과 캔들 아카이브 저장소.
///
/// 구현체는 `(exchange, symbol, open_time)` 고유성을 보장해야 하며,
/// 이미 저장된 캔들과 충돌하는 행은 조용히 건너뜁니다.
#[async_trait]
pub trait KlineStore: Send + Sync {
    /// 심볼의 최초 분봉 시각 조회.
    async fn get_progress(&self, symbol: &Symbol) -> Result<Option<DateTime<Utc>>>;

    /// 심볼의 최초 분봉 시각 기록. 이미 기록이 있으면 유지합니다.
    async fn set_progress(&self, symbol: &Symbol, start_date: DateTime<Utc>) -> Result<()>;

    /// 전체 진행 기록 조회 (심볼 순).
    async fn get_all_progress(&self) -> Result<Vec<ProgressRecord>>;

    /// 저장된 마지막 캔들의 close_time 조회.
    async fn get_latest_close(&self, symbol: &Symbol, exchange: &str)
        -> Result<Option<DateTime<Utc>>>;

    /// 캔들 페이지 저장.
    ///
    /// 페이지 전체가 저장되거나 전혀 저장되지 않습니다.
    /// 실제로 새로 저장된 행 수를 반환합니다.
    async fn insert_bars(&self, bars: &[Bar], exchange: &str) -> Result<u64>;

    /// 심볼 처리 결과 기록.
    async fn append_log(&self, entry: &CrawlLogEntry) -> Result<()>;

    /// 최근 기록부터 `limit`건 조회.
    async fn recent_logs(&self, limit: usize) -> Result<Vec<CrawlLogEntry>>;

    /// 캔들 테이블 크기 지표. 지원하지 않는 저장소는 `None`.
    async fn table_metrics(&self) -> Result<Option<TableMetrics>> {
        Ok(None)
    }
}

/// 저장 전 페이지 검증.
///
/// open_time이 interval 경계에 정렬되지 않았거나 거래 횟수가 BIGINT 범위를 넘는
/// 캔들이 하나라도 있으면 페이지 전체를 거부합니다.
pub fn validate_page(bars: &[Bar]) -> Result<()> {
    if let Some(bar) = bars.iter().find(|b| !b.is_aligned()) {
        return Err(DataError::InvalidData(format!(
            "{} {} open_time {} is not aligned",
            bar.symbol, bar.interval, bar.open_time
        )));
    }

    if let Some(bar) = bars.iter().find(|b| i64::try_from(b.trade_count).is_err()) {
        return Err(DataError::InvalidData(format!(
            "{} {} trade count {} exceeds BIGINT",
            bar.symbol, bar.open_time, bar.trade_count
        )));
    }

    Ok(())
}
