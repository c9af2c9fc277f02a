//! 수집 통계 구조체.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::modules::SymbolOutcome;

/// 크롤링 실행 통계
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionStats {
    /// 총 시도 횟수
    pub total: usize,
    /// 성공 횟수 (새 캔들 저장)
    pub success: usize,
    /// 에러 횟수 (시작일 탐색 실패 포함)
    pub errors: usize,
    /// 건너뛴 횟수 (거래 이력 없음)
    pub skipped: usize,
    /// 빈 데이터 (크롤링 성공, 새 캔들 없음)
    pub empty: usize,
    /// 취소된 심볼 수
    pub cancelled: usize,
    /// 저장된 총 캔들 수
    pub total_klines: u64,
    /// 건너뛴 공백 수
    pub gaps_bridged: usize,
    /// 소요 시간
    #[serde(skip)]
    pub elapsed: Duration,
}

impl CollectionStats {
    /// 새 통계 객체 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 심볼 결과 집계
    pub fn record(&mut self, outcome: &SymbolOutcome) {
        self.total += 1;
        match outcome {
            SymbolOutcome::Crawled(report) => {
                if report.inserted > 0 {
                    self.success += 1;
                } else {
                    self.empty += 1;
                }
                self.total_klines += report.inserted;
                self.gaps_bridged += report.gaps_bridged;
            }
            SymbolOutcome::NotListed => self.skipped += 1,
            SymbolOutcome::ResolveFailed | SymbolOutcome::Failed(_) => self.errors += 1,
            SymbolOutcome::Cancelled => self.cancelled += 1,
        }
    }

    /// 성공률 계산 (%)
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.success as f64 / self.total as f64) * 100.0
        }
    }

    /// 초당 저장 캔들 수
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 {
            0.0
        } else {
            self.total_klines as f64 / secs
        }
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self, operation: &str) {
        tracing::info!(
            operation = operation,
            total = self.total,
            success = self.success,
            errors = self.errors,
            skipped = self.skipped,
            empty = self.empty,
            cancelled = self.cancelled,
            total_klines = self.total_klines,
            gaps_bridged = self.gaps_bridged,
            success_rate = format!("{:.1}%", self.success_rate()),
            throughput = format!("{:.0}/s", self.throughput()),
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "수집 완료"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::{CrawlReport, StopReason};
    use chrono::Utc;

    fn crawled(inserted: u64, gaps: usize) -> SymbolOutcome {
        SymbolOutcome::Crawled(CrawlReport {
            pages: 1,
            bars: inserted as usize,
            inserted,
            gaps_bridged: gaps,
            stop: StopReason::CaughtUp,
            cursor: Utc::now(),
            elapsed: Duration::from_millis(5),
        })
    }

    #[test]
    fn test_record_outcomes() {
        let mut stats = CollectionStats::new();
        stats.record(&crawled(1200, 1));
        stats.record(&crawled(0, 0));
        stats.record(&SymbolOutcome::NotListed);
        stats.record(&SymbolOutcome::ResolveFailed);
        stats.record(&SymbolOutcome::Cancelled);

        assert_eq!(stats.total, 5);
        assert_eq!(stats.success, 1);
        assert_eq!(stats.empty, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.cancelled, 1);
        assert_eq!(stats.total_klines, 1200);
        assert_eq!(stats.gaps_bridged, 1);
        assert!((stats.success_rate() - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_throughput() {
        let mut stats = CollectionStats::new();
        assert_eq!(stats.throughput(), 0.0);

        stats.total_klines = 3000;
        stats.elapsed = Duration::from_secs(2);
        assert!((stats.throughput() - 1500.0).abs() < f64::EPSILON);
    }
}
