//! 현재 시각 추상화.
//!
//! 크롤러는 "지금"을 기준으로 종료 여부를 판단하므로, 테스트에서
//! 시각을 고정할 수 있도록 trait으로 분리합니다.

use chrono::{DateTime, Utc};

/// 현재 UTC 시각 제공자.
pub trait Clock: Send + Sync {
    /// 현재 시각 반환.
    fn now(&self) -> DateTime<Utc>;
}

/// 시스템 시계.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 고정 시각 시계 (테스트/재현용).
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
