//! 윈도우/간격 계산.
//!
//! 모든 시각은 UTC 기준입니다. 타임존 정보가 다른 시각은 변환하지 않고
//! 벽시계 값을 그대로 UTC로 재해석합니다 (거래소의 epoch 경계와 일치).

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};

use crate::Interval;

/// 페이지 하나가 덮는 요청 구간 `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    /// 구간 시작 (포함)
    pub start: DateTime<Utc>,
    /// 구간 끝 (포함)
    pub end: DateTime<Utc>,
    /// 캔들 간격
    pub interval: Interval,
    /// 페이지당 최대 캔들 수
    pub page_size: u32,
}

impl Window {
    /// `start`에서 시작하는 윈도우를 생성합니다.
    pub fn starting_at(start: DateTime<Utc>, interval: Interval, page_size: u32) -> Self {
        Self {
            start,
            end: window_end(start, interval, page_size),
            interval,
            page_size,
        }
    }

    /// 현재 윈도우 끝에서 시작하는 다음 윈도우.
    pub fn next(&self) -> Self {
        Self::starting_at(self.end, self.interval, self.page_size)
    }

    /// 윈도우 길이.
    pub fn span(&self) -> Duration {
        self.end - self.start
    }
}

/// `start + (N - 1) * unit`.
pub fn window_end(start: DateTime<Utc>, interval: Interval, page_size: u32) -> DateTime<Utc> {
    let steps = page_size.saturating_sub(1).min(i32::MAX as u32) as i32;
    start + interval.duration() * steps
}

/// 간격 경계로 내림 (epoch 기준).
pub fn truncate(ts: DateTime<Utc>, interval: Interval) -> DateTime<Utc> {
    let step = interval.as_secs();
    let floored = ts.timestamp().div_euclid(step) * step;
    DateTime::from_timestamp(floored, 0).unwrap_or(ts)
}

/// 간격 경계에 정확히 맞는지 확인.
pub fn is_aligned(ts: DateTime<Utc>, interval: Interval) -> bool {
    truncate(ts, interval) == ts
}

/// 타임존 없는 시각을 UTC로 해석.
pub fn normalize_utc(naive: NaiveDateTime) -> DateTime<Utc> {
    naive.and_utc()
}

/// 다른 타임존의 시각을 벽시계 값 그대로 UTC로 재해석.
pub fn reinterpret_utc<Tz: TimeZone>(ts: &DateTime<Tz>) -> DateTime<Utc> {
    ts.naive_local().and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, NaiveDate, Timelike};
    use proptest::prelude::*;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    #[test]
    fn test_window_end_minutes() {
        let start = utc(2021, 3, 1, 0, 0, 0);
        assert_eq!(
            window_end(start, Interval::M1, 1000),
            start + Duration::minutes(999)
        );
        assert_eq!(window_end(start, Interval::M1, 1), start);
        assert_eq!(window_end(start, Interval::M1, 0), start);
    }

    #[test]
    fn test_window_next_starts_at_previous_end() {
        let window = Window::starting_at(utc(2020, 1, 1, 12, 0, 0), Interval::D1, 1000);
        let next = window.next();
        assert_eq!(next.start, window.end);
        assert_eq!(next.span(), Duration::days(999));
    }

    #[test]
    fn test_truncate_minute_and_day() {
        let ts = utc(2019, 7, 14, 8, 31, 47) + Duration::milliseconds(999);
        let minute = truncate(ts, Interval::M1);
        assert_eq!(minute, utc(2019, 7, 14, 8, 31, 0));
        assert_eq!(minute.second(), 0);
        assert_eq!(minute.nanosecond(), 0);
        assert_eq!(truncate(ts, Interval::D1), utc(2019, 7, 14, 0, 0, 0));
    }

    #[test]
    fn test_reinterpret_keeps_wall_clock() {
        let offset = FixedOffset::east_opt(9 * 3600).unwrap();
        let local = offset.with_ymd_and_hms(2018, 1, 1, 12, 0, 0).unwrap();
        assert_eq!(reinterpret_utc(&local), utc(2018, 1, 1, 12, 0, 0));

        let naive = NaiveDate::from_ymd_opt(2018, 1, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        assert_eq!(normalize_utc(naive), utc(2018, 1, 1, 12, 0, 0));
    }

    proptest! {
        #[test]
        fn prop_truncate_floors_within_one_interval(secs in 0i64..4_102_444_800, millis in 0i64..1000) {
            let ts = DateTime::from_timestamp(secs, 0).unwrap() + Duration::milliseconds(millis);
            for interval in [Interval::M1, Interval::D1] {
                let floored = truncate(ts, interval);
                prop_assert!(floored <= ts);
                prop_assert!(ts - floored < interval.duration());
                prop_assert!(is_aligned(floored, interval));
                prop_assert_eq!(truncate(floored, interval), floored);
            }
        }

        #[test]
        fn prop_window_span_matches_page_size(secs in 0i64..4_102_444_800, page_size in 1u32..2000) {
            let start = DateTime::from_timestamp(secs, 0).unwrap();
            let window = Window::starting_at(start, Interval::M1, page_size);
            prop_assert_eq!(window.span(), Duration::minutes(page_size as i64 - 1));
            prop_assert!(window.next().start >= window.start);
        }
    }
}
