//! 캔들스틱 간격 정의.
//!
//! 크롤러는 두 가지 간격만 사용합니다:
//! - 일봉: 상장일 탐색용 (요청 수가 적음)
//! - 분봉: 실제로 저장되는 간격

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::CoreError;

/// 캔들스틱 간격.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interval {
    /// 1분봉
    M1,
    /// 일봉
    D1,
}

impl Interval {
    /// 이 간격의 기간을 반환합니다.
    pub fn duration(&self) -> Duration {
        match self {
            Interval::M1 => Duration::minutes(1),
            Interval::D1 => Duration::days(1),
        }
    }

    /// 이 간격의 초 단위 값을 반환합니다.
    pub fn as_secs(&self) -> i64 {
        self.duration().num_seconds()
    }

    /// 바이낸스 간격 문자열로 변환합니다.
    pub fn to_binance_interval(&self) -> &'static str {
        match self {
            Interval::M1 => "1m",
            Interval::D1 => "1d",
        }
    }

    /// 바이낸스 간격 문자열에서 파싱합니다.
    pub fn from_binance_interval(s: &str) -> Option<Self> {
        match s {
            "1m" => Some(Interval::M1),
            "1d" => Some(Interval::D1),
            _ => None,
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_binance_interval())
    }
}

impl FromStr for Interval {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_binance_interval(s).ok_or_else(|| CoreError::InvalidInterval(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_duration() {
        assert_eq!(Interval::M1.as_secs(), 60);
        assert_eq!(Interval::D1.as_secs(), 86400);
    }

    #[test]
    fn test_interval_binance() {
        assert_eq!(Interval::M1.to_binance_interval(), "1m");
        assert_eq!("1d".parse::<Interval>().unwrap(), Interval::D1);
        assert!("4h".parse::<Interval>().is_err());
    }
}
