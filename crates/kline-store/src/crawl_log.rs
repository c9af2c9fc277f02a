//! 심볼별 크롤링 결과 기록.
//!
//! 실행이 끝난 뒤에도 어떤 심볼이 저장/건너뜀/실패했는지 조회할 수 있도록
//! 결과 한 건을 `crawl_log` 테이블의 한 행으로 남깁니다.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use kline_core::Symbol;
use serde::{Deserialize, Serialize};

use crate::error::DataError;

/// 기록한 프로그램을 지정하지 않았을 때의 값.
pub const UNKNOWN_SOURCE: &str = "unknown";

/// 기록 수준.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(Self::Info),
            "warn" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(DataError::InvalidData(format!("unknown log level: {}", other))),
        }
    }
}

/// 크롤링 결과 한 건.
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlLogEntry {
    /// 기록 시각
    pub logged_at: DateTime<Utc>,
    pub level: LogLevel,
    /// 기록한 프로그램
    pub source: String,
    pub symbol: Symbol,
    pub exchange: String,
    /// 결과 구분 (crawled, not_listed, resolve_failed, failed, cancelled)
    pub outcome: String,
    pub message: String,
    /// 실패 원인
    pub exception: Option<String>,
    /// 결과별 추가 필드 (저장 건수, 종료 사유 등)
    pub properties: serde_json::Value,
}

impl CrawlLogEntry {
    pub fn new(
        logged_at: DateTime<Utc>,
        level: LogLevel,
        symbol: Symbol,
        exchange: impl Into<String>,
        outcome: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            logged_at,
            level,
            source: UNKNOWN_SOURCE.to_string(),
            symbol,
            exchange: exchange.into(),
            outcome: outcome.into(),
            message: message.into(),
            exception: None,
            properties: serde_json::Value::Object(serde_json::Map::new()),
        }
    }

    /// 기록한 프로그램 지정.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// 실패 원인 지정.
    pub fn with_exception(mut self, exception: impl Into<String>) -> Self {
        self.exception = Some(exception.into());
        self
    }

    /// 추가 필드 지정.
    pub fn with_properties(mut self, properties: serde_json::Value) -> Self {
        self.properties = properties;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_log_level_round_trip_through_text() {
        for level in [LogLevel::Info, LogLevel::Warn, LogLevel::Error] {
            assert_eq!(level.as_str().parse::<LogLevel>().unwrap(), level);
        }
        assert!("fatal".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_entry_builder() {
        let at = Utc.with_ymd_and_hms(2022, 3, 1, 0, 0, 0).unwrap();
        let entry = CrawlLogEntry::new(
            at,
            LogLevel::Error,
            Symbol::new("ETHBTC"),
            "Binance",
            "failed",
            "crawl failed",
        );
        assert_eq!(entry.source, UNKNOWN_SOURCE);
        assert_eq!(entry.properties, serde_json::json!({}));

        let entry = entry
            .with_source("kline-collector")
            .with_exception("connection reset")
            .with_properties(serde_json::json!({ "pages": 2 }));

        assert_eq!(entry.source, "kline-collector");
        assert_eq!(entry.exception.as_deref(), Some("connection reset"));
        assert_eq!(entry.properties["pages"], 2);
    }
}
