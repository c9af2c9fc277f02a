//! 환경변수 기반 설정 모듈.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use kline_core::{normalize_utc, Symbol};
use kline_exchange::{BinanceConfig, MAX_KLINE_LIMIT};

use crate::error::CollectorError;
use crate::Result;

/// 페이지 크기 하한. 2 미만이면 윈도우 끝이 시작과 같아 커서가 진행하지 않습니다.
pub const MIN_PAGE_SIZE: u32 = 2;

/// 페이지 크기를 `MIN_PAGE_SIZE..=MAX_KLINE_LIMIT` 범위로 맞춤.
pub fn clamp_page_size(page_size: u32) -> u32 {
    page_size.clamp(MIN_PAGE_SIZE, MAX_KLINE_LIMIT)
}

/// 기본 거래소 태그
pub const DEFAULT_EXCHANGE_TAG: &str = "Binance";

/// 시작일 탐색의 기본 하한 (2015-01-01 12:00 UTC).
pub fn default_history_floor() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2015, 1, 1, 12, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Collector 전체 설정
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// 데이터베이스 URL
    pub database_url: String,
    /// 크롤링 설정
    pub crawl: CrawlConfig,
    /// Binance 클라이언트 설정
    pub binance: BinanceConfig,
    /// 데몬 모드 설정
    pub daemon: DaemonConfig,
}

/// 크롤링 설정
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// 저장되는 모든 행에 붙는 거래소 태그
    pub exchange_tag: String,
    /// 페이지당 캔들 수
    pub page_size: u32,
    /// 시작일 탐색 하한
    pub history_floor: DateTime<Utc>,
    /// 동시에 크롤링할 심볼 수
    pub concurrency: usize,
    /// 허용 목록 (비어 있으면 전체)
    pub symbols: Vec<Symbol>,
    /// 제외 목록
    pub exclude: Vec<Symbol>,
    /// 상장 순서상 이 심볼부터 시작
    pub start_from: Option<Symbol>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            exchange_tag: DEFAULT_EXCHANGE_TAG.to_string(),
            page_size: MAX_KLINE_LIMIT,
            history_floor: default_history_floor(),
            concurrency: 1,
            symbols: Vec::new(),
            exclude: Vec::new(),
            start_from: None,
        }
    }
}

/// 데몬 모드 설정
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// 크롤링 실행 주기 (분 단위)
    pub interval_minutes: u64,
}

/// CLI에서 덮어쓰는 크롤링 옵션.
#[derive(Debug, Clone, Default)]
pub struct CrawlOverrides {
    pub symbols: Option<String>,
    pub exclude: Option<String>,
    pub start_from: Option<String>,
    pub concurrency: Option<usize>,
}

impl CollectorConfig {
    /// 환경변수에서 설정 로드
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL").map_err(|_| {
            CollectorError::Config("DATABASE_URL 환경변수가 설정되지 않았습니다".to_string())
        })?;

        Ok(Self {
            database_url,
            crawl: CrawlConfig::from_vars(|key| std::env::var(key).ok())?,
            binance: BinanceConfig::from_env(),
            daemon: DaemonConfig {
                interval_minutes: env_var_parse("DAEMON_INTERVAL_MINUTES", 60),
            },
        })
    }
}

impl CrawlConfig {
    /// 변수 조회 함수로 설정을 읽고 검증합니다.
    pub fn from_vars<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let history_floor = match var("CRAWL_HISTORY_FLOOR") {
            Some(raw) => parse_timestamp(&raw)?,
            None => defaults.history_floor,
        };

        let config = Self {
            exchange_tag: var("CRAWL_EXCHANGE_TAG")
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.exchange_tag),
            page_size: parse_number(&var, "CRAWL_PAGE_SIZE", defaults.page_size)?,
            history_floor,
            concurrency: parse_number(&var, "CRAWL_CONCURRENCY", defaults.concurrency)?,
            symbols: parse_symbols(var("CRAWL_SYMBOLS").as_deref())?,
            exclude: parse_symbols(var("CRAWL_EXCLUDE_SYMBOLS").as_deref())?,
            start_from: parse_symbol(var("CRAWL_START_FROM").as_deref())?,
        };

        config.validate()?;
        Ok(config)
    }

    /// CLI 옵션을 적용하고 다시 검증합니다.
    pub fn apply(mut self, overrides: CrawlOverrides) -> Result<Self> {
        if let Some(raw) = overrides.symbols {
            self.symbols = parse_symbols(Some(&raw))?;
        }
        if let Some(raw) = overrides.exclude {
            self.exclude = parse_symbols(Some(&raw))?;
        }
        if let Some(raw) = overrides.start_from {
            self.start_from = parse_symbol(Some(&raw))?;
        }
        if let Some(concurrency) = overrides.concurrency {
            self.concurrency = concurrency;
        }

        self.validate()?;
        Ok(self)
    }

    /// 설정 검증.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_PAGE_SIZE..=MAX_KLINE_LIMIT).contains(&self.page_size) {
            return Err(CollectorError::Config(format!(
                "page size {} is outside {}..={}",
                self.page_size, MIN_PAGE_SIZE, MAX_KLINE_LIMIT
            )));
        }

        if self.concurrency == 0 {
            return Err(CollectorError::Config(
                "concurrency must be at least 1".to_string(),
            ));
        }

        if self.exchange_tag.is_empty() {
            return Err(CollectorError::Config("exchange tag is empty".to_string()));
        }

        let excluded: HashSet<&Symbol> = self.exclude.iter().collect();
        if let Some(both) = self.symbols.iter().find(|s| excluded.contains(s)) {
            return Err(CollectorError::Config(format!(
                "{} is in both the allow-list and the deny-list",
                both
            )));
        }

        Ok(())
    }
}

impl DaemonConfig {
    /// 실행 주기를 Duration으로 반환
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes.max(1) * 60)
    }
}

fn parse_symbols(raw: Option<&str>) -> Result<Vec<Symbol>> {
    match raw {
        Some(raw) => Ok(Symbol::parse_list(raw)?),
        None => Ok(Vec::new()),
    }
}

fn parse_symbol(raw: Option<&str>) -> Result<Option<Symbol>> {
    match raw.map(str::trim) {
        Some(raw) if !raw.is_empty() => Ok(Some(Symbol::parse(raw)?)),
        _ => Ok(None),
    }
}

/// RFC 3339 또는 `YYYY-MM-DD` 형식의 시각 파싱.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(normalize_utc)
        .ok_or_else(|| CollectorError::Config(format!("invalid timestamp: {}", raw)))
}

fn parse_number<F, T>(var: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| CollectorError::Config(format!("{} is not a valid number: {}", key, raw))),
        None => Ok(default),
    }
}

/// 환경변수에서 값을 파싱 (실패 시 기본값 사용)
fn env_var_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
