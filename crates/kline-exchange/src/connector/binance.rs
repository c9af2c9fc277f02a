//! Binance 거래소 커넥터.
//!
//! Binance Spot 공개 REST API로 심볼 목록과 과거 캔들을 조회합니다.
//! 인증이 필요 없는 엔드포인트만 사용하며, 요청 간 최소 간격을 지켜
//! 여러 워커가 클라이언트 하나를 공유해도 요청 한도를 넘지 않도록 합니다.

use crate::traits::{ExchangeResult, KlineSource};
use crate::ExchangeError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kline_core::{Bar, Interval, Symbol};
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::de::IgnoredAny;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, warn};

/// Binance 캔들 조회 최대 개수.
pub const MAX_KLINE_LIMIT: u32 = 1000;

// ============================================================================
// 설정
// ============================================================================

/// Binance 클라이언트 설정.
#[derive(Debug, Clone)]
pub struct BinanceConfig {
    /// 테스트넷 사용
    pub testnet: bool,
    /// REST 기본 URL 재정의 (프록시/테스트 서버)
    pub base_url: Option<String>,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
    /// 요청 간 최소 간격 (밀리초)
    pub request_delay_ms: u64,
}

impl Default for BinanceConfig {
    fn default() -> Self {
        Self {
            testnet: false,
            base_url: None,
            timeout_secs: 30,
            request_delay_ms: 250,
        }
    }
}

impl BinanceConfig {
    /// 테스트넷 사용.
    pub fn with_testnet(mut self, testnet: bool) -> Self {
        self.testnet = testnet;
        self
    }

    /// REST 기본 URL 지정.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// 요청 간 최소 간격 지정.
    pub fn with_request_delay_ms(mut self, delay_ms: u64) -> Self {
        self.request_delay_ms = delay_ms;
        self
    }

    /// 환경 변수에서 생성. 설정되지 않은 값은 기본값을 사용합니다.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            testnet: std::env::var("BINANCE_TESTNET")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(false),
            base_url: std::env::var("BINANCE_BASE_URL").ok(),
            timeout_secs: std::env::var("BINANCE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.timeout_secs),
            request_delay_ms: std::env::var("BINANCE_REQUEST_DELAY_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.request_delay_ms),
        }
    }

    /// REST API 기본 URL 반환.
    pub fn rest_base_url(&self) -> &str {
        if let Some(url) = &self.base_url {
            url.trim_end_matches('/')
        } else if self.testnet {
            "https://testnet.binance.vision"
        } else {
            "https://api.binance.com"
        }
    }

    /// 요청 간 최소 간격.
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

// ============================================================================
// API 응답 타입
// ============================================================================

#[derive(Debug, Deserialize)]
struct BinanceExchangeInfo {
    symbols: Vec<BinanceSymbolInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceSymbolInfo {
    symbol: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct BinanceKline(
    i64,        // 0: Open time
    String,     // 1: Open
    String,     // 2: High
    String,     // 3: Low
    String,     // 4: Close
    String,     // 5: Volume
    i64,        // 6: Close time
    String,     // 7: Quote asset volume
    u64,        // 8: Number of trades
    String,     // 9: Taker buy base asset volume
    String,     // 10: Taker buy quote asset volume
    IgnoredAny, // 11: Ignore
);

#[derive(Debug, Deserialize)]
struct BinanceError {
    code: i32,
    msg: String,
}

// ============================================================================
// Binance 클라이언트
// ============================================================================

/// Binance 과거 데이터 클라이언트.
pub struct BinanceClient {
    config: BinanceConfig,
    client: Client,
    /// 마지막 요청 시각 (요청 간격 제한용)
    last_request: Mutex<Option<Instant>>,
}

impl BinanceClient {
    /// 새 Binance 클라이언트 생성.
    ///
    /// # Errors
    /// HTTP 클라이언트 생성에 실패하면 `ExchangeError::NetworkError`를 반환합니다.
    pub fn new(config: BinanceConfig) -> Result<Self, ExchangeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                ExchangeError::NetworkError(format!("HTTP 클라이언트 생성 실패: {}", e))
            })?;

        Ok(Self {
            config,
            client,
            last_request: Mutex::new(None),
        })
    }

    /// 직전 요청 이후 최소 간격이 지날 때까지 대기.
    ///
    /// 락은 대기 동안만 잡고 HTTP 요청 중에는 잡지 않습니다.
    async fn pace(&self) {
        let delay = self.config.request_delay();
        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < delay {
                tokio::time::sleep(delay - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// 파라미터에서 쿼리 문자열 생성.
    fn build_query(params: &[(&str, String)]) -> String {
        params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// 공개 API 요청 (인증 불필요).
    async fn public_get<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> ExchangeResult<T> {
        let url = format!("{}{}", self.config.rest_base_url(), endpoint);
        let query = Self::build_query(params);

        let full_url = if query.is_empty() {
            url
        } else {
            format!("{}?{}", url, query)
        };

        self.pace().await;
        debug!("GET {}", full_url);

        let response = self
            .client
            .get(&full_url)
            .send()
            .await
            .map_err(ExchangeError::from)?;

        self.handle_response(response).await
    }

    /// API 응답 처리.
    async fn handle_response<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> ExchangeResult<T> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ExchangeError::NetworkError(e.to_string()))?;

        if status.is_success() {
            return serde_json::from_str(&body).map_err(|e| {
                error!("Failed to parse response: {} - Body: {}", e, body);
                ExchangeError::ParseError(e.to_string())
            });
        }

        match status {
            StatusCode::TOO_MANY_REQUESTS => {
                warn!("Binance 요청 한도 초과 (429)");
                Err(ExchangeError::RateLimited)
            }
            StatusCode::IM_A_TEAPOT => Err(ExchangeError::Banned(body)),
            _ => {
                // 에러 응답 파싱 시도
                if let Ok(error) = serde_json::from_str::<BinanceError>(&body) {
                    Err(Self::map_error_code(error.code, &error.msg))
                } else {
                    Err(ExchangeError::ApiError {
                        code: status.as_u16() as i32,
                        message: body,
                    })
                }
            }
        }
    }

    /// Binance 에러 코드를 ExchangeError로 매핑.
    fn map_error_code(code: i32, msg: &str) -> ExchangeError {
        match code {
            -1000 => ExchangeError::Unknown(msg.to_string()),
            -1001 => ExchangeError::Disconnected(msg.to_string()),
            -1003 => ExchangeError::RateLimited,
            -1021 => ExchangeError::TimestampError(msg.to_string()),
            -1121 => ExchangeError::SymbolNotFound(msg.to_string()),
            _ => ExchangeError::ApiError {
                code,
                message: msg.to_string(),
            },
        }
    }

    /// 문자열에서 Decimal 파싱.
    fn parse_decimal(s: &str) -> ExchangeResult<Decimal> {
        s.parse()
            .map_err(|_| ExchangeError::ParseError(format!("잘못된 숫자: {}", s)))
    }

    /// 밀리초 타임스탬프 파싱.
    fn parse_millis(ms: i64) -> ExchangeResult<DateTime<Utc>> {
        DateTime::from_timestamp_millis(ms)
            .ok_or_else(|| ExchangeError::TimestampError(format!("범위를 벗어난 시각: {}", ms)))
    }

    /// Binance 캔들 응답을 내부 Bar로 변환.
    fn to_bar(symbol: &Symbol, interval: Interval, k: BinanceKline) -> ExchangeResult<Bar> {
        Ok(Bar {
            symbol: symbol.clone(),
            interval,
            open_time: Self::parse_millis(k.0)?,
            open: Self::parse_decimal(&k.1)?,
            high: Self::parse_decimal(&k.2)?,
            low: Self::parse_decimal(&k.3)?,
            close: Self::parse_decimal(&k.4)?,
            volume: Self::parse_decimal(&k.5)?,
            close_time: Self::parse_millis(k.6)?,
            quote_volume: Self::parse_decimal(&k.7)?,
            trade_count: k.8,
            taker_buy_base_volume: Self::parse_decimal(&k.9)?,
            taker_buy_quote_volume: Self::parse_decimal(&k.10)?,
        })
    }
}

#[async_trait]
impl KlineSource for BinanceClient {
    fn name(&self) -> &str {
        if self.config.testnet {
            "binance-testnet"
        } else {
            "binance"
        }
    }

    async fn list_symbols(&self) -> ExchangeResult<Vec<Symbol>> {
        let info: BinanceExchangeInfo = self.public_get("/api/v3/exchangeInfo", &[]).await?;

        let symbols: Vec<Symbol> = info
            .symbols
            .into_iter()
            .filter(|s| s.status == "TRADING")
            .map(|s| Symbol::new(s.symbol))
            .collect();

        debug!(count = symbols.len(), "Binance 심볼 목록 조회 완료");
        Ok(symbols)
    }

    async fn get_bars(
        &self,
        symbol: &Symbol,
        interval: Interval,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: u32,
    ) -> ExchangeResult<Vec<Bar>> {
        let limit = limit.clamp(1, MAX_KLINE_LIMIT);

        let resp: Vec<BinanceKline> = self
            .public_get(
                "/api/v3/klines",
                &[
                    ("symbol", symbol.to_string()),
                    ("interval", interval.to_binance_interval().to_string()),
                    ("startTime", start.timestamp_millis().to_string()),
                    ("endTime", end.timestamp_millis().to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;

        resp.into_iter()
            .map(|k| Self::to_bar(symbol, interval, k))
            .collect()
    }
}
