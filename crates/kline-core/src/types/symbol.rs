//! 심볼 정의.
//!
//! 심볼은 거래소 범위의 불투명한 토큰입니다 (예: `BTCUSDT`).
//! 거래소 어댑터에서 받은 값은 그대로 사용하고, 설정에서 들어온 값만
//! [`Symbol::parse`]로 검증합니다.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::CoreError;

/// 거래 가능한 페어 식별자.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// 거래소가 돌려준 심볼을 그대로 감쌉니다.
    pub fn new(symbol: impl Into<String>) -> Self {
        Self(symbol.into())
    }

    /// 사용자 입력 심볼을 검증 후 대문자로 정규화합니다.
    ///
    /// 허용 문자: 영문, 숫자, `_`, `-`.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let token = raw.trim();
        if token.is_empty() {
            return Err(CoreError::InvalidSymbol("빈 심볼".to_string()));
        }
        if !token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(CoreError::InvalidSymbol(token.to_string()));
        }
        Ok(Self(token.to_ascii_uppercase()))
    }

    /// 쉼표로 구분된 심볼 목록을 파싱합니다.
    ///
    /// 입력 전체가 비어 있으면 빈 목록을, 중간에 빈 항목이 있으면 에러를 반환합니다.
    pub fn parse_list(raw: &str) -> Result<Vec<Self>, CoreError> {
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        raw.split(',').map(Self::parse).collect()
    }

    /// 문자열 참조 반환.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Symbol {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_parse_normalizes_case() {
        let symbol = Symbol::parse(" btcusdt ").unwrap();
        assert_eq!(symbol.as_str(), "BTCUSDT");
    }

    #[test]
    fn test_symbol_parse_rejects_garbage() {
        assert!(Symbol::parse("").is_err());
        assert!(Symbol::parse("BTC/USDT").is_err());
        assert!(Symbol::parse("BTC USDT").is_err());
    }

    #[test]
    fn test_symbol_parse_list() {
        let list = Symbol::parse_list("BTCUSDT, ethusdt").unwrap();
        assert_eq!(list, vec![Symbol::new("BTCUSDT"), Symbol::new("ETHUSDT")]);

        assert!(Symbol::parse_list("").unwrap().is_empty());
        assert!(Symbol::parse_list("BTCUSDT,,ETHUSDT").is_err());
    }

    #[test]
    fn test_symbol_display() {
        assert_eq!(Symbol::new("BNBBTC").to_string(), "BNBBTC");
    }
}
