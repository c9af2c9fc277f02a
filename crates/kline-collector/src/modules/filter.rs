//! 크롤링 대상 심볼 필터.

use std::collections::HashSet;

use kline_core::Symbol;

use crate::config::CrawlConfig;
use crate::error::CollectorError;
use crate::Result;

/// 시작 심볼, 허용 목록, 제외 목록 순으로 적용되는 필터.
#[derive(Debug, Clone, Default)]
pub struct SymbolFilter {
    start_from: Option<Symbol>,
    allow: HashSet<Symbol>,
    deny: HashSet<Symbol>,
}

impl SymbolFilter {
    pub fn new(
        start_from: Option<Symbol>,
        allow: impl IntoIterator<Item = Symbol>,
        deny: impl IntoIterator<Item = Symbol>,
    ) -> Self {
        Self {
            start_from,
            allow: allow.into_iter().collect(),
            deny: deny.into_iter().collect(),
        }
    }

    pub fn from_config(config: &CrawlConfig) -> Self {
        Self::new(
            config.start_from.clone(),
            config.symbols.iter().cloned(),
            config.exclude.iter().cloned(),
        )
    }

    /// 상장 순서를 유지한 채 대상 심볼을 고릅니다.
    ///
    /// 시작 심볼이 목록에 없으면 설정 오류입니다.
    pub fn apply(&self, universe: Vec<Symbol>) -> Result<Vec<Symbol>> {
        let mut symbols = universe;

        if let Some(start_from) = &self.start_from {
            let position = symbols
                .iter()
                .position(|s| s == start_from)
                .ok_or_else(|| {
                    CollectorError::Config(format!(
                        "start-from symbol {} is not listed on the exchange",
                        start_from
                    ))
                })?;
            symbols.drain(..position);
        }

        if !self.allow.is_empty() {
            let listed: HashSet<&Symbol> = symbols.iter().collect();
            for missing in self.allow.iter().filter(|s| !listed.contains(s)) {
                tracing::warn!(symbol = %missing, "허용 목록의 심볼이 거래소 목록에 없습니다");
            }
            symbols.retain(|s| self.allow.contains(s));
        }

        symbols.retain(|s| !self.deny.contains(s));
        Ok(symbols)
    }
}
