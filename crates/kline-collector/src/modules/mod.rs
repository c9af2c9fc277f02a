//! 크롤링 모듈.

pub mod crawl;
pub mod filter;
pub mod orchestrator;
pub mod resolver;

pub use crawl::{CrawlEngine, CrawlReport, StopReason};
pub use filter::SymbolFilter;
pub use orchestrator::{Orchestrator, SymbolOutcome};
pub use resolver::{Resolution, StartDateResolver};
