//! Kline backfill crawler CLI.

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use kline_collector::config::parse_timestamp;
use kline_collector::{CollectorConfig, CrawlOverrides, Orchestrator, TracingObserver};
use kline_core::{init_logging, Clock, LogConfig, LogFormat, Symbol, SystemClock};
use kline_exchange::{BinanceClient, KlineSource};
use kline_store::{DatabaseConfig, KlineStore, PgKlineStore};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "kline-collector")]
#[command(about = "Gap-aware kline backfill crawler", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// 로그 형식 (pretty, json, compact)
    #[arg(long, env = "LOG_FORMAT", default_value = "pretty")]
    log_format: LogFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// 전체 심볼 크롤링 1회 실행
    Crawl {
        /// 허용 목록 (쉼표로 구분, 예: "BTCUSDT,ETHUSDT")
        #[arg(long)]
        symbols: Option<String>,

        /// 제외 목록 (쉼표로 구분)
        #[arg(long)]
        exclude: Option<String>,

        /// 상장 순서상 이 심볼부터 시작
        #[arg(long)]
        start_from: Option<String>,

        /// 동시에 크롤링할 심볼 수
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// 심볼의 첫 분봉 시각 조회 (저장하지 않음)
    Resolve {
        /// 대상 심볼
        #[arg(long)]
        symbol: String,

        /// 탐색 하한 (RFC 3339 또는 YYYY-MM-DD)
        #[arg(long)]
        after: Option<String>,
    },

    /// 저장된 시작일 목록
    Progress,

    /// 최근 심볼별 크롤링 결과
    Logs {
        /// 조회할 건수
        #[arg(long, default_value = "50")]
        limit: usize,
    },

    /// 캔들 테이블 크기
    Metrics,

    /// 데몬 모드: 주기적으로 크롤링 실행
    Daemon,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 로깅 초기화
    init_logging(&LogConfig::new(cli.log_level.clone()).with_format(cli.log_format))
        .map_err(|e| anyhow::anyhow!("logging init failed: {}", e))?;

    tracing::info!("Kline Collector 시작");

    // 설정 로드
    let mut config = CollectorConfig::from_env()?;
    tracing::debug!(
        exchange_tag = %config.crawl.exchange_tag,
        page_size = config.crawl.page_size,
        "설정 로드 완료"
    );

    let source: Arc<dyn KlineSource> = Arc::new(
        BinanceClient::new(config.binance.clone()).context("Binance 클라이언트 생성 실패")?,
    );
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // DB 연결 및 마이그레이션
    let db_config = DatabaseConfig::new(config.database_url.clone())
        .with_max_connections(config.crawl.concurrency as u32 + 1);
    let pg = PgKlineStore::connect(&db_config).await?;
    pg.migrate().await?;
    let store: Arc<dyn KlineStore> = Arc::new(pg.clone());

    // 명령 실행
    match cli.command {
        Commands::Crawl {
            symbols,
            exclude,
            start_from,
            concurrency,
        } => {
            config.crawl = config.crawl.apply(CrawlOverrides {
                symbols,
                exclude,
                start_from,
                concurrency,
            })?;
            let orchestrator = Orchestrator::new(
                source,
                store,
                clock,
                &config.crawl,
                Arc::new(TracingObserver),
            )?;

            let cancel = CancellationToken::new();
            let signal = tokio::spawn(shutdown_signal(cancel.clone()));

            let stats = orchestrator.run(&cancel).await?;
            stats.log_summary("분봉 크롤링");
            signal.abort();
        }
        Commands::Resolve { symbol, after } => {
            let symbol = Symbol::parse(&symbol)?;
            let lower_bound = after.as_deref().map(parse_timestamp).transpose()?;
            let orchestrator = Orchestrator::new(
                source,
                store,
                clock,
                &config.crawl,
                Arc::new(TracingObserver),
            )?;

            match orchestrator.resolver().resolve(&symbol, lower_bound).await.found() {
                Some(start) => println!("{}\t{}", symbol, start.to_rfc3339()),
                None => println!("{}\t-", symbol),
            }
        }
        Commands::Progress => {
            let records = store.get_all_progress().await?;
            for record in &records {
                println!("{}\t{}", record.symbol, record.start_date.to_rfc3339());
            }
            tracing::info!(count = records.len(), "시작일 목록 조회 완료");
        }
        Commands::Logs { limit } => {
            for entry in store.recent_logs(limit).await? {
                println!(
                    "{}\t{}\t{}\t{}\t{}{}",
                    entry.logged_at.to_rfc3339(),
                    entry.level,
                    entry.symbol,
                    entry.outcome,
                    entry.message,
                    entry
                        .exception
                        .map(|e| format!(" ({})", e))
                        .unwrap_or_default()
                );
            }
        }
        Commands::Metrics => match store.table_metrics().await? {
            Some(metrics) => println!("{}", metrics.summary()),
            None => println!("klines table not found"),
        },
        Commands::Daemon => {
            tracing::info!(
                "=== 데몬 모드 시작 (주기: {}분) ===",
                config.daemon.interval_minutes
            );

            let orchestrator = Orchestrator::new(
                source,
                store,
                clock,
                &config.crawl,
                Arc::new(TracingObserver),
            )?;
            let cancel = CancellationToken::new();
            tokio::spawn(shutdown_signal(cancel.clone()));

            let mut interval = tokio::time::interval(config.daemon.interval());
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::info!("종료 신호 수신, 데몬 종료 중...");
                        break;
                    }
                    _ = interval.tick() => {
                        tracing::info!("=== 크롤링 실행 시작 ===");

                        match orchestrator.run(&cancel).await {
                            Ok(stats) => stats.log_summary("분봉 크롤링"),
                            Err(e) => tracing::error!("크롤링 실패: {}", e),
                        }

                        tracing::info!(
                            "=== 크롤링 완료, 다음 실행: {}분 후 ===",
                            config.daemon.interval_minutes
                        );
                    }
                }
            }
        }
    }

    pg.pool().close().await;
    tracing::info!("Kline Collector 종료");

    Ok(())
}

/// Ctrl+C 또는 SIGTERM을 받으면 진행 중인 크롤링을 취소합니다.
///
/// 크롤링은 페이지 단위로 멈추며, 저장된 데이터에서 다시 재개합니다.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Ctrl+C 핸들러 설치 실패");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM 핸들러 설치 실패");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::warn!("Ctrl+C 수신, 현재 페이지 이후 중단합니다");
        }
        _ = terminate => {
            tracing::warn!("SIGTERM 수신, 현재 페이지 이후 중단합니다");
        }
    }

    cancel.cancel();
}
