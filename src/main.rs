use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, LevelFilter};
use tokio::net::TcpListener;

mod employee_hours;
mod glyphs;
mod html_report;
mod logger;
mod pie_chart;
mod server;
mod time_entry;
mod upstream;

use server::{build_router, AppState};
use upstream::{TimeEntriesClient, DEFAULT_API_URL};

/// 従業員ごとの勤務時間をHTMLの表と円グラフで返すHTTPサーバー。
///
/// # Examples
/// ```
/// $ cargo run -- --bind 0.0.0.0:8080
/// $ TIME_ENTRIES_API_URL=https://example.com/api/gettimeentries cargo run
/// ```
#[derive(Debug, Parser)]
#[clap(version, about)]
struct Args {
    #[clap(
        long = "api-url",
        env = "TIME_ENTRIES_API_URL",
        default_value = DEFAULT_API_URL,
        hide_default_value = true,
        help = "Sets the URL of the time entries API"
    )]
    api_url: String,

    #[clap(
        long = "bind",
        env = "REPORT_BIND_ADDR",
        default_value = "127.0.0.1:8080",
        help = "Sets the address to listen on"
    )]
    bind: SocketAddr,

    #[clap(
        long = "timeout-secs",
        env = "REPORT_UPSTREAM_TIMEOUT_SECS",
        default_value = "30",
        help = "Sets the timeout in seconds for requests to the time entries API"
    )]
    timeout_secs: u64,

    #[clap(
        long = "log-level",
        env = "REPORT_LOG_LEVEL",
        default_value = "info",
        help = "Sets the log level (off, error, warn, info, debug, trace)"
    )]
    log_level: LevelFilter,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    logger::init(args.log_level)?;

    let client = TimeEntriesClient::new(&args.api_url, Duration::from_secs(args.timeout_secs))
        .context("Failed to new time entries client")?;
    let router = build_router(AppState {
        repository: Arc::new(client),
    });

    let listener = TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("Failed to bind {}", args.bind))?;
    info!("Listening on {}", args.bind);

    axum::serve(listener, router)
        .await
        .context("Server stopped unexpectedly")?;

    Ok(())
}
