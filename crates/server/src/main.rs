//! Process entry point (C1/C2), grounded on the teacher's `main.rs`: CLI
//! parsing, logging setup, and spawning the long-running tasks onto the
//! `tokio` runtime. The teacher's TUI/event-bus/packet-loss-simulation
//! surface is gone (see DESIGN.md); the listener/matchmaker/match-runtime/
//! heartbeat/metrics task wiring itself lives in `lib.rs` so integration
//! tests can reuse it against an ephemeral port.

use std::io::Write as _;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use t2d_server::Config;

#[derive(Parser)]
#[command(name = "t2d-server")]
struct Args {
    /// Path to a TOML configuration file. Missing fields fall back to
    /// built-in defaults.
    config_path: Option<PathBuf>,

    /// Force bot fire off regardless of configuration.
    #[arg(long)]
    no_bot_fire: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging();

    let mut config = match &args.config_path {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => Config::default(),
    };

    if args.no_bot_fire || std::env::var("T2D_NO_BOT_FIRE").is_ok() {
        config.disable_bot_fire = true;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;
    runtime.block_on(run(config))
}

async fn run(config: Config) -> Result<()> {
    let tick_rate = config.tick_rate;
    let max_players_per_match = config.max_players_per_match;

    let server = t2d_server::spawn(config)
        .await
        .context("starting server tasks")?;

    tokio::spawn(server.shutdown.clone().listen_for_signals());

    log::info!(
        "t2d-server listening on {} (tick_rate={}, max_players_per_match={})",
        server.addr,
        tick_rate,
        max_players_per_match
    );

    server.join().await;
    Ok(())
}

fn init_logging() {
    let level = std::env::var("T2D_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let json = std::env::var("T2D_LOG_JSON").is_ok();
    let app_id = std::env::var("T2D_LOG_APP_ID").ok();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level));

    builder.format(move |buf, record| {
        let prefix = app_id.as_deref().map(|id| format!("[{id}] ")).unwrap_or_default();
        if json {
            writeln!(
                buf,
                "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"target\":\"{}\",\"message\":\"{}{}\"}}",
                wall_clock_timestamp(),
                record.level(),
                record.target(),
                prefix,
                record.args()
            )
        } else {
            writeln!(
                buf,
                "[{} {} {}] {}{}",
                wall_clock_timestamp(),
                record.level(),
                record.target(),
                prefix,
                record.args()
            )
        }
    });

    builder.init();
}

fn wall_clock_timestamp() -> String {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}.{:03}", now.as_secs(), now.subsec_millis())
}
