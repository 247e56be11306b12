use anyhow::Context;
use casper_probe_config::Config;
use casper_probe_core::logging::{LogConfig, iso_timestamp};
use casper_probe_core::{CasperRpcClient, fetch_and_record};
use chrono::Utc;
use log::{Log, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let started_at = Utc::now();

    let cfg = Config::load().context("Failed to load configuration")?;
    let log_dir = cfg.log_dir_resolved();

    LogConfig::for_run(started_at, &log_dir)
        .build()
        .context("Failed to configure logging")?
        .install()?;

    info!(
        "🚀 Probing {} (run {}, block info -> {:?})",
        cfg.node_rpc_url,
        iso_timestamp(started_at),
        LogConfig::log_file_path(started_at, &log_dir)
    );

    let rpc = CasperRpcClient::new(&cfg.node_rpc_url);
    let result = fetch_and_record(&rpc, log::logger()).await;
    log::logger().flush();

    result.with_context(|| format!("Failed to fetch node info from {}", rpc.node_url()))
}
