use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use ultra_bridge::config::AppConfig;
use ultra_bridge::protocols::cctp::CctpEngine;
use ultra_bridge::protocols::relay::RelayEngine;
use ultra_bridge::protocols::{BridgeProtocol, ProtocolId};
use ultra_bridge::router::{create_api_router, BridgeRouter, Validator};
use ultra_bridge::transport::attestation::AttestationClient;
use ultra_bridge::transport::jsonrpc::EvmRpc;
use ultra_bridge::transport::relay::RelayApi;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing().context("initialize tracing subscriber")?;

    if let Err(err) = run().await {
        tracing::error!(error = ?err, "fatal bridge error");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<()> {
    let config = AppConfig::load().context("load configuration from environment")?;
    let sender = config.sender().context("parse sender address")?;

    let endpoints = config.rpc_endpoint_map()?;
    let source_url = endpoints
        .get(&config.source_chain)
        .ok_or_else(|| anyhow!("no rpc endpoint configured for source chain {}", config.source_chain))?;
    let source_rpc = Arc::new(EvmRpc::new(source_url.clone(), sender));

    let native_price = config.native_price_usd.unwrap_or(0.0);
    if native_price == 0.0 {
        warn!("native price not configured; gas fees will be quoted as zero USD");
    }

    let attestation = AttestationClient::new(
        config.attestation_base.clone(),
        config.attestation_fast_base.clone(),
    );
    let relay_api = RelayApi::new(config.relay_api_base.clone());

    let cctp = Arc::new(CctpEngine::new(
        config.source_chain,
        sender,
        source_rpc.clone(),
        attestation,
        native_price,
    ));
    let relay = Arc::new(RelayEngine::new(
        config.source_chain,
        sender,
        source_rpc.clone(),
        relay_api,
        native_price,
    ));
    let adapters: Vec<Arc<dyn BridgeProtocol>> = vec![cctp, relay];

    let validator = Validator::new(config.allowed_destination_list()?);
    let router = Arc::new(
        BridgeRouter::new(config.source_chain, adapters)
            .with_validator(validator)
            .with_preferences(config.priority(), Default::default())
            .with_max_inflight(config.max_inflight.unwrap_or(32)),
    );

    info!(
        source_chain = config.source_chain,
        sender = %format!("{sender:#x}"),
        endpoints = endpoints.len(),
        priority = ?config.priority(),
        "ultra-bridge online"
    );

    // Start HTTP API server
    let api_addr: std::net::SocketAddr = config
        .api_listen
        .as_deref()
        .unwrap_or("0.0.0.0:8080")
        .parse()
        .context("parse API listen address")?;
    let api_router = create_api_router(router.clone());
    info!(address = %api_addr, "HTTP API server starting");
    let _api_handle = tokio::spawn(async move {
        let listener = match tokio::net::TcpListener::bind(&api_addr).await {
            Ok(listener) => listener,
            Err(err) => {
                warn!(error = %err, "failed to bind API server address");
                return;
            }
        };
        if let Err(err) = axum::serve(listener, api_router).await {
            warn!(error = %err, "API server error");
        }
    });

    let mut ticker = tokio::time::interval(Duration::from_secs(30));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let tracked = router.store().len().await;
                let cctp_obs = router.reliability().observation_count(ProtocolId::Cctp).await;
                let relay_obs = router.reliability().observation_count(ProtocolId::Relay).await;
                info!(
                    tracked_transfers = tracked,
                    cctp_observations = cctp_obs,
                    relay_observations = relay_obs,
                    "bridge heartbeat"
                );
            }
            res = tokio::signal::ctrl_c() => {
                if let Err(err) = res {
                    warn!(error = %err, "ctrl_c listener error");
                }
                info!("Shutdown signal received, exiting");
                break;
            }
        }
    }
    Ok(())
}

fn init_tracing() -> Result<()> {
    let env_filter =
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info,hyper=warn".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(env_filter))
        .with_target(false)
        .try_init()
        .map_err(|err| anyhow!("tracing subscriber init: {err}"))
}
