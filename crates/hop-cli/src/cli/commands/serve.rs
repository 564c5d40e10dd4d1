//! `hop serve` – HTTP front end.

use anyhow::{Context, Result};
use hop_core::config::HopConfig;
use hop_core::fetch::CurlFetcher;
use hop_core::proxy::Proxy;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::cli::frontend::{self, Frontend};

pub async fn run_serve(cfg: &HopConfig, listen: Option<&str>) -> Result<()> {
    let listen = listen.unwrap_or(&cfg.listen).to_string();
    let proxy = Proxy::new(cfg, CurlFetcher::new())?;
    let app = frontend::router(Arc::new(Frontend::new(proxy, listen.clone())));

    let listener = TcpListener::bind(&listen)
        .await
        .with_context(|| format!("bind {}", listen))?;
    tracing::info!(listen = %listen, "hop listening");
    println!("hop listening on http://{}/", listen);

    axum::serve(listener, app).await.context("serve")?;
    Ok(())
}
