use anyhow::{Context, Result};
use clap::Parser;
use pagereport::{
    config::Config,
    refresh::spawn_refresh,
    telemetry, web, ReportAssembler, TableCache,
};
use std::{path::PathBuf, sync::Arc, time::Duration};
use tracing::{info, warn};

#[derive(Parser)]
#[command(author, version, about = "Serve page and post analytics over HTTP")]
struct Args {
    /// YAML config file
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(long)]
    page_id: Option<String>,
    /// Reload sources and republish every N seconds (0 disables)
    #[arg(long)]
    refresh_secs: Option<u64>,
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(page_id) = args.page_id {
        config.page_id = page_id;
    }
    if let Some(secs) = args.refresh_secs {
        config.refresh_interval_secs = Some(secs);
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    telemetry::init_tracing(&config.log_level);
    info!("Starting analytics service");

    let assembler = Arc::new(
        ReportAssembler::new(
            Arc::new(TableCache::new()),
            config.adapter(),
            config.page_location(),
            config.posts_location(),
        )
        .with_writer(Arc::new(config.writer())),
    );

    // generate once before serving; stale artifacts are still served on failure
    let initial = {
        let assembler = Arc::clone(&assembler);
        let page_id = config.page_id.clone();
        tokio::task::spawn_blocking(move || assembler.publish_all(&page_id))
            .await
            .context("initial generation task")?
    };
    match initial {
        Ok(paths) => info!(artifacts = paths.len(), "initial generation complete"),
        Err(e) => warn!(error = %e, "initial generation failed; serving existing artifacts"),
    }

    let refresh = config.refresh_interval().map(|every: Duration| {
        spawn_refresh(Arc::clone(&assembler), every, Some(config.page_id.clone()))
    });

    let api = web::routes(config.index());
    let (addr, server) = warp::serve(api)
        .try_bind_with_graceful_shutdown(([0, 0, 0, 0], config.port), async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
        })
        .with_context(|| format!("binding port {}", config.port))?;

    info!("Server starting on {}", addr);
    info!("Graphs: http://localhost:{}/graphs", addr.port());
    server.await;

    if let Some(handle) = refresh {
        handle.stop().await;
    }
    info!("Server stopped");
    Ok(())
}
