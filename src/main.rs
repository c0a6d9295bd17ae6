use anyhow::{Context, Result};
use clap::Parser;
use pagereport::{
    config::Config,
    telemetry,
    ReportAssembler, TableCache,
};
use std::{path::PathBuf, sync::Arc, time::Instant};
use tracing::info;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Render a page's engagement and post analytics to HTML"
)]
struct Args {
    /// YAML config file
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Page identifier used in artifact names
    #[arg(long)]
    page_id: Option<String>,
    /// Directory the artifacts are written to
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(page_id) = args.page_id {
        config.page_id = page_id;
    }
    if let Some(output) = args.output {
        config.output_dir = output;
    }

    telemetry::init_tracing(&config.log_level);
    info!(page_id = %config.page_id, "startup");
    let start = Instant::now();

    let assembler = ReportAssembler::new(
        Arc::new(TableCache::new()),
        config.adapter(),
        config.page_location(),
        config.posts_location(),
    )
    .with_writer(Arc::new(config.writer()));

    info!("Generating page analytics ...");
    let page = assembler
        .publish_page_report(&config.page_id)
        .context("generating page analytics")?;
    info!("Page analytics in {}", page.display());

    info!("Generating post analytics ...");
    let posts = assembler
        .publish_posts_report(&config.page_id)
        .context("generating post analytics")?;
    info!("Post analytics in {}", posts.display());

    info!("Took {:.2} seconds", start.elapsed().as_secs_f64());
    Ok(())
}
