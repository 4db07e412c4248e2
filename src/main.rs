use clap::Parser;
use gridsplits::config::{Args, BatchConfig};
use gridsplits::error::Result;
use gridsplits::extract::CategoryClassifier;
use gridsplits::fetch::FetchTarget;
use gridsplits::processor::{Disposition, PageProcessor};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level: tracing::Level = args
        .log_level
        .parse()
        .unwrap_or(tracing::Level::INFO);
    tracing_subscriber::fmt().with_max_level(level).init();

    let config = BatchConfig::load(&args.config_file)?;
    let targets: Vec<FetchTarget> = config
        .targets
        .into_iter()
        .map(|t| FetchTarget::with_markers(t.url, t.expected_markers))
        .collect();

    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing in-flight requests");
            ctrl_c_cancel.cancel();
        }
    });

    let processor = PageProcessor::new(
        config.anti_detection,
        CategoryClassifier::default(),
        args.workers,
    );
    let reports = processor.run(targets, cancel).await?;

    let extracted = reports
        .iter()
        .filter(|r| r.disposition == Disposition::Extracted)
        .count();
    let blocked = reports
        .iter()
        .filter(|r| r.disposition == Disposition::SoftBlocked)
        .count();
    info!(
        "Finished: {} extracted, {} blocked, {} other, out of {} targets",
        extracted,
        blocked,
        reports.len() - extracted - blocked,
        reports.len()
    );

    let manifest_path = PageProcessor::save_manifest(reports, &args.data_dir)?;
    info!("Results written to {:?}", manifest_path);
    Ok(())
}
