use crate::config::AntiDetectionConfig;
use crate::error::{Result, ScrapeError};
use crate::extract::{CategoryClassifier, ExtractionResult, SplitsExtractor};
use crate::fetch::{FailureKind, FetchClient, FetchOutcome, FetchTarget};
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Disposition {
    Extracted,
    SoftBlocked,
    Failed,
    Cancelled,
}

/// Per-target outcome handed back to the orchestrator, which decides
/// whether to persist, requeue with a cool-down, or drop.
#[derive(Debug, Serialize)]
pub struct TargetReport {
    pub url: String,
    pub disposition: Disposition,
    pub detail: Option<String>,
    pub result: Option<ExtractionResult>,
}

#[derive(Debug, Serialize)]
struct Manifest {
    generated_at: String,
    reports: Vec<TargetReport>,
}

/// Small bounded worker pool over independent fetch targets. Each worker
/// owns one FetchClient outright (and with it one Session and one
/// RateLimiter); nothing but the static identity pool is shared, so the
/// workers need no coordination.
pub struct PageProcessor {
    config: AntiDetectionConfig,
    classifier: CategoryClassifier,
    workers: usize,
}

impl PageProcessor {
    pub fn new(config: AntiDetectionConfig, classifier: CategoryClassifier, workers: usize) -> Self {
        Self {
            config,
            classifier,
            // More than a couple of workers draws attention from the
            // target's rate limiting; keep the pool small.
            workers: workers.clamp(1, 4),
        }
    }

    pub async fn run(
        &self,
        targets: Vec<FetchTarget>,
        cancel: CancellationToken,
    ) -> Result<Vec<TargetReport>> {
        let total = targets.len();
        info!("Processing {} targets with {} workers", total, self.workers);

        let progress = ProgressBar::new(total as u64);
        progress.set_style(
            ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );

        let mut handles = Vec::new();
        for (worker_id, chunk) in partition(targets, self.workers).into_iter().enumerate() {
            let config = self.config.clone();
            let classifier = self.classifier.clone();
            let cancel = cancel.clone();
            let progress = progress.clone();

            handles.push(tokio::spawn(async move {
                let mut client = FetchClient::new(config)?;
                let extractor = SplitsExtractor::new(classifier);
                let mut reports = Vec::with_capacity(chunk.len());

                for target in chunk {
                    if cancel.is_cancelled() {
                        reports.push(TargetReport {
                            url: target.url,
                            disposition: Disposition::Cancelled,
                            detail: None,
                            result: None,
                        });
                        progress.inc(1);
                        continue;
                    }

                    let outcome = client.fetch(&target, &cancel).await;
                    reports.push(report_for(target, outcome, &extractor));
                    progress.inc(1);
                }

                let metrics = client.metrics();
                info!(
                    "Worker {} done: {} requests, {} ok, {} failed, {} rate-limited, {} rotations",
                    worker_id,
                    metrics.total_requests,
                    metrics.successful_requests,
                    metrics.failed_requests,
                    metrics.rate_limit_violations,
                    metrics.sessions_rotated
                );
                Ok::<Vec<TargetReport>, ScrapeError>(reports)
            }));
        }

        let mut all_reports = Vec::with_capacity(total);
        for handle in handles {
            let reports = handle
                .await
                .map_err(|e| ScrapeError::Other(format!("worker panicked: {e}")))??;
            all_reports.extend(reports);
        }
        progress.finish_and_clear();

        Ok(all_reports)
    }

    /// Write all reports as one timestamped JSON manifest and return its
    /// path.
    pub fn save_manifest(reports: Vec<TargetReport>, data_dir: &Path) -> Result<PathBuf> {
        if !data_dir.exists() {
            std::fs::create_dir_all(data_dir)?;
        }

        let manifest = Manifest {
            generated_at: Utc::now().to_rfc3339(),
            reports,
        };
        let path = data_dir.join(format!("extraction_{}.json", Utc::now().timestamp()));
        std::fs::write(&path, serde_json::to_string_pretty(&manifest)?)?;
        info!("Wrote manifest to {:?}", path);
        Ok(path)
    }
}

fn report_for(
    target: FetchTarget,
    outcome: FetchOutcome,
    extractor: &SplitsExtractor,
) -> TargetReport {
    match outcome {
        FetchOutcome::Success { body, .. } => {
            let result = extractor.extract(&body);
            TargetReport {
                url: target.url,
                disposition: Disposition::Extracted,
                detail: None,
                result: Some(result),
            }
        }
        FetchOutcome::SoftBlocked(reason) => TargetReport {
            url: target.url,
            disposition: Disposition::SoftBlocked,
            detail: Some(format!("{reason:?}")),
            result: None,
        },
        FetchOutcome::HardFailure(FailureKind::Cancelled) => TargetReport {
            url: target.url,
            disposition: Disposition::Cancelled,
            detail: None,
            result: None,
        },
        FetchOutcome::HardFailure(kind) => TargetReport {
            url: target.url,
            disposition: Disposition::Failed,
            detail: Some(format!("{kind:?}")),
            result: None,
        },
    }
}

/// Round-robin split that keeps every worker busy even when target counts
/// are uneven. No ordering is guaranteed across workers.
fn partition<T>(items: Vec<T>, workers: usize) -> Vec<Vec<T>> {
    let mut chunks: Vec<Vec<T>> = (0..workers).map(|_| Vec::new()).collect();
    for (index, item) in items.into_iter().enumerate() {
        chunks[index % workers].push(item);
    }
    chunks.retain(|c| !c.is_empty());
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_round_robins_and_drops_empty_chunks() {
        let chunks = partition(vec![1, 2, 3, 4, 5], 2);
        assert_eq!(chunks, vec![vec![1, 3, 5], vec![2, 4]]);

        let chunks = partition(vec![1], 4);
        assert_eq!(chunks, vec![vec![1]]);
    }

    #[test]
    fn soft_block_and_failure_reports_carry_detail() {
        let extractor = SplitsExtractor::default();
        let report = report_for(
            FetchTarget::new("https://example.test/a"),
            FetchOutcome::SoftBlocked(crate::fetch::BlockReason::RateLimited),
            &extractor,
        );
        assert_eq!(report.disposition, Disposition::SoftBlocked);
        assert!(report.detail.as_deref().unwrap().contains("RateLimited"));
        assert!(report.result.is_none());

        let report = report_for(
            FetchTarget::new("https://example.test/b"),
            FetchOutcome::HardFailure(FailureKind::Status(500)),
            &extractor,
        );
        assert_eq!(report.disposition, Disposition::Failed);
    }

    #[test]
    fn manifest_is_written_as_parseable_json() {
        let dir = tempfile::tempdir().unwrap();
        let reports = vec![TargetReport {
            url: "https://example.test/a".to_string(),
            disposition: Disposition::Extracted,
            detail: None,
            result: Some(ExtractionResult::default()),
        }];
        let path = PageProcessor::save_manifest(reports, dir.path()).unwrap();
        let raw = std::fs::read_to_string(path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed["reports"][0]["disposition"], "Extracted");
    }

    #[tokio::test]
    async fn cancelled_run_reports_every_target() {
        let processor = PageProcessor::new(
            AntiDetectionConfig::default(),
            CategoryClassifier::default(),
            2,
        );
        let cancel = CancellationToken::new();
        cancel.cancel();
        let targets = vec![
            FetchTarget::new("https://example.test/a"),
            FetchTarget::new("https://example.test/b"),
            FetchTarget::new("https://example.test/c"),
        ];
        let reports = processor.run(targets, cancel).await.unwrap();
        assert_eq!(reports.len(), 3);
        assert!(reports
            .iter()
            .all(|r| r.disposition == Disposition::Cancelled));
    }
}
