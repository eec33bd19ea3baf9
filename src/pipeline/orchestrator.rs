use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

use crate::config::Config;
use crate::error::{MergeError, Result};
use crate::infra::http_client::ReqwestHttp;
use crate::metrics::names;
use crate::pipeline::processing::enrich::{enrich_line, CachingResolver, RemoteSkinResolver, SkinResolver};
use crate::pipeline::processing::merge::{self, user_of, MergeOutcome};
use crate::pipeline::processing::normalize::{Normalizer, TableNormalizer};

/// Lets a host ask a running pipeline to stop taking new records.
/// Records already being processed run to completion.
///
/// A stop is permanent for the [`Pipeline`] it came from: later runs on that pipeline
/// process nothing and report `stopped_early`. Build a new pipeline to start over.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// A primary record that produced no output because it could not be merged
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RecordFailure {
    /// 1-based position among the non-blank primary lines
    pub line_number: usize,
    pub user: String,
    pub reason: String,
}

/// Result of a complete pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    #[serde(skip)]
    pub lines: Vec<String>,
    pub total_records: usize,
    pub merged: usize,
    pub fallback: usize,
    pub skipped: usize,
    pub failures: Vec<RecordFailure>,
    pub codes_resolved: usize,
    pub codes_unresolved: usize,
    pub stopped_early: bool,
    pub concurrency: usize,
    pub started_at: DateTime<Utc>,
    pub duration_secs: f64,
}

impl PipelineReport {
    pub fn processed(&self) -> usize {
        self.merged + self.fallback + self.skipped + self.failures.len()
    }
}

#[derive(Debug)]
struct WorkItem {
    line_number: usize,
    line: String,
}

#[derive(Debug)]
enum Processed {
    Merged(String),
    Fallback(String),
    Skipped,
}

#[derive(Debug)]
struct ItemOutcome {
    line_number: usize,
    user: String,
    result: Result<Processed>,
    codes_resolved: usize,
    codes_unresolved: usize,
}

/// Drops whitespace-only lines
pub fn non_blank(lines: &[String]) -> Vec<String> {
    lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .cloned()
        .collect()
}

/// Runs merge -> skin code resolution -> normalization over every primary line
/// using a fixed number of workers.
pub struct Pipeline {
    resolver: Arc<dyn SkinResolver>,
    normalizer: Arc<dyn Normalizer>,
    stop: StopHandle,
}

impl Pipeline {
    pub fn new(resolver: Arc<dyn SkinResolver>) -> Self {
        Self {
            resolver,
            normalizer: Arc::new(TableNormalizer::new()),
            stop: StopHandle::default(),
        }
    }

    /// Pipeline wired to the remote skin document with a per-run cache
    pub fn from_config(config: &Config) -> Result<Self> {
        let http = ReqwestHttp::new(config.resolver.timeout())?;
        let remote = RemoteSkinResolver::new(Arc::new(http), config.resolver.url.clone());
        Ok(Self::new(Arc::new(CachingResolver::new(remote))))
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Process one primary line start to finish
    async fn process_line(
        line: &str,
        secondary: &[String],
        resolver: &dyn SkinResolver,
        normalizer: &dyn Normalizer,
    ) -> (Result<Processed>, usize, usize) {
        let outcome = match merge::merge(line, secondary) {
            Ok(outcome) => outcome,
            Err(e) => return (Err(e), 0, 0),
        };

        let (merged_line, was_merged) = match outcome {
            MergeOutcome::Merged(l) => (l, true),
            MergeOutcome::Fallback(l) => (l, false),
            MergeOutcome::Skip => return (Ok(Processed::Skipped), 0, 0),
        };

        let enriched = enrich_line(&merged_line, resolver).await;
        let finished = normalizer.normalize(&enriched.line);
        let processed = if was_merged {
            Processed::Merged(finished)
        } else {
            Processed::Fallback(finished)
        };
        (Ok(processed), enriched.resolved, enriched.unresolved)
    }

    /// Run the pipeline over both inputs.
    ///
    /// Blank lines are dropped from both inputs first. Output order is whatever order the
    /// workers finish in. Fails only for an invalid worker count or a crashed worker;
    /// malformed records are reported in [`PipelineReport::failures`].
    #[instrument(skip_all, fields(concurrency = concurrency))]
    pub async fn run(
        &self,
        primary_lines: &[String],
        secondary_lines: &[String],
        concurrency: usize,
    ) -> Result<PipelineReport> {
        if concurrency < 1 {
            return Err(MergeError::InvalidConcurrency(concurrency));
        }

        let started_at = Utc::now();
        let t_run = Instant::now();

        let primary = non_blank(primary_lines);
        let secondary: Arc<[String]> = non_blank(secondary_lines).into();
        let total_records = primary.len();
        // Never start more workers than there are records to hand out
        let worker_count = concurrency.min(total_records);
        info!(
            "🚀 Processing {} primary records against {} secondary records with {} workers",
            total_records,
            secondary.len(),
            worker_count
        );

        // Everything is queued up front; workers drain the queue until it is empty or stopped
        let (tx, rx) = mpsc::unbounded_channel();
        for (i, line) in primary.into_iter().enumerate() {
            let _ = tx.send(WorkItem { line_number: i + 1, line });
        }
        drop(tx);
        let queue = Arc::new(Mutex::new(rx));

        let mut workers = JoinSet::new();
        for worker_id in 0..worker_count {
            let queue = Arc::clone(&queue);
            let secondary = Arc::clone(&secondary);
            let resolver = Arc::clone(&self.resolver);
            let normalizer = Arc::clone(&self.normalizer);
            let stop = self.stop.clone();

            workers.spawn(async move {
                let mut outcomes = Vec::new();
                loop {
                    if stop.is_stopped() {
                        debug!("Worker {} stopping on request", worker_id);
                        break;
                    }
                    let next = queue.lock().await.recv().await;
                    let Some(item) = next else { break };

                    let (result, codes_resolved, codes_unresolved) = Self::process_line(
                        &item.line,
                        &secondary,
                        resolver.as_ref(),
                        normalizer.as_ref(),
                    )
                    .await;
                    outcomes.push(ItemOutcome {
                        line_number: item.line_number,
                        user: user_of(&item.line).to_string(),
                        result,
                        codes_resolved,
                        codes_unresolved,
                    });
                }
                outcomes
            });
        }

        let mut outcomes = Vec::with_capacity(total_records);
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(batch) => outcomes.extend(batch),
                Err(e) => {
                    error!("Worker crashed: {}", e);
                    workers.abort_all();
                    return Err(MergeError::Worker(e.to_string()));
                }
            }
        }

        let mut report = PipelineReport {
            lines: Vec::with_capacity(outcomes.len()),
            total_records,
            merged: 0,
            fallback: 0,
            skipped: 0,
            failures: Vec::new(),
            codes_resolved: 0,
            codes_unresolved: 0,
            stopped_early: false,
            concurrency,
            started_at,
            duration_secs: 0.0,
        };

        for outcome in outcomes {
            report.codes_resolved += outcome.codes_resolved;
            report.codes_unresolved += outcome.codes_unresolved;
            match outcome.result {
                Ok(Processed::Merged(line)) => {
                    report.merged += 1;
                    report.lines.push(line);
                    counter!(names::RECORDS_TOTAL, "outcome" => "merged").increment(1);
                }
                Ok(Processed::Fallback(line)) => {
                    report.fallback += 1;
                    report.lines.push(line);
                    counter!(names::RECORDS_TOTAL, "outcome" => "fallback").increment(1);
                }
                Ok(Processed::Skipped) => {
                    report.skipped += 1;
                    counter!(names::RECORDS_TOTAL, "outcome" => "skipped").increment(1);
                }
                Err(e) => {
                    warn!("Record {} dropped: {}", outcome.line_number, e);
                    counter!(names::RECORDS_TOTAL, "outcome" => "failed").increment(1);
                    let reason = match e {
                        MergeError::MalformedRecord { reason, .. } => reason,
                        other => other.to_string(),
                    };
                    report.failures.push(RecordFailure {
                        line_number: outcome.line_number,
                        user: outcome.user,
                        reason,
                    });
                }
            }
        }
        report.failures.sort_by_key(|f| f.line_number);

        counter!(names::CODES_TOTAL, "result" => "resolved").increment(report.codes_resolved as u64);
        counter!(names::CODES_TOTAL, "result" => "unresolved").increment(report.codes_unresolved as u64);

        report.stopped_early = report.processed() < total_records;
        report.duration_secs = t_run.elapsed().as_secs_f64();
        histogram!(names::RUN_DURATION_SECONDS).record(report.duration_secs);

        if report.stopped_early {
            warn!(
                "⏹️ Run stopped early: {}/{} records processed",
                report.processed(),
                total_records
            );
        }
        info!(
            "✅ Run finished: {} merged, {} fallback, {} skipped, {} failed, {} codes resolved, {} unresolved in {:.2}s",
            report.merged,
            report.fallback,
            report.skipped,
            report.failures.len(),
            report.codes_resolved,
            report.codes_unresolved,
            report.duration_secs
        );

        Ok(report)
    }
}
