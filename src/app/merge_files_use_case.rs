use tracing::{info, warn};

use crate::app::ports::{LineSinkPort, LineSourcePort};
use crate::error::{MergeError, Result};
use crate::pipeline::{Pipeline, PipelineReport};

/// Outcome of a completed merge job
#[derive(Debug)]
pub struct MergeFilesSummary {
    pub report: PipelineReport,
    pub output_location: String,
}

/// Use case for merging a primary and a secondary file into one output
pub struct MergeFilesUseCase {
    source: Box<dyn LineSourcePort>,
    sink: Box<dyn LineSinkPort>,
    pipeline: Pipeline,
}

impl MergeFilesUseCase {
    pub fn new(
        source: Box<dyn LineSourcePort>,
        sink: Box<dyn LineSinkPort>,
        pipeline: Pipeline,
    ) -> Self {
        Self {
            source,
            sink,
            pipeline,
        }
    }

    /// Read both inputs, run the pipeline, then hand the buffered result to the sink.
    /// Nothing is written unless the pipeline finished.
    pub async fn execute(
        &self,
        primary_location: &str,
        secondary_location: &str,
        concurrency: usize,
    ) -> Result<MergeFilesSummary> {
        if concurrency < 1 {
            return Err(MergeError::InvalidConcurrency(concurrency));
        }

        let primary = self
            .source
            .read_lines(primary_location)
            .await
            .map_err(MergeError::Source)?;
        let secondary = self
            .source
            .read_lines(secondary_location)
            .await
            .map_err(MergeError::Source)?;
        info!(
            "📥 Loaded {} primary and {} secondary lines",
            primary.len(),
            secondary.len()
        );

        let report = self.pipeline.run(&primary, &secondary, concurrency).await?;
        if !report.failures.is_empty() {
            warn!("{} records dropped as malformed", report.failures.len());
        }

        let output_location = self
            .sink
            .write_lines(&report.lines)
            .await
            .map_err(MergeError::Sink)?;
        info!("💾 Output saved to {}", output_location);

        Ok(MergeFilesSummary {
            report,
            output_location,
        })
    }
}
