//! End-to-end pipeline: read, parse, chunk, transform, write.

use crate::error::{Result, SubtransError};
use crate::store::TextStore;
use crate::subtitle::chunk::Chunker;
use crate::subtitle::srt::{self, compose, ComposeOptions, Eol};
use crate::subtitle::Cue;
use crate::token::TokenCounter;
use crate::transform::{FormatGuard, GuardOutcome, StageRunner};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, info, warn};

/// Tuning for a pipeline run. All knobs are injected here; the driver
/// holds no global state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Token budget for one serialized chunk.
    pub max_tokens: usize,
    /// Wall-clock bound for all three stages over one chunk.
    pub chunk_timeout: Duration,
    /// Line ending of the composed output file.
    pub eol: Eol,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_tokens: 2500,
            chunk_timeout: Duration::from_secs(300),
            eol: Eol::Lf,
        }
    }
}

/// Which step a run failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Io,
    Parse,
    Chunker,
    Stage,
    Timeout,
    Cancelled,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Io => write!(f, "io"),
            FailureKind::Parse => write!(f, "parse"),
            FailureKind::Chunker => write!(f, "chunker"),
            FailureKind::Stage => write!(f, "stage"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Progress record for one run, emitted in state-machine order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    Started,
    Reading,
    Parsed(usize),
    Splitting,
    SplitDone(usize),
    ChunkProgress(usize, usize),
    ChunkDone(usize, usize),
    Writing,
    Completed,
    Failed { kind: FailureKind, reason: String },
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Path written, or `None` when the input held no cues.
    pub output_path: Option<PathBuf>,
    pub cues_read: usize,
    pub chunks: usize,
    pub cues_written: usize,
    pub total_time: Duration,
}

/// Drives one input/output pair through parse, chunking, the three
/// transformer stages, and composition.
///
/// Chunks are processed strictly in order with no intra-run parallelism,
/// which preserves output order and keeps upstream rate limits easy to
/// honor. Independent drivers may run concurrently.
pub struct PipelineDriver {
    store: Arc<dyn TextStore>,
    chunker: Chunker,
    runner: StageRunner,
    guard: FormatGuard,
    config: PipelineConfig,
}

fn emit(events: &UnboundedSender<PipelineEvent>, event: PipelineEvent) {
    // Consumers may have gone away; progress is best-effort.
    let _ = events.send(event);
}

fn fail(events: &UnboundedSender<PipelineEvent>, kind: FailureKind, reason: impl Into<String>) {
    let reason = reason.into();
    error!(%kind, %reason, "pipeline run failed");
    emit(events, PipelineEvent::Failed { kind, reason });
}

fn check_cancelled(
    cancelled: &AtomicBool,
    events: &UnboundedSender<PipelineEvent>,
) -> Result<()> {
    if cancelled.load(Ordering::Relaxed) {
        fail(events, FailureKind::Cancelled, "cancellation requested");
        return Err(SubtransError::Cancelled);
    }
    Ok(())
}

impl PipelineDriver {
    pub fn new(
        store: Arc<dyn TextStore>,
        counter: Arc<dyn TokenCounter>,
        runner: StageRunner,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            chunker: Chunker::new(counter, config.max_tokens),
            runner,
            guard: FormatGuard::new(),
            config,
        }
    }

    pub async fn run(
        &self,
        input: &Path,
        output: &Path,
        events: UnboundedSender<PipelineEvent>,
    ) -> Result<RunSummary> {
        self.run_with_cancel(input, output, events, Arc::new(AtomicBool::new(false)))
            .await
    }

    /// Run with cooperative cancellation. The flag is observed before
    /// every suspension point; a cancelled run writes no partial output.
    pub async fn run_with_cancel(
        &self,
        input: &Path,
        output: &Path,
        events: UnboundedSender<PipelineEvent>,
        cancelled: Arc<AtomicBool>,
    ) -> Result<RunSummary> {
        let start_time = Instant::now();
        emit(&events, PipelineEvent::Started);
        check_cancelled(&cancelled, &events)?;

        // ═════════════════════════════════════════════════════════════
        // Read and parse
        // ═════════════════════════════════════════════════════════════
        info!("Reading subtitle file {:?}", input);
        emit(&events, PipelineEvent::Reading);

        let content = match self.store.read(input).await {
            Ok(content) => content,
            Err(e) => {
                fail(&events, FailureKind::Io, e.to_string());
                return Err(e);
            }
        };
        check_cancelled(&cancelled, &events)?;

        let cues = match srt::parse(&content, false) {
            Ok(cues) => cues,
            Err(e) => {
                fail(&events, FailureKind::Parse, e.to_string());
                return Err(e.into());
            }
        };
        if cues.is_empty() {
            info!("No cues in {:?}, nothing to do", input);
            emit(&events, PipelineEvent::Parsed(0));
            emit(&events, PipelineEvent::Completed);
            return Ok(RunSummary {
                output_path: None,
                cues_read: 0,
                chunks: 0,
                cues_written: 0,
                total_time: start_time.elapsed(),
            });
        }
        let cues_read = cues.len();
        emit(&events, PipelineEvent::Parsed(cues_read));
        info!("Parsed {} cues", cues_read);

        // ═════════════════════════════════════════════════════════════
        // Split into token-bounded chunks
        // ═════════════════════════════════════════════════════════════
        emit(&events, PipelineEvent::Splitting);
        let chunks = self.chunker.split(cues);
        if chunks.is_empty() {
            fail(
                &events,
                FailureKind::Chunker,
                format!("no chunks from {cues_read} cues"),
            );
            return Err(SubtransError::EmptyChunking(cues_read));
        }
        let total = chunks.len();
        emit(&events, PipelineEvent::SplitDone(total));
        info!("Split {} cues into {} chunks", cues_read, total);

        // ═════════════════════════════════════════════════════════════
        // Transform chunk by chunk
        // ═════════════════════════════════════════════════════════════
        let mut accumulator: Vec<Cue> = Vec::new();
        for (i, chunk) in chunks.into_iter().enumerate() {
            let number = i + 1;
            check_cancelled(&cancelled, &events)?;
            emit(&events, PipelineEvent::ChunkProgress(number, total));

            let chunk_srt = compose(&chunk, &ComposeOptions::default());
            let processed = match tokio::time::timeout(
                self.config.chunk_timeout,
                self.runner.run(chunk_srt),
            )
            .await
            {
                Err(_) => {
                    fail(
                        &events,
                        FailureKind::Timeout,
                        format!(
                            "chunk {number}/{total} exceeded {:?}",
                            self.config.chunk_timeout
                        ),
                    );
                    return Err(SubtransError::ChunkTimeout { chunk: number });
                }
                Ok(Err(e)) => {
                    fail(&events, FailureKind::Stage, e.to_string());
                    return Err(e);
                }
                Ok(Ok(processed)) => processed,
            };
            check_cancelled(&cancelled, &events)?;

            match self.guard.check(&processed) {
                GuardOutcome::Valid(cues) => accumulator.extend(cues),
                GuardOutcome::Recovered(cues, via) => {
                    warn!(chunk = number, %via, "chunk result needed format recovery");
                    accumulator.extend(cues);
                }
                GuardOutcome::Invalid(reason) => {
                    fail(
                        &events,
                        FailureKind::Stage,
                        format!("chunk {number}/{total}: {reason}"),
                    );
                    return Err(SubtransError::UnrecoverableOutput {
                        chunk: number,
                        reason,
                    });
                }
            }
            emit(&events, PipelineEvent::ChunkDone(number, total));
        }
        check_cancelled(&cancelled, &events)?;

        // ═════════════════════════════════════════════════════════════
        // Compose and write
        // ═════════════════════════════════════════════════════════════
        emit(&events, PipelineEvent::Writing);
        let composed = compose(
            &accumulator,
            &ComposeOptions {
                eol: self.config.eol,
                ..Default::default()
            },
        );
        let output_path = match self.store.write(&composed, output).await {
            Ok(path) => path,
            Err(e) => {
                fail(&events, FailureKind::Io, e.to_string());
                return Err(e);
            }
        };

        emit(&events, PipelineEvent::Completed);
        info!("Wrote {} cues to {:?}", accumulator.len(), output_path);

        Ok(RunSummary {
            output_path: Some(output_path),
            cues_read,
            chunks: total,
            cues_written: accumulator.len(),
            total_time: start_time.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.max_tokens, 2500);
        assert_eq!(config.chunk_timeout, Duration::from_secs(300));
        assert_eq!(config.eol, Eol::Lf);
    }

    #[test]
    fn test_failure_kind_display() {
        assert_eq!(FailureKind::Timeout.to_string(), "timeout");
        assert_eq!(FailureKind::Cancelled.to_string(), "cancelled");
    }
}
