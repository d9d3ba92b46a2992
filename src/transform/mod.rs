pub mod guard;

pub use guard::{FormatGuard, GuardOutcome, Recovery};

use crate::error::{Result, SubtransError};
use crate::subtitle::srt::{compose, ComposeOptions};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// One text-transformation stage.
///
/// The input is valid SRT; the output should be valid SRT with the same
/// cue count, timestamps and indices, changing content only. Violations
/// are tolerated by the [`FormatGuard`]; only transport failures should
/// surface as errors.
#[async_trait]
pub trait TextTransformer: Send + Sync {
    async fn transform(&self, input: &str) -> Result<String>;

    /// Implementation name for diagnostics.
    fn name(&self) -> &'static str;
}

/// The fixed stage order of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Segmenter,
    Proofreader,
    Translator,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Segmenter, Stage::Proofreader, Stage::Translator];
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Segmenter => write!(f, "segmenter"),
            Stage::Proofreader => write!(f, "proofreader"),
            Stage::Translator => write!(f, "translator"),
        }
    }
}

/// Drives the three transformer stages over one serialized chunk.
///
/// Each stage's raw output goes through the format guard. Valid output
/// is passed along untouched, recovered output is re-composed from the
/// salvaged cues, and invalid output is replaced by the previous stage's
/// text so later stages always receive parsable SRT.
pub struct StageRunner {
    segmenter: Arc<dyn TextTransformer>,
    proofreader: Arc<dyn TextTransformer>,
    translator: Arc<dyn TextTransformer>,
    guard: FormatGuard,
}

impl StageRunner {
    pub fn new(
        segmenter: Box<dyn TextTransformer>,
        proofreader: Box<dyn TextTransformer>,
        translator: Box<dyn TextTransformer>,
    ) -> Self {
        Self {
            segmenter: Arc::from(segmenter),
            proofreader: Arc::from(proofreader),
            translator: Arc::from(translator),
            guard: FormatGuard::new(),
        }
    }

    fn transformer(&self, stage: Stage) -> &dyn TextTransformer {
        match stage {
            Stage::Segmenter => self.segmenter.as_ref(),
            Stage::Proofreader => self.proofreader.as_ref(),
            Stage::Translator => self.translator.as_ref(),
        }
    }

    pub async fn run(&self, chunk_srt: String) -> Result<String> {
        let mut current = chunk_srt;

        for stage in Stage::ALL {
            let transformer = self.transformer(stage);
            debug!(%stage, name = transformer.name(), "running stage");

            let raw = transformer.transform(&current).await.map_err(|e| {
                SubtransError::Transformer {
                    stage,
                    reason: e.to_string(),
                }
            })?;

            current = match self.guard.check(&raw) {
                GuardOutcome::Valid(_) => raw,
                GuardOutcome::Recovered(cues, via) => {
                    warn!(%stage, %via, "stage output needed format recovery");
                    compose(
                        &cues,
                        &ComposeOptions {
                            reindex: false,
                            ..Default::default()
                        },
                    )
                }
                GuardOutcome::Invalid(reason) => {
                    warn!(%stage, %reason, "stage output invalid, keeping previous text");
                    current
                }
            };
        }

        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHUNK: &str = "1\n00:00:01,000 --> 00:00:02,000\nHello\n";

    struct Echo;

    #[async_trait]
    impl TextTransformer for Echo {
        async fn transform(&self, input: &str) -> Result<String> {
            Ok(input.to_string())
        }

        fn name(&self) -> &'static str {
            "echo"
        }
    }

    struct Fixed(&'static str);

    #[async_trait]
    impl TextTransformer for Fixed {
        async fn transform(&self, _input: &str) -> Result<String> {
            Ok(self.0.to_string())
        }

        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    struct Failing;

    #[async_trait]
    impl TextTransformer for Failing {
        async fn transform(&self, _input: &str) -> Result<String> {
            Err(SubtransError::Io(std::io::Error::other("connection reset")))
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    #[tokio::test]
    async fn test_all_stages_echo() {
        let runner = StageRunner::new(Box::new(Echo), Box::new(Echo), Box::new(Echo));
        let out = runner.run(CHUNK.to_string()).await.unwrap();
        assert_eq!(out, CHUNK);
    }

    #[tokio::test]
    async fn test_invalid_stage_falls_back_to_previous_text() {
        let runner = StageRunner::new(
            Box::new(Fixed("sorry, cannot comply")),
            Box::new(Echo),
            Box::new(Echo),
        );
        let out = runner.run(CHUNK.to_string()).await.unwrap();
        assert_eq!(out, CHUNK);
    }

    #[tokio::test]
    async fn test_recovered_stage_output_is_recomposed() {
        let translated = "Here you go:\n```srt\n1\n00:00:01,000 --> 00:00:02,000\n你好\n```";
        let runner = StageRunner::new(Box::new(Echo), Box::new(Echo), Box::new(Fixed(translated)));
        let out = runner.run(CHUNK.to_string()).await.unwrap();
        assert_eq!(out, "1\n00:00:01,000 --> 00:00:02,000\n你好\n");
    }

    #[tokio::test]
    async fn test_every_stage_invalid_returns_input() {
        let runner = StageRunner::new(
            Box::new(Fixed("nope")),
            Box::new(Fixed("still nope")),
            Box::new(Fixed("")),
        );
        let out = runner.run(CHUNK.to_string()).await.unwrap();
        assert_eq!(out, CHUNK);
    }

    #[tokio::test]
    async fn test_transport_failure_aborts() {
        let runner = StageRunner::new(Box::new(Echo), Box::new(Failing), Box::new(Echo));
        let err = runner.run(CHUNK.to_string()).await.unwrap_err();
        match err {
            SubtransError::Transformer { stage, .. } => assert_eq!(stage, Stage::Proofreader),
            other => panic!("expected Transformer error, got {other}"),
        }
    }
}
