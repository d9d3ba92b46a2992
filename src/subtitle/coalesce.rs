//! Merging of time-adjacent cues that belong to one utterance.

use super::Cue;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for [`coalesce`].
///
/// `strict_terminators` is broader than the chunker's sentence set (it
/// includes commas): a cue ending in any of these characters is treated
/// as a finished utterance and never merged into. An empty string
/// disables the punctuation check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoalesceConfig {
    /// Largest silence between two cues that still reads as one utterance.
    pub max_pause: Duration,
    /// Upper bound on the duration of a merged cue.
    pub max_duration: Duration,
    pub strict_terminators: String,
}

impl Default for CoalesceConfig {
    fn default() -> Self {
        Self {
            max_pause: Duration::from_millis(700),
            max_duration: Duration::from_secs(15),
            strict_terminators: ",.?!，。？！".to_string(),
        }
    }
}

/// Merge cues that continue one another in time and punctuation.
///
/// Input is sorted by start time first; output stays sorted and covers
/// the same time span. Merged cues lose their index (compose reassigns
/// it) and keep the first member's proprietary trailer.
pub fn coalesce(cues: Vec<Cue>, config: &CoalesceConfig) -> Vec<Cue> {
    if cues.is_empty() {
        return cues;
    }

    let mut sorted = cues;
    sorted.sort_by_key(Cue::sort_key);

    let mut result: Vec<Cue> = Vec::new();
    let mut iter = sorted.into_iter();
    let mut acc = iter.next().expect("non-empty after guard");

    for next in iter {
        let ends_utterance = !config.strict_terminators.is_empty()
            && acc
                .content
                .trim_end()
                .chars()
                .last()
                .map_or(false, |c| config.strict_terminators.contains(c));

        // Overlapping cues count as zero pause.
        let pause = next.start.saturating_sub(acc.end);
        let merged_end = acc.end.max(next.end);
        let merged_duration = merged_end.saturating_sub(acc.start);

        if !ends_utterance && pause <= config.max_pause && merged_duration <= config.max_duration {
            acc.content = format!("{} {}", acc.content.trim(), next.content.trim());
            acc.end = merged_end;
            acc.index = None;
        } else {
            result.push(acc);
            acc = next;
        }
    }

    result.push(acc);
    result
}
