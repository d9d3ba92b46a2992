//! Token-bounded, sentence-aligned chunking of cue lists.

use super::srt::{compose_iter, ComposeOptions, Eol};
use super::Cue;
use crate::token::TokenCounter;
use std::sync::Arc;
use tracing::debug;

/// Characters that close a sentence for chunk alignment.
pub const SENTENCE_TERMINATORS: [char; 6] = ['.', '?', '!', '。', '？', '！'];

fn ends_sentence(content: &str) -> bool {
    content
        .trim_end()
        .chars()
        .last()
        .map_or(false, |c| SENTENCE_TERMINATORS.contains(&c))
}

/// Partitions a cue list into chunks whose serialized SRT form stays
/// within a token budget, cutting at sentence boundaries where possible.
///
/// Guarantees: every input cue lands in exactly one chunk, input order is
/// preserved, and no chunk exceeds the budget unless it holds a single
/// cue that is itself over budget.
pub struct Chunker {
    counter: Arc<dyn TokenCounter>,
    max_tokens: usize,
}

impl Chunker {
    pub fn new(counter: Arc<dyn TokenCounter>, max_tokens: usize) -> Self {
        Self {
            counter,
            max_tokens,
        }
    }

    fn cost<'a>(&self, cues: impl IntoIterator<Item = &'a Cue>) -> usize {
        let opts = ComposeOptions {
            reindex: false,
            start_index: 1,
            strict: true,
            eol: Eol::Lf,
        };
        self.counter.count(&compose_iter(cues, &opts))
    }

    pub fn split(&self, cues: Vec<Cue>) -> Vec<Vec<Cue>> {
        if cues.is_empty() || self.max_tokens == 0 {
            return Vec::new();
        }

        let mut chunks: Vec<Vec<Cue>> = Vec::new();
        // Committed prefix of the chunk in progress; always ends at a
        // sentence terminator or is empty.
        let mut current: Vec<Cue> = Vec::new();
        // Cues accumulated since the last sentence terminator.
        let mut pending: Vec<Cue> = Vec::new();

        for cue in cues {
            if self.cost([&cue]) > self.max_tokens {
                // A single cue over budget becomes its own chunk.
                if !current.is_empty() {
                    chunks.push(std::mem::take(&mut current));
                }
                if !pending.is_empty() {
                    chunks.push(std::mem::take(&mut pending));
                }
                debug!(index = ?cue.index, "cue exceeds chunk budget on its own");
                chunks.push(vec![cue]);
                continue;
            }

            let sentence_end = ends_sentence(&cue.content);
            pending.push(cue);

            if self.cost(current.iter().chain(pending.iter())) <= self.max_tokens {
                if sentence_end {
                    current.append(&mut pending);
                }
            } else {
                if !current.is_empty() {
                    chunks.push(std::mem::take(&mut current));
                }

                if self.cost(pending.iter()) <= self.max_tokens {
                    if sentence_end {
                        chunks.push(std::mem::take(&mut pending));
                    } else {
                        current = std::mem::take(&mut pending);
                    }
                } else {
                    // The unterminated sentence has itself outgrown the
                    // budget; split it greedily without alignment.
                    debug!("sentence run exceeds chunk budget, splitting unaligned");
                    for cue in pending.drain(..) {
                        if !current.is_empty()
                            && self.cost(current.iter().chain([&cue])) > self.max_tokens
                        {
                            chunks.push(std::mem::take(&mut current));
                        }
                        current.push(cue);
                    }
                }
            }
        }

        if !pending.is_empty() {
            if !current.is_empty()
                && self.cost(current.iter().chain(pending.iter())) <= self.max_tokens
            {
                current.append(&mut pending);
            } else {
                if !current.is_empty() {
                    chunks.push(std::mem::take(&mut current));
                }
                current = pending;
            }
        }
        if !current.is_empty() {
            chunks.push(current);
        }

        chunks
    }
}

/// Flatten processed chunks back into one cue list ordered by time.
pub fn merge_chunks(chunks: Vec<Vec<Cue>>) -> Vec<Cue> {
    let mut all: Vec<Cue> = chunks.into_iter().flatten().collect();
    all.sort_by_key(Cue::sort_key);
    all
}
