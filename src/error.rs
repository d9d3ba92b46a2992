use crate::subtitle::srt::ParseError;
use crate::transform::Stage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SubtransError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("File is not valid UTF-8: {0}")]
    BadEncoding(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SRT parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Tokenizer initialization failed: {0}")]
    Tokenizer(String),

    #[error("Chunker produced no chunks from {0} cues")]
    EmptyChunking(usize),

    #[error("{stage} stage failed: {reason}")]
    Transformer { stage: Stage, reason: String },

    #[error("Chunk {chunk} produced no parsable subtitles: {reason}")]
    UnrecoverableOutput { chunk: usize, reason: String },

    #[error("Chunk {chunk} timed out")]
    ChunkTimeout { chunk: usize },

    #[error("Pipeline cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, SubtransError>;
