use crate::{
    source::{ChunkSource, Replay, ReplaySource},
    validator::{validate, ValidationResult},
    Error,
};

/// Default number of leading bytes inspected.
pub const DEFAULT_VALIDATION_BYTES: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    AwaitingFirstChunk,
    Validating,
    Rejecting,
    Replaying,
    Failed,
}

fn enter(stage: &mut Stage, next: Stage) {
    log::debug!("Pipeline {:?} -> {:?}", stage, next);
    *stage = next;
}

/// How an upload ended up. Produced exactly once per upload.
pub enum Outcome<S> {
    /// The head passed validation; the stream yields the complete upload.
    Accepted(Replay<S>),
    /// The upload had no bytes at all.
    Empty,
    Rejected { reason: String },
    /// Reading the upload failed before a verdict was reached.
    Failed(Error),
}

impl<S> Outcome<S> {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Outcome::Accepted(_))
    }
}

/// Peeks at the head of an upload, validates it and, if it passes, hands
/// back the whole upload as a stream.
///
/// Only the retained head is ever buffered: at most `validation_bytes` plus
/// one chunk, whatever the size of the upload. On every path other than
/// acceptance the retained chunks and the source are dropped before `run`
/// returns and nothing further is pulled.
pub struct Pipeline<S> {
    source: ReplaySource<S>,
}

impl<S: ChunkSource> Pipeline<S> {
    pub fn new(source: S, validation_bytes: usize) -> Self {
        Pipeline {
            source: ReplaySource::new(source, validation_bytes),
        }
    }

    pub async fn run(self) -> Outcome<S> {
        let mut source = self.source;
        let mut stage = Stage::AwaitingFirstChunk;

        let prefix = match source.peek().await {
            Ok(prefix) => prefix,
            Err(e) => {
                enter(&mut stage, Stage::Failed);
                source.release();
                log::warn!("Failed to read upload: {}", e);
                return Outcome::Failed(e);
            }
        };

        if prefix.is_empty() {
            enter(&mut stage, Stage::Rejecting);
            source.release();
            log::info!("Rejected empty upload");
            return Outcome::Empty;
        }

        enter(&mut stage, Stage::Validating);

        match validate(&prefix) {
            ValidationResult::Accepted => {
                enter(&mut stage, Stage::Replaying);
                log::info!("Accepted upload, first {} bytes valid", prefix.len());
                Outcome::Accepted(source.into_replay())
            }

            ValidationResult::Rejected { reason } => {
                enter(&mut stage, Stage::Rejecting);
                source.release();
                log::info!("Rejected upload: {}", reason);
                Outcome::Rejected { reason }
            }
        }
    }
}
