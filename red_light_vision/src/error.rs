// THEORY:
// Every failure the engine can report is a `GameError`. The variants are
// grouped by how the game loop reacts to them:
//
// - Setup failures (`SourceUnavailable`, `MissingArtifact`, `ModelLoad`,
//   `InvalidConfig`, `ConfigParse`, `Io`) are fatal. They propagate out of
//   `GameSession::tick` and `GameLoop::run` and end the process.
// - `Detection` is raised by a detector for a single frame. The session logs
//   it and treats the tick like a dropped frame.
// - `Resize` comes from preparing one player's patches. The session logs it
//   and leaves that player alone for the tick.
//
// Dropped frames and empty detection lists are not errors at all: a frame
// source returns `None` and a detector returns an empty `Vec`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GameError {
    #[error("frame source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("model artifact not found: {}", .0.display())]
    MissingArtifact(PathBuf),

    #[error("failed to load detection model: {0}")]
    ModelLoad(String),

    #[error("person detection failed: {0}")]
    Detection(String),

    #[error("failed to resize patch: {0}")]
    Resize(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl GameError {
    /// Setup failures end the game; everything else is local to one tick.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, GameError::Detection(_) | GameError::Resize(_))
    }
}

impl From<fast_image_resize::ResizeError> for GameError {
    fn from(err: fast_image_resize::ResizeError) -> Self {
        GameError::Resize(err.to_string())
    }
}

impl From<fast_image_resize::ImageBufferError> for GameError {
    fn from(err: fast_image_resize::ImageBufferError) -> Self {
        GameError::Resize(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GameError>;
