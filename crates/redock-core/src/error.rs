//! Error types for redock-core

use redock_engine::EngineError;
use thiserror::Error;

/// A step of the converge sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Build,
    Stop,
    Remove,
    Run,
    Attach,
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Build => write!(f, "build"),
            Self::Stop => write!(f, "stop"),
            Self::Remove => write!(f, "remove"),
            Self::Run => write!(f, "run"),
            Self::Attach => write!(f, "attach"),
        }
    }
}

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Build step failed: {source}")]
    Build {
        #[source]
        source: EngineError,
    },

    #[error("Run step failed: {source}")]
    Run {
        #[source]
        source: EngineError,
    },

    #[error("Engine unavailable during {step} step: {source}")]
    EngineUnavailable {
        step: Step,
        #[source]
        source: EngineError,
    },
}

impl LifecycleError {
    /// The step the error surfaced from, if it maps to one
    pub fn step(&self) -> Option<Step> {
        match self {
            Self::Build { .. } => Some(Step::Build),
            Self::Run { .. } => Some(Step::Run),
            Self::EngineUnavailable { step, .. } => Some(*step),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, LifecycleError>;
