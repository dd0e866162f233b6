use waterbot_core::ContainerError;
use waterbot_engine::{BuildError, DockerError, PublishError};

/// Which stage failed, with the engine error that caused it.
///
/// Every failure ends the invocation; nothing is retried.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("environment construction failed")]
    Environment { source: BuildError },

    #[error("test suite failed")]
    Test { source: DockerError },

    #[error("invalid image configuration")]
    Overlay { source: ContainerError },

    #[error("publish failed")]
    Publish { source: PublishError },
}

impl PipelineError {
    /// Name of the stage that produced the error.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Environment { .. } => "environment",
            Self::Test { .. } => "test",
            Self::Overlay { .. } => "build",
            Self::Publish { .. } => "publish",
        }
    }
}
