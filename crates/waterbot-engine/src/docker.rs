#[derive(Debug, thiserror::Error)]
pub enum DockerError {
    #[error("{program} not found; install Docker from https://docs.docker.com/get-docker/")]
    NotFound {
        program: String,
        source: std::io::Error,
    },

    #[error("docker command failed ({status}): {args:?}")]
    CommandFailed {
        args: Vec<String>,
        status: String,
        stdout: String,
        stderr: String,
    },

    #[error("docker output was not valid UTF-8")]
    InvalidUtf8 { source: std::string::FromUtf8Error },

    #[error("failed to write to docker stdin")]
    StdinWrite { source: std::io::Error },
}
