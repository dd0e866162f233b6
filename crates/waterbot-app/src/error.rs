#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("invalid {var}: {value:?}")]
    InvalidEnvVar { var: &'static str, value: String },

    #[error("failed to bind {addr}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("server error")]
    Serve { source: std::io::Error },
}
