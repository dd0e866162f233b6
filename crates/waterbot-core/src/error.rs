use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to load config from {path}")]
    ConfigLoad {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("missing environment variable: {0}")]
    MissingEnvVar(String),

    // ── Source trees ──
    #[error("failed to resolve source directory {path}")]
    SourceResolve {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("source {0} is not a directory")]
    SourceNotDirectory(PathBuf),

    #[error("failed to read {path}")]
    SourceRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("symlink loop at {0}")]
    SymlinkLoop(PathBuf),

    #[error("{0} is not a regular file, directory, or symlink to one")]
    UnsupportedEntry(PathBuf),

    #[error("git command failed: {detail}")]
    GitCommand {
        detail: String,
        source: std::io::Error,
    },

    #[error("git failed: {detail}")]
    GitFailed { detail: String },
}
