use std::path::{Path, PathBuf};

use tempfile::TempDir;
use waterbot_core::{Container, Op};

use crate::dockerfile::context_dir_name;

/// A self-contained Docker build context on disk.
///
/// Each evaluation gets its own directory, removed when the value is dropped,
/// so concurrent builds of the same source tree never share files.
#[derive(Debug)]
pub struct BuildContext {
    dir: TempDir,
}

impl BuildContext {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn dockerfile_path(&self) -> PathBuf {
        self.dir.path().join("Dockerfile")
    }
}

/// Snapshots every source tree mounted by `container` into a fresh context.
///
/// The `n`-th mounted tree lands in `dir<n>/`, matching the `COPY` lines
/// produced by [`DockerfileGenerator`](crate::DockerfileGenerator). The
/// rendered Dockerfile is written at the context root.
pub fn create_context(
    container: &Container,
    dockerfile_content: &str,
) -> Result<BuildContext, BundleError> {
    let dir = tempfile::Builder::new()
        .prefix("waterbot-context-")
        .tempdir()
        .map_err(|e| BundleError::TempDir { source: e })?;

    let sources = container.ops().iter().filter_map(|op| match op {
        Op::Directory { source, .. } => Some(source),
        _ => None,
    });

    for (index, source) in sources.enumerate() {
        let target = dir.path().join(context_dir_name(index));
        create_dir(&target)?;

        let files = source
            .files()
            .map_err(|e| BundleError::Source { source: e })?;
        tracing::debug!(
            root = %source.root().display(),
            files = files.len(),
            "snapshotting source tree"
        );

        for relative_path in &files {
            let src = source.root().join(relative_path);
            let dst = target.join(relative_path);

            if let Some(parent) = dst.parent() {
                create_dir(parent)?;
            }

            std::fs::copy(&src, &dst).map_err(|e| BundleError::CopyFile {
                path: src,
                source: e,
            })?;
        }
    }

    let context = BuildContext { dir };
    std::fs::write(context.dockerfile_path(), dockerfile_content).map_err(|e| {
        BundleError::WriteDockerfile {
            path: context.dockerfile_path(),
            source: e,
        }
    })?;

    Ok(context)
}

fn create_dir(path: &Path) -> Result<(), BundleError> {
    std::fs::create_dir_all(path).map_err(|e| BundleError::Create {
        path: path.to_path_buf(),
        source: e,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    #[error("failed to create temporary build context")]
    TempDir { source: std::io::Error },
    #[error("failed to list source files")]
    Source { source: waterbot_core::Error },
    #[error("failed to create directory {path}")]
    Create {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
    #[error("failed to copy file {path}")]
    CopyFile {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write Dockerfile at {path}")]
    WriteDockerfile {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
}
