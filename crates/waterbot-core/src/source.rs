use std::path::{Path, PathBuf};
use std::process::Command;

/// Paths that never leave the source tree, regardless of `.gitignore`.
const ALWAYS_EXCLUDED: &[&str] = &[".git", ".venv", ".waterbot", "__pycache__"];

/// Read-only handle to a project directory handed to the pipeline stages.
///
/// Construction does not copy anything. The file list is taken at the moment a
/// stage is evaluated, see [`SourceTree::files`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceTree {
    root: PathBuf,
}

impl SourceTree {
    /// Wrap a path without touching the filesystem.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Open an existing directory, resolving it to an absolute path.
    pub fn open(root: impl AsRef<Path>) -> crate::Result<Self> {
        let root = root.as_ref();
        let resolved = root
            .canonicalize()
            .map_err(|e| crate::Error::SourceResolve {
                path: root.to_path_buf(),
                source: e,
            })?;

        if !resolved.is_dir() {
            return Err(crate::Error::SourceNotDirectory(resolved));
        }

        Ok(Self { root: resolved })
    }

    /// The directory the pipeline was invoked from.
    pub fn invocation_root() -> crate::Result<Self> {
        Self::open(".")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Relative paths of every file that belongs to the tree.
    ///
    /// Inside a git work tree (the root itself or any directory below a
    /// repository) this is `git ls-files --cached --others --exclude-standard`,
    /// so ignored files stay out. Anywhere else the directory is walked,
    /// following symlinks. [`ALWAYS_EXCLUDED`] entries are dropped in both
    /// cases. The result is sorted.
    pub fn files(&self) -> crate::Result<Vec<PathBuf>> {
        let mut files = if self.in_git_work_tree()? {
            self.git_ls_files()?
        } else {
            let mut found = Vec::new();
            walk(&self.root, Path::new(""), &mut Vec::new(), &mut found)?;
            found
        };

        files.retain(|path| !is_excluded(path));
        files.sort();
        Ok(files)
    }

    fn in_git_work_tree(&self) -> crate::Result<bool> {
        let output = match Command::new("git")
            .args(["rev-parse", "--is-inside-work-tree"])
            .current_dir(&self.root)
            .output()
        {
            Ok(output) => output,
            // without git, only a tree with no repository above it can be walked safely
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !self.has_git_ancestor() => {
                tracing::debug!(root = %self.root.display(), "git not installed, walking tree");
                return Ok(false);
            }
            Err(e) => {
                return Err(crate::Error::GitCommand {
                    detail: "failed to execute git rev-parse".to_owned(),
                    source: e,
                });
            }
        };

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).trim() == "true");
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("not a git repository") {
            Ok(false)
        } else {
            Err(crate::Error::GitFailed {
                detail: format!(
                    "git rev-parse exited with {}: {}",
                    output.status,
                    stderr.trim()
                ),
            })
        }
    }

    fn has_git_ancestor(&self) -> bool {
        self.root.ancestors().any(|dir| dir.join(".git").exists())
    }

    fn git_ls_files(&self) -> crate::Result<Vec<PathBuf>> {
        let output = Command::new("git")
            .args(["ls-files", "--cached", "--others", "--exclude-standard"])
            .current_dir(&self.root)
            .output()
            .map_err(|e| crate::Error::GitCommand {
                detail: "failed to execute git ls-files".to_owned(),
                source: e,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(crate::Error::GitFailed {
                detail: format!(
                    "git ls-files exited with {}: {}",
                    output.status,
                    stderr.trim()
                ),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout
            .lines()
            .filter(|line| !line.is_empty())
            .map(PathBuf::from)
            // deleted-but-tracked files are still listed by --cached
            .filter(|path| self.root.join(path).is_file())
            .collect())
    }
}

/// `ancestors` holds the canonical directories on the current path, so a
/// symlink pointing back up the tree is reported instead of followed forever.
fn walk(
    root: &Path,
    relative: &Path,
    ancestors: &mut Vec<PathBuf>,
    found: &mut Vec<PathBuf>,
) -> crate::Result<()> {
    let dir = root.join(relative);
    let canonical = dir.canonicalize().map_err(|e| crate::Error::SourceRead {
        path: dir.clone(),
        source: e,
    })?;
    if ancestors.contains(&canonical) {
        return Err(crate::Error::SymlinkLoop(dir));
    }

    let entries = std::fs::read_dir(&dir).map_err(|e| crate::Error::SourceRead {
        path: dir.clone(),
        source: e,
    })?;

    ancestors.push(canonical);
    for entry in entries {
        let entry = entry.map_err(|e| crate::Error::SourceRead {
            path: dir.clone(),
            source: e,
        })?;
        let path = relative.join(entry.file_name());
        if is_excluded(&path) {
            continue;
        }

        // follows symlinks; a dangling link is an error
        let metadata = std::fs::metadata(entry.path()).map_err(|e| crate::Error::SourceRead {
            path: entry.path(),
            source: e,
        })?;

        if metadata.is_dir() {
            walk(root, &path, ancestors, found)?;
        } else if metadata.is_file() {
            found.push(path);
        } else {
            return Err(crate::Error::UnsupportedEntry(entry.path()));
        }
    }
    ancestors.pop();

    Ok(())
}

fn is_excluded(relative: &Path) -> bool {
    relative.components().any(|c| {
        ALWAYS_EXCLUDED
            .iter()
            .any(|ex| c.as_os_str() == std::ffi::OsStr::new(ex))
    })
}
