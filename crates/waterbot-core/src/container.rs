//! Declarative container description.
//!
//! A [`Container`] is an ordered list of [`Op`]s applied on top of a base
//! image. Every `with_*` call returns a new value and leaves the receiver
//! untouched, so a base environment can be shared by several stages that each
//! layer their own operations on top.

use std::collections::BTreeMap;

use crate::SourceTree;

/// A named cache that survives across pipeline invocations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheVolume {
    name: String,
}

impl CacheVolume {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A cache volume bound to a path inside the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheMount {
    pub path: String,
    pub cache: CacheVolume,
}

/// One step of a container description, in application order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    /// Copy a source tree into the container at `path`.
    Directory { path: String, source: SourceTree },
    Workdir(String),
    MountedCache(CacheMount),
    /// Run a command while building; every cache mounted so far is attached.
    Exec(Vec<String>),
    EnvVariable { name: String, value: String },
    ExposedPort(u16),
    Entrypoint(Vec<String>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Container {
    base: Option<String>,
    ops: Vec<Op>,
}

impl Container {
    /// An empty container on `scratch`.
    pub fn new() -> Self {
        Self::default()
    }

    /// A container starting from `image`.
    pub fn from_image(image: impl Into<String>) -> Self {
        Self {
            base: Some(image.into()),
            ops: Vec::new(),
        }
    }

    /// Base image reference, `None` for `scratch`.
    pub fn base(&self) -> Option<&str> {
        self.base.as_deref()
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    #[must_use]
    pub fn with_directory(&self, path: impl Into<String>, source: &SourceTree) -> Self {
        self.push(Op::Directory {
            path: path.into(),
            source: source.clone(),
        })
    }

    #[must_use]
    pub fn with_workdir(&self, path: impl Into<String>) -> Self {
        self.push(Op::Workdir(path.into()))
    }

    #[must_use]
    pub fn with_mounted_cache(&self, path: impl Into<String>, cache: &CacheVolume) -> Self {
        self.push(Op::MountedCache(CacheMount {
            path: path.into(),
            cache: cache.clone(),
        }))
    }

    #[must_use]
    pub fn with_exec<I, S>(&self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(Op::Exec(args.into_iter().map(Into::into).collect()))
    }

    #[must_use]
    pub fn with_env_variable(&self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(Op::EnvVariable {
            name: name.into(),
            value: value.into(),
        })
    }

    #[must_use]
    pub fn with_exposed_port(&self, port: u16) -> Self {
        self.push(Op::ExposedPort(port))
    }

    #[must_use]
    pub fn with_entrypoint<I, S>(&self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(Op::Entrypoint(args.into_iter().map(Into::into).collect()))
    }

    fn push(&self, op: Op) -> Self {
        let mut next = self.clone();
        next.ops.push(op);
        next
    }

    // ── Derived views ──

    /// Effective environment; a later assignment of the same name wins.
    pub fn env_variables(&self) -> BTreeMap<&str, &str> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                Op::EnvVariable { name, value } => Some((name.as_str(), value.as_str())),
                _ => None,
            })
            .collect()
    }

    /// Exposed ports in declaration order, without duplicates.
    pub fn exposed_ports(&self) -> Vec<u16> {
        let mut ports = Vec::new();
        for op in &self.ops {
            if let Op::ExposedPort(port) = op
                && !ports.contains(port)
            {
                ports.push(*port);
            }
        }
        ports
    }

    pub fn entrypoint(&self) -> Option<&[String]> {
        self.ops.iter().rev().find_map(|op| match op {
            Op::Entrypoint(args) => Some(args.as_slice()),
            _ => None,
        })
    }

    pub fn workdir(&self) -> Option<&str> {
        self.ops.iter().rev().find_map(|op| match op {
            Op::Workdir(path) => Some(path.as_str()),
            _ => None,
        })
    }

    pub fn cache_mounts(&self) -> Vec<&CacheMount> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                Op::MountedCache(mount) => Some(mount),
                _ => None,
            })
            .collect()
    }

    pub fn execs(&self) -> Vec<&[String]> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                Op::Exec(args) => Some(args.as_slice()),
                _ => None,
            })
            .collect()
    }

    /// Splits off a trailing exec, returning the container it runs in.
    ///
    /// Returns `None` when the last operation is not an exec.
    pub fn split_last_exec(&self) -> Option<(Container, &[String])> {
        match self.ops.last() {
            Some(Op::Exec(args)) => {
                let prefix = Self {
                    base: self.base.clone(),
                    ops: self.ops[..self.ops.len() - 1].to_vec(),
                };
                Some((prefix, args.as_slice()))
            }
            _ => None,
        }
    }

    /// Checks every operation for values no engine can apply.
    pub fn validate(&self) -> Result<(), ContainerError> {
        if let Some(base) = &self.base
            && base.trim().is_empty()
        {
            return Err(ContainerError::EmptyBaseImage);
        }

        for op in &self.ops {
            match op {
                Op::Directory { path, .. } | Op::Workdir(path) => check_path(path)?,
                Op::MountedCache(mount) => {
                    check_path(&mount.path)?;
                    if mount.cache.name().trim().is_empty() {
                        return Err(ContainerError::EmptyCacheName);
                    }
                }
                Op::Exec(args) if args.is_empty() => return Err(ContainerError::EmptyExec),
                Op::Exec(_) => {}
                Op::EnvVariable { name, .. } => {
                    if !is_valid_env_name(name) {
                        return Err(ContainerError::InvalidEnvName(name.clone()));
                    }
                }
                Op::ExposedPort(0) => return Err(ContainerError::InvalidPort),
                Op::ExposedPort(_) => {}
                Op::Entrypoint(args) if args.is_empty() => {
                    return Err(ContainerError::EmptyEntrypoint);
                }
                Op::Entrypoint(_) => {}
            }
        }

        Ok(())
    }
}

/// Container paths are absolute and written unquoted into the Dockerfile.
fn check_path(path: &str) -> Result<(), ContainerError> {
    if !path.starts_with('/') {
        return Err(ContainerError::RelativePath(path.to_owned()));
    }
    if path.chars().any(char::is_whitespace) {
        return Err(ContainerError::WhitespaceInPath(path.to_owned()));
    }
    Ok(())
}

fn is_valid_env_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContainerError {
    #[error("base image reference is empty")]
    EmptyBaseImage,

    #[error("container path {0:?} must be absolute")]
    RelativePath(String),

    #[error("container path {0:?} contains whitespace")]
    WhitespaceInPath(String),

    #[error("cache volume name is empty")]
    EmptyCacheName,

    #[error("exec has no command")]
    EmptyExec,

    #[error("invalid environment variable name {0:?}")]
    InvalidEnvName(String),

    #[error("exposed port must be between 1 and 65535")]
    InvalidPort,

    #[error("entrypoint has no command")]
    EmptyEntrypoint,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_names() {
        assert!(is_valid_env_name("HOST"));
        assert!(is_valid_env_name("_PRIVATE_1"));
        assert!(!is_valid_env_name(""));
        assert!(!is_valid_env_name("1PORT"));
        assert!(!is_valid_env_name("A=B"));
        assert!(!is_valid_env_name("WITH SPACE"));
    }
}
