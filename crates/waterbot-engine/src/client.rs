use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use secrecy::ExposeSecret;
use waterbot_build::{BuildContext, BundleError, DockerfileGenerator, create_context};
use waterbot_core::{Container, ContainerError, EngineConfig, RegistryAuth};

use crate::docker::DockerError;
use crate::executor::{DockerExecutor, RealExecutor};

/// Local id of a built image, as written by `docker build --iidfile`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageId(String);

impl ImageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Container engine client, parameterized over the executor for testability.
///
/// Every evaluating stage receives an `&Engine` explicitly; there is no
/// process-wide handle.
pub struct Engine<E: DockerExecutor = RealExecutor> {
    executor: E,
    platform: Option<String>,
    stream_output: bool,
}

impl Engine<RealExecutor> {
    pub fn new() -> Self {
        Self::with_executor(RealExecutor::new())
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        let engine = Self::with_executor(RealExecutor::with_program(&config.docker));
        match &config.platform {
            Some(platform) => engine.with_platform(platform),
            None => engine,
        }
    }
}

impl Default for Engine<RealExecutor> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: DockerExecutor> Engine<E> {
    pub fn with_executor(executor: E) -> Self {
        Self {
            executor,
            platform: None,
            stream_output: false,
        }
    }

    /// Build and run for `platform` (e.g. `linux/arm64`) instead of the host's.
    #[must_use]
    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }

    /// Stream `docker build` progress to the terminal instead of capturing it.
    #[must_use]
    pub fn with_streamed_output(mut self, stream: bool) -> Self {
        self.stream_output = stream;
        self
    }

    pub fn platform(&self) -> Option<&str> {
        self.platform.as_deref()
    }

    // ── Preflight ──

    pub async fn check_prerequisites(&self) -> Result<PreflightReport, PreflightError> {
        let mut report = PreflightReport::default();

        // 1. docker CLI available
        match self.executor.exec(&args(["--version"])).await {
            Ok(version) => report.client_version = Some(parse_client_version(&version)),
            Err(e) => return Err(PreflightError::DockerNotInstalled { source: e }),
        }

        // 2. Daemon reachable
        match self
            .executor
            .exec(&args(["info", "--format", "{{.ServerVersion}}"]))
            .await
        {
            Ok(version) => report.server_version = Some(version.trim().to_owned()),
            Err(e) => return Err(PreflightError::DaemonUnreachable { source: e }),
        }

        Ok(report)
    }

    // ── Doctor ──

    /// Run all diagnostic checks without early return.
    /// Returns a report with pass/fail for each check item.
    pub async fn doctor(&self) -> DoctorReport {
        let mut report = DoctorReport::default();

        // 1. docker CLI
        match self.executor.exec(&args(["--version"])).await {
            Ok(v) => report.docker = CheckResult::ok(&parse_client_version(&v)),
            Err(e) => report.docker = CheckResult::fail(&first_line(&e.to_string())),
        }

        // 2. Daemon
        match self
            .executor
            .exec(&args(["info", "--format", "{{.ServerVersion}}"]))
            .await
        {
            Ok(v) if !v.trim().is_empty() => {
                report.daemon = CheckResult::ok(&format!("server {}", v.trim()));
            }
            Ok(_) => report.daemon = CheckResult::fail("daemon reported no version"),
            Err(e) => report.daemon = CheckResult::fail(&first_line(&e.to_string())),
        }

        // 3. BuildKit front end (needed for cache mounts)
        match self.executor.exec(&args(["buildx", "version"])).await {
            Ok(v) => report.buildkit = CheckResult::ok(v.trim()),
            Err(e) => {
                report.buildkit = CheckResult::fail(&format!(
                    "docker buildx not available: {}",
                    first_line(&e.to_string())
                ));
            }
        }

        // 4. Platform
        report.platform = match &self.platform {
            Some(p) => CheckResult::ok(p),
            None => CheckResult::ok("host default"),
        };

        report
    }

    // ── Build ──

    /// Evaluate `container` into a local image.
    pub async fn build_image(&self, container: &Container) -> Result<ImageId, BuildError> {
        container
            .validate()
            .map_err(|e| BuildError::Invalid { source: e })?;

        let dockerfile = DockerfileGenerator::new(container).render();
        let context =
            create_context(container, &dockerfile).map_err(|e| BuildError::Bundle { source: e })?;
        let iid_file = context.path().join("image.id");

        let mut cmd = vec![
            "build".to_owned(),
            "--iidfile".to_owned(),
            path_arg(&iid_file)?,
            "--file".to_owned(),
            path_arg(&context.dockerfile_path())?,
        ];
        if let Some(platform) = &self.platform {
            cmd.push("--platform".to_owned());
            cmd.push(platform.clone());
        }
        cmd.push(path_arg(context.path())?);

        tracing::info!(base = container.base().unwrap_or("scratch"), "building image");
        if self.stream_output {
            self.executor
                .exec_streaming(&cmd)
                .await
                .map_err(|e| BuildError::Build { source: e })?;
        } else {
            let log = self
                .executor
                .exec(&cmd)
                .await
                .map_err(|e| BuildError::Build { source: e })?;
            tracing::trace!(%log, "build output");
        }

        read_image_id(&context, &iid_file)
    }

    /// Run `command` in a fresh container from `image`, capturing stdout.
    ///
    /// The image's entrypoint is cleared so `command` runs as given, and every
    /// cache mounted by `container` is attached as a named volume. If the
    /// returned future is dropped before the run finishes, the container is
    /// force-removed.
    pub async fn run(
        &self,
        image: &ImageId,
        container: &Container,
        command: &[String],
    ) -> Result<String, DockerError> {
        let name = container_name();
        let mut cmd = args(["run", "--rm", "--name", &name, "--entrypoint", ""]);
        if let Some(platform) = &self.platform {
            cmd.push("--platform".to_owned());
            cmd.push(platform.clone());
        }
        for mount in container.cache_mounts() {
            cmd.push("--mount".to_owned());
            cmd.push(format!(
                "type=volume,source={},target={}",
                mount.cache.name(),
                mount.path
            ));
        }
        cmd.push(image.as_str().to_owned());
        cmd.extend(command.iter().cloned());

        tracing::info!(%image, container = %name, ?command, "running");
        let guard = RemoveOnDrop {
            executor: &self.executor,
            name,
            armed: true,
        };
        let result = self.executor.exec(&cmd).await;
        guard.disarm();
        result
    }

    /// Stdout of the container's trailing exec.
    pub async fn stdout(&self, container: &Container) -> Result<String, ExecError> {
        let (prefix, command) = container.split_last_exec().ok_or(ExecError::NoExec)?;
        let image = self
            .build_image(&prefix)
            .await
            .map_err(|e| ExecError::Build { source: e })?;
        self.run(&image, &prefix, command)
            .await
            .map_err(|e| ExecError::Run { source: e })
    }

    // ── Registry ──

    /// Build `container`, push it to `address` and return the published reference.
    ///
    /// `address` without a tag is pushed as `:latest`. When the registry reports
    /// a digest the reference is pinned to it (`<address>:<tag>@sha256:…`).
    pub async fn publish(
        &self,
        container: &Container,
        address: &str,
        auth: Option<&RegistryAuth>,
    ) -> Result<String, PublishError> {
        let image = self
            .build_image(container)
            .await
            .map_err(|e| PublishError::Build { source: e })?;
        let reference = tagged_reference(address);

        self.executor
            .exec(&args(["tag", image.as_str(), &reference]))
            .await
            .map_err(|e| PublishError::Tag { source: e })?;

        if let Some(auth) = auth {
            self.login(registry_host(address), auth)
                .await
                .map_err(|e| PublishError::Login { source: e })?;
        }

        tracing::info!(%reference, "pushing image");
        let output = self
            .executor
            .exec(&args(["push", &reference]))
            .await
            .map_err(|e| PublishError::Push { source: e })?;

        Ok(match parse_push_digest(&output) {
            Some(digest) => format!("{reference}@{digest}"),
            None => reference,
        })
    }

    pub async fn login(&self, host: &str, auth: &RegistryAuth) -> Result<(), DockerError> {
        tracing::debug!(%host, username = %auth.username, "registry login");
        self.executor
            .exec_with_stdin(
                &args([
                    "login",
                    host,
                    "--username",
                    &auth.username,
                    "--password-stdin",
                ]),
                auth.password.expose_secret().as_bytes(),
            )
            .await?;

        Ok(())
    }
}

// ── Helper ──

/// Force-removes a running container unless disarmed.
struct RemoveOnDrop<'a, E: DockerExecutor> {
    executor: &'a E,
    name: String,
    armed: bool,
}

impl<E: DockerExecutor> RemoveOnDrop<'_, E> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl<E: DockerExecutor> Drop for RemoveOnDrop<'_, E> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        tracing::warn!(container = %self.name, "run cancelled, removing container");
        if let Err(e) = self
            .executor
            .spawn_detached(&args(["rm", "--force", &self.name]))
        {
            tracing::warn!(container = %self.name, error = %e, "failed to remove container");
        }
    }
}

/// Unique per process and call: `waterbot-<pid>-<n>`.
fn container_name() -> String {
    static NEXT: AtomicU64 = AtomicU64::new(0);
    format!(
        "waterbot-{}-{}",
        std::process::id(),
        NEXT.fetch_add(1, Ordering::Relaxed)
    )
}

fn args<const N: usize>(a: [&str; N]) -> Vec<String> {
    a.iter().map(|s| (*s).to_owned()).collect()
}

fn path_arg(path: &std::path::Path) -> Result<String, BuildError> {
    path.to_str()
        .map(str::to_owned)
        .ok_or_else(|| BuildError::InvalidPath(path.to_path_buf()))
}

fn read_image_id(context: &BuildContext, iid_file: &std::path::Path) -> Result<ImageId, BuildError> {
    let id = std::fs::read_to_string(iid_file).map_err(|e| BuildError::ReadImageId {
        path: iid_file.to_path_buf(),
        source: e,
    })?;
    let id = id.trim();
    if id.is_empty() {
        return Err(BuildError::MissingImageId(context.path().to_path_buf()));
    }
    tracing::debug!(image = %id, "image built");
    Ok(ImageId::new(id))
}

/// "Docker version 27.3.1, build ce12230" → "27.3.1"
fn parse_client_version(output: &str) -> String {
    let line = first_line(output);
    line.strip_prefix("Docker version ")
        .and_then(|rest| rest.split(',').next())
        .unwrap_or(line.as_str())
        .trim()
        .to_owned()
}

fn first_line(text: &str) -> String {
    text.lines().next().unwrap_or("").trim().to_owned()
}

/// Appends `:latest` unless the last path segment already carries a tag.
pub fn tagged_reference(address: &str) -> String {
    let last_segment = address.rsplit('/').next().unwrap_or(address);
    if last_segment.contains(':') || last_segment.contains('@') {
        address.to_owned()
    } else {
        format!("{address}:latest")
    }
}

/// Registry host of an image address, defaulting to Docker Hub.
pub fn registry_host(address: &str) -> &str {
    match address.split_once('/') {
        Some((first, _))
            if first.contains('.') || first.contains(':') || first == "localhost" =>
        {
            first
        }
        _ => "docker.io",
    }
}

/// Extracts the digest from `docker push` output
/// (`latest: digest: sha256:… size: 1234`).
pub fn parse_push_digest(output: &str) -> Option<&str> {
    output.lines().find_map(|line| {
        let (_, rest) = line.split_once("digest: ")?;
        rest.split_whitespace()
            .next()
            .filter(|d| d.starts_with("sha256:"))
    })
}

// ── Report types ──

#[derive(Debug, Default)]
pub struct PreflightReport {
    pub client_version: Option<String>,
    pub server_version: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum PreflightError {
    #[error("docker CLI not available (see https://docs.docker.com/get-docker/)")]
    DockerNotInstalled { source: DockerError },

    #[error("docker daemon is not reachable; is it running?")]
    DaemonUnreachable { source: DockerError },
}

#[derive(Debug, Default)]
pub struct DoctorReport {
    pub docker: CheckResult,
    pub daemon: CheckResult,
    pub buildkit: CheckResult,
    pub platform: CheckResult,
    pub config_file: CheckResult,
}

impl DoctorReport {
    pub fn all_passed(&self) -> bool {
        self.docker.passed
            && self.daemon.passed
            && self.buildkit.passed
            && self.platform.passed
            && self.config_file.passed
    }

    fn rows(&self) -> [(&'static str, &CheckResult); 5] {
        [
            ("Docker CLI", &self.docker),
            ("Docker daemon", &self.daemon),
            ("BuildKit", &self.buildkit),
            ("Platform", &self.platform),
            ("Config file", &self.config_file),
        ]
    }
}

impl fmt::Display for DoctorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (label, check) in self.rows() {
            writeln!(f, "[{}] {label:<14} {}", check.icon(), check.detail)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct CheckResult {
    pub passed: bool,
    pub detail: String,
}

impl CheckResult {
    pub fn ok(detail: &str) -> Self {
        Self {
            passed: true,
            detail: detail.to_owned(),
        }
    }

    pub fn fail(detail: &str) -> Self {
        Self {
            passed: false,
            detail: detail.to_owned(),
        }
    }

    pub fn icon(&self) -> &'static str {
        if self.passed { "OK" } else { "NG" }
    }
}

// ── Error types ──

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("invalid container")]
    Invalid { source: ContainerError },

    #[error("failed to prepare build context")]
    Bundle { source: BundleError },

    #[error("build context path is not valid UTF-8: {0}")]
    InvalidPath(std::path::PathBuf),

    #[error("docker build failed")]
    Build { source: DockerError },

    #[error("failed to read image id from {path}")]
    ReadImageId {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error("docker build wrote no image id in {0}")]
    MissingImageId(std::path::PathBuf),
}

#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("container has no trailing exec to capture")]
    NoExec,

    #[error("failed to build exec container")]
    Build { source: BuildError },

    #[error("exec failed")]
    Run { source: DockerError },
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("failed to build image for publishing")]
    Build { source: BuildError },

    #[error("failed to tag image")]
    Tag { source: DockerError },

    #[error("registry login failed")]
    Login { source: DockerError },

    #[error("registry push failed")]
    Push { source: DockerError },
}
