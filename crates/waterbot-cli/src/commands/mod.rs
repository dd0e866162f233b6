mod build;
mod doctor;
mod echo;
mod publish;
mod render;

use std::path::{Path, PathBuf};

use waterbot_core::{SourceTree, WaterbotConfig};
use waterbot_engine::{DockerError, Engine};

pub use build::{build, build_env};
pub use doctor::doctor;
pub use echo::container_echo;
pub use publish::publish;
pub use render::{render_build, render_environment};
pub use test::test;

/// Flags shared by every stage command.
pub struct Options {
    pub source: Option<PathBuf>,
    pub progress: bool,
}

impl Options {
    pub(crate) fn source_tree(&self) -> anyhow::Result<SourceTree> {
        let tree = match &self.source {
            Some(dir) => SourceTree::open(dir)?,
            None => SourceTree::invocation_root()?,
        };
        tracing::debug!(source = %tree.root().display(), "source tree");
        Ok(tree)
    }
}

/// `waterbot.toml` from the invocation directory.
pub(crate) fn load_config() -> anyhow::Result<WaterbotConfig> {
    Ok(WaterbotConfig::load(Path::new("."))?)
}

/// Engine for an evaluating command, after the preflight checks pass.
pub(crate) async fn ready_engine(config: &WaterbotConfig, options: &Options) -> anyhow::Result<Engine> {
    let engine = Engine::from_config(&config.engine).with_streamed_output(options.progress);

    eprintln!("Running pre-flight checks...");
    let report = engine.check_prerequisites().await?;
    tracing::debug!(
        client = report.client_version.as_deref().unwrap_or("unknown"),
        server = report.server_version.as_deref().unwrap_or("unknown"),
        "docker ready"
    );

    Ok(engine)
}

/// Prints what a failed docker command wrote, once, so a failing test or
/// build step is visible above the error chain.
pub fn report_command_output(error: &anyhow::Error) {
    let failed = error.chain().find_map(|cause| match cause.downcast_ref::<DockerError>() {
        Some(DockerError::CommandFailed { stdout, stderr, .. }) => Some((stdout, stderr)),
        _ => None,
    });

    if let Some((stdout, stderr)) = failed {
        print!("{stdout}");
        eprint!("{stderr}");
    }
}
