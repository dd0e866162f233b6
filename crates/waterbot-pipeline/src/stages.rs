use waterbot_core::{CacheVolume, Container, RegistryAuth, SourceTree};
use waterbot_engine::{DockerExecutor, Engine};

use crate::PipelineError;

pub const BASE_IMAGE: &str = "python:3.13-slim";
pub const ECHO_IMAGE: &str = "dtcooper/raspberrypi-os:python";
pub const SOURCE_PATH: &str = "/src";
pub const CACHE_VOLUME: &str = "pip_cache";
pub const CACHE_PATH: &str = "/root/.cache/pip";
pub const APP_HOST: &str = "0.0.0.0";
pub const APP_PORT: u16 = 5001;
pub const REGISTRY_ADDRESS: &str = "docker.io/johnhkchen/water-bot";

const TEST_COMMAND: [&str; 5] = ["uv", "run", "pytest", "--maxfail=1", "--disable-warnings"];
const ENTRYPOINT: [&str; 3] = ["uv", "run", "src/app/main.py"];

/// A container that echoes `message`.
pub fn container_echo(message: &str) -> Container {
    Container::from_image(ECHO_IMAGE).with_exec(["echo", message])
}

/// Python environment with the project's locked dependencies installed.
///
/// Pure: no I/O happens until an engine evaluates the result, so calling it
/// twice for the same tree yields equal containers.
pub fn build_environment(source: &SourceTree) -> Container {
    Container::from_image(BASE_IMAGE)
        .with_directory(SOURCE_PATH, source)
        .with_workdir(SOURCE_PATH)
        .with_mounted_cache(CACHE_PATH, &CacheVolume::new(CACHE_VOLUME))
        .with_exec(["pip", "install", "--upgrade", "pip"])
        .with_exec(["pip", "install", "uv"])
        // reads pyproject.toml + uv.lock, creates .venv/
        .with_exec(["uv", "sync"])
}

/// Runnable application image. Tests are not run here.
pub fn build(source: &SourceTree) -> Result<Container, PipelineError> {
    let port = APP_PORT.to_string();
    let image = build_environment(source)
        .with_env_variable("HOST", APP_HOST)
        .with_env_variable("PORT", port.as_str())
        .with_exposed_port(APP_PORT)
        .with_entrypoint(ENTRYPOINT);

    image
        .validate()
        .map_err(|e| PipelineError::Overlay { source: e })?;

    Ok(image)
}

/// Runs the test suite in a fresh environment and returns its stdout.
pub async fn test<E: DockerExecutor>(
    engine: &Engine<E>,
    source: &SourceTree,
) -> Result<String, PipelineError> {
    tracing::info!(source = %source.root().display(), "running tests");
    let environment = build_environment(source);
    let image = engine
        .build_image(&environment)
        .await
        .map_err(|e| PipelineError::Environment { source: e })?;

    let command: Vec<String> = TEST_COMMAND.iter().map(|s| (*s).to_owned()).collect();
    let output = engine
        .run(&image, &environment, &command)
        .await
        .map_err(|e| PipelineError::Test { source: e })?;

    tracing::info!("tests passed");
    Ok(output)
}

/// Tests, builds and pushes the application image to [`REGISTRY_ADDRESS`].
///
/// A failing test run is returned as-is and nothing is built or pushed.
pub async fn publish<E: DockerExecutor>(
    engine: &Engine<E>,
    source: &SourceTree,
    auth: Option<&RegistryAuth>,
) -> Result<String, PipelineError> {
    test(engine, source).await?;

    let image = build(source)?;
    let reference = engine
        .publish(&image, REGISTRY_ADDRESS, auth)
        .await
        .map_err(|e| PipelineError::Publish { source: e })?;

    tracing::info!(%reference, "published");
    Ok(reference)
}
