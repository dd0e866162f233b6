//! Build, test and publish stages for the water-bot image.
//!
//! ```text
//! build_environment ──┬── test ────┐
//!                     └── build ───┴── publish ── docker.io/johnhkchen/water-bot
//! ```
//!
//! `build_environment`, `build` and `container_echo` only describe containers.
//! `test` and `publish` evaluate them through the [`Engine`] they are given.
//! Every call builds its own environment; nothing is shared between stages
//! except the `pip_cache` volume inside the engine.
//!
//! [`Engine`]: waterbot_engine::Engine

pub mod error;
pub mod stages;

pub use error::PipelineError;
pub use stages::{
    APP_HOST, APP_PORT, BASE_IMAGE, CACHE_PATH, CACHE_VOLUME, ECHO_IMAGE, REGISTRY_ADDRESS,
    SOURCE_PATH, build, build_environment, container_echo, publish, test,
};
