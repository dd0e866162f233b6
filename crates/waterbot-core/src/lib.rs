//! Core types and configuration for waterbot.
//!
//! This crate defines the declarative [`Container`] model the pipeline stages
//! build, the [`SourceTree`] handle they read from, the `waterbot.toml` schema
//! ([`WaterbotConfig`]), registry credentials, and shared error types.

pub mod config;
pub mod container;
pub mod error;
pub mod registry;
pub mod source;

pub use config::{EngineConfig, RegistryConfig, WaterbotConfig};
pub use container::{CacheMount, CacheVolume, Container, ContainerError, Op};
pub use error::{Error, Result};
pub use registry::RegistryAuth;
pub use source::SourceTree;
