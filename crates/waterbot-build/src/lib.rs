//! Dockerfile rendering and build-context bundling for waterbot.
//!
//! # Evaluation
//!
//! ```text
//! Container
//!   1. Render   ── DockerfileGenerator::render()
//!   2. Bundle   ── SourceTree::files() → <tmp>/dirN/ + <tmp>/Dockerfile
//!   3. Build    ── docker build (waterbot-engine)
//! ```
//!
//! # Bundle strategy
//!
//! Every mounted source tree is copied into its own `dirN/` directory of a
//! temporary context:
//! - Git work trees contribute tracked and untracked (non-ignored) files
//! - Other directories are walked in full
//! - `.git/`, `.venv/`, `.waterbot/`, `__pycache__/` are always excluded
//!
//! The context lives exactly as long as the returned [`BuildContext`].

pub mod bundle;
pub mod dockerfile;

pub use bundle::{BuildContext, BundleError, create_context};
pub use dockerfile::DockerfileGenerator;
