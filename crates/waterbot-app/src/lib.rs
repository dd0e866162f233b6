//! Placeholder page for the water-bot image.
//!
//! ```rust,no_run
//! use waterbot_app::{PlaceholderService, ServeConfig};
//!
//! # async fn run() -> Result<(), waterbot_app::ServeError> {
//! let config = ServeConfig::load()?;
//! waterbot_app::serve(PlaceholderService::new(), &config).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod service;

pub use config::ServeConfig;
pub use error::ServeError;
pub use service::{PlaceholderService, serve, serve_listener};
