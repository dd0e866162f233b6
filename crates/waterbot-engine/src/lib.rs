pub mod client;
pub mod docker;
pub mod executor;

pub use client::{
    BuildError, CheckResult, DoctorReport, Engine, ExecError, ImageId, PreflightError,
    PreflightReport, PublishError,
};
pub use docker::DockerError;
pub use executor::{DockerExecutor, RealExecutor};
