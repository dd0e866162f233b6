use waterbot_core::RegistryAuth;
use waterbot_pipeline::{REGISTRY_ADDRESS, stages};

use super::{Options, load_config, ready_engine};

/// Test, build, and push. Nothing is pushed unless the tests pass.
pub async fn publish(options: &Options) -> anyhow::Result<()> {
    let source = options.source_tree()?;
    let config = load_config()?;
    let auth = RegistryAuth::load(&config.registry)?;
    if auth.is_none() {
        eprintln!("No registry credentials set; pushing with the engine's stored login.");
    }
    let engine = ready_engine(&config, options).await?;

    eprintln!("Testing, building, and pushing to {REGISTRY_ADDRESS}...");
    let reference = stages::publish(&engine, &source, auth.as_ref()).await?;

    eprintln!();
    eprintln!("Published:");
    println!("{reference}");

    Ok(())
}
