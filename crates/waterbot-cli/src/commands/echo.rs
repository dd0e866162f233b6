use waterbot_pipeline::stages;

use super::{Options, load_config, ready_engine};

pub async fn container_echo(options: &Options, message: &str) -> anyhow::Result<()> {
    let config = load_config()?;
    let engine = ready_engine(&config, options).await?;

    let output = engine.stdout(&stages::container_echo(message)).await?;
    print!("{output}");

    Ok(())
}
