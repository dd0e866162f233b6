use waterbot_pipeline::stages;

use super::{Options, load_config, ready_engine};

/// Build the environment image and print its id.
pub async fn build_env(options: &Options) -> anyhow::Result<()> {
    let source = options.source_tree()?;
    let config = load_config()?;
    let engine = ready_engine(&config, options).await?;

    eprintln!("Building environment...");
    let image = engine
        .build_image(&stages::build_environment(&source))
        .await?;
    println!("{image}");

    Ok(())
}

/// Build the application image and print its id.
pub async fn build(options: &Options) -> anyhow::Result<()> {
    let source = options.source_tree()?;
    let container = stages::build(&source)?;
    let config = load_config()?;
    let engine = ready_engine(&config, options).await?;

    eprintln!("Building application image...");
    let image = engine.build_image(&container).await?;
    println!("{image}");

    Ok(())
}
