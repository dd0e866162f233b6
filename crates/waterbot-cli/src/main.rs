mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "waterbot", about = "Build, test, and publish the water-bot container image")]
#[command(version)]
struct Cli {
    /// Source tree to build (default: current directory)
    #[arg(long, global = true, value_name = "DIR")]
    source: Option<PathBuf>,

    /// Stream docker build progress instead of capturing it
    #[arg(long, global = true)]
    progress: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Echo a string from the Raspberry Pi OS image
    ContainerEcho {
        /// Text to echo
        string: String,
    },
    /// Build the Python environment image
    BuildEnv,
    /// Build the runnable application image (tests are not run)
    Build,
    /// Run the test suite and print its output
    Test,
    /// Test, build, and push the image to the registry
    Publish,
    /// Print the Dockerfile a stage evaluates to
    Render {
        #[arg(value_enum)]
        stage: Stage,
    },
    /// Check Docker setup and readiness
    Doctor,
}

#[derive(Clone, Copy, ValueEnum)]
enum Stage {
    Environment,
    Build,
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let options = commands::Options {
        source: cli.source,
        progress: cli.progress,
    };

    match cli.command {
        Commands::ContainerEcho { string } => commands::container_echo(&options, &string).await?,
        Commands::BuildEnv => commands::build_env(&options).await?,
        Commands::Build => commands::build(&options).await?,
        Commands::Test => commands::test(&options).await?,
        Commands::Publish => commands::publish(&options).await?,
        Commands::Render { stage } => match stage {
            Stage::Environment => commands::render_environment(&options)?,
            Stage::Build => commands::render_build(&options)?,
        },
        Commands::Doctor => commands::doctor().await?,
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Dropping `run` kills any docker child process it spawned and removes
    // a container it left running.
    let result = tokio::select! {
        result = run(cli) => result,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            Err(anyhow::anyhow!("cancelled"))
        }
    };

    if let Err(e) = &result {
        commands::report_command_output(e);
    }
    result
}
