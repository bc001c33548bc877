use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vidscribe::cli::{Cli, Commands};
use vidscribe::config::Config;
use vidscribe::pipeline::PipelineController;
use vidscribe::{server, utils};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vidscribe=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = Config::load()?;

    match cli.command {
        Commands::Serve { port, host } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(host) = host {
                config.server.host = host;
            }

            warn_on_missing_dependencies(&config).await;

            let pipeline = PipelineController::new(&config)?;
            server::serve(&config, pipeline).await?;
        }
        Commands::Transcribe { url, output } => {
            warn_on_missing_dependencies(&config).await;

            let pipeline = PipelineController::new(&config)?;

            let spinner = ProgressBar::new_spinner();
            spinner.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} [{elapsed_precise}] {msg}")
                    .unwrap(),
            );
            spinner.enable_steady_tick(std::time::Duration::from_millis(120));
            spinner.set_message("Transcribing...");

            let outcome = pipeline.run(&url).await;
            spinner.finish_and_clear();

            match outcome {
                Ok(result) => match output {
                    Some(path) => {
                        fs_err::write(&path, &result.text)?;
                        println!("Transcript saved to: {}", path.display());
                    }
                    None => println!("{}", result.text),
                },
                Err(error) => {
                    anyhow::bail!("transcription failed [{}]: {}", error.code(), error);
                }
            }
        }
        Commands::Config => {
            config.display();
        }
    }

    Ok(())
}

/// Non-fatal check for the external tools the pipeline shells out to
async fn warn_on_missing_dependencies(config: &Config) {
    let missing = utils::check_dependencies(
        &config.app.yt_dlp_path,
        &config.app.ffmpeg_path,
        &config.app.ffprobe_path,
    )
    .await;

    if !missing.is_empty() {
        eprintln!("Dependency check warnings:");
        for dep in missing {
            eprintln!("  - {}", dep);
        }
        eprintln!("  (Continuing anyway - tools may still be reachable)");
    }
}
