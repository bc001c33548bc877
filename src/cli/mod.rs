use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "vidscribe",
    about = "Transcribe remotely hosted videos with an OpenAI-compatible speech-to-text endpoint",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP transcription service
    Serve {
        /// Listen port (overrides config and the PORT variable)
        #[arg(short, long)]
        port: Option<u16>,

        /// Bind address (overrides config)
        #[arg(long)]
        host: Option<String>,
    },

    /// Transcribe a single video reference and print the transcript
    Transcribe {
        /// Video URL to transcribe
        #[arg(value_name = "URL")]
        url: String,

        /// Write the transcript to a file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Show the resolved configuration
    Config,
}
