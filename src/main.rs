//! amqframe - AMQP 0-9-1 frame inspection tool
//!
//! Decodes raw frame captures and builds frames for testing brokers and
//! clients.

mod commands;
mod error;

use amqframe_protocol::{FrameLimits, FrameType, DEFAULT_FRAME_MAX};
use bytes::Bytes;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use commands::OutputFormat;
use error::CliError;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "amqframe")]
#[command(about = "Inspect and build AMQP 0-9-1 frames")]
#[command(version)]
struct Cli {
    /// Negotiated frame-max in bytes, including the 8 bytes of framing (0 = unlimited)
    #[arg(long, global = true, env = "AMQFRAME_FRAME_MAX", default_value_t = DEFAULT_FRAME_MAX)]
    frame_max: u32,

    /// Output format for decoded frames
    #[arg(long, global = true, env = "AMQFRAME_FORMAT", value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a capture of raw frames
    Decode {
        /// Capture file, or - for stdin
        #[arg(default_value = "-")]
        input: String,

        /// Treat input as hex text instead of raw bytes
        #[arg(long)]
        hex: bool,
    },

    /// Encode a single frame and print it as hex
    Encode {
        /// Frame type
        #[arg(short = 't', long = "type", value_enum)]
        frame_type: FrameKind,

        /// Channel number
        #[arg(short, long, default_value = "0")]
        channel: u16,

        /// Payload as hex
        #[arg(short, long)]
        payload: Option<String>,
    },

    /// Split a message body into body frames and print each as hex
    Split {
        /// Channel number
        #[arg(short, long)]
        channel: u16,

        /// File holding the message body
        input: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FrameKind {
    Method,
    Header,
    Body,
    Heartbeat,
}

impl From<FrameKind> for FrameType {
    fn from(kind: FrameKind) -> Self {
        match kind {
            FrameKind::Method => FrameType::Method,
            FrameKind::Header => FrameType::Header,
            FrameKind::Body => FrameType::Body,
            FrameKind::Heartbeat => FrameType::Heartbeat,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let limits = FrameLimits::from_frame_max(cli.frame_max);
    tracing::debug!(
        "frame-max {} (max payload {} bytes)",
        cli.frame_max,
        limits.max_payload_size
    );

    if let Err(e) = run(cli.command, limits, cli.format).await {
        eprintln!("{}: {}", "Error".red(), e);
        std::process::exit(1);
    }

    Ok(())
}

async fn run(command: Commands, limits: FrameLimits, format: OutputFormat) -> Result<(), CliError> {
    match command {
        Commands::Decode { input, hex } => {
            let reader = commands::open_input(&input, hex).await?;
            let report = commands::decode_stream(reader, limits).await?;
            let output = commands::format_report(&report, format)?;
            if !output.is_empty() {
                println!("{}", output);
            }
            tracing::info!(
                "Decoded {} frames ({} trailing bytes)",
                report.frames.len(),
                report.trailing
            );
        }
        Commands::Encode {
            frame_type,
            channel,
            payload,
        } => {
            let hex = commands::encode_frame(frame_type.into(), channel, payload.as_deref(), limits)?;
            println!("{}", hex);
        }
        Commands::Split { channel, input } => {
            let body = tokio::fs::read(&input)
                .await
                .map_err(|e| CliError::Input(input.clone(), e))?;
            tracing::debug!("Splitting {} byte body from {}", body.len(), input.display());

            for frame in commands::split_content(channel, Bytes::from(body), limits)? {
                println!("{}", frame);
            }
        }
    }

    Ok(())
}
