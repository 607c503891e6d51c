mod commands;

use carousel_sync_core::MediaType;
use clap::{CommandFactory, Parser, ValueEnum};
use clap_complete::{Shell, generate};
use std::io;
use std::net::IpAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "carousel-sync")]
#[command(version, about = "Video carousel with master/slave slide sync", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Write media.toml for a directory of videos
    Init {
        /// Path to media directory
        path: PathBuf,

        /// Media type to assign to every detected video
        #[arg(long, value_enum, default_value = "album")]
        media_type: MediaKind,

        /// Page title
        #[arg(long)]
        title: Option<String>,
    },

    /// Validate media.toml
    Validate {
        /// Path to media directory
        path: PathBuf,
    },

    /// Serve the carousel and relay sync messages
    Serve {
        /// Path to media directory
        path: PathBuf,

        /// Port to serve on
        #[arg(short, long, default_value = "8080")]
        port: u16,

        /// Address to bind
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: IpAddr,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum MediaKind {
    Album,
    Phone,
}

impl From<MediaKind> for MediaType {
    fn from(kind: MediaKind) -> Self {
        match kind {
            MediaKind::Album => MediaType::Album,
            MediaKind::Phone => MediaType::Phone,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new("carousel_sync=info,carousel_sync_core=info,tower_http=info")
            }),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Init {
            path,
            media_type,
            title,
        } => commands::init::run(path, media_type.into(), title).await,
        Command::Validate { path } => commands::validate::run(path).await,
        Command::Serve { path, port, bind } => commands::serve::run(path, bind, port).await,
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "carousel-sync", &mut io::stdout());
            Ok(())
        }
    }
}
