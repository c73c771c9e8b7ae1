use clap::{Parser, Subcommand};

pub mod config;
pub mod run;
pub mod version;

#[derive(Parser)]
#[command(name = "portico")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Client portal service for proposal approvals", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the portal service
    Run {
        /// Path to config file (default: ~/.local/share/portico/config.toml)
        #[arg(long)]
        config: Option<String>,

        /// Listen address override (default: from config)
        #[arg(long)]
        bind: Option<String>,

        /// Path to file containing the hex master secret
        /// (default: PORTICO_MASTER_SECRET env var, then master-secret.txt)
        #[arg(long)]
        secret_file: Option<String>,
    },

    /// Display version information
    Version,
}

pub async fn execute(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Run {
            config,
            bind,
            secret_file,
        } => run::execute(config, bind, secret_file).await,
        Commands::Version => {
            version::execute();
            Ok(())
        }
    }
}
