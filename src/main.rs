use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use broker_git_sync::handlers::{self, TokenArgs};
use broker_git_sync::logger;
use broker_git_sync::operation::OperationKind;
use broker_git_sync::settings::BrokerConfig;

#[derive(Parser)]
#[command(name = "broker-git-sync")]
#[command(about = "Git-backed workspace sync and operation tracking for an on-demand service broker", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (default: config.toml in the config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clone the configured repository, prepare branches and submodules, then clean up
    Check {
        /// Keep the workspace on disk afterwards
        #[arg(long)]
        keep: bool,
    },

    /// Issue an operation token for a provisioning request
    Token {
        #[arg(value_enum)]
        kind: TokenKind,

        /// Service instance id
        #[arg(long)]
        instance_id: String,

        /// Service definition id
        #[arg(long, default_value = "")]
        service_id: String,

        /// Plan id
        #[arg(long, default_value = "")]
        plan_id: String,

        #[arg(long, default_value = "")]
        org_guid: String,

        #[arg(long, default_value = "")]
        space_guid: String,
    },

    /// Report the completion status of an operation token
    Poll {
        /// Token printed by the token command
        token: String,
    },

    /// Show or initialize the configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum TokenKind {
    Create,
    Delete,
}

impl From<TokenKind> for OperationKind {
    fn from(kind: TokenKind) -> Self {
        match kind {
            TokenKind::Create => OperationKind::Create,
            TokenKind::Delete => OperationKind::Delete,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    logger::init_logger().context("Failed to initialize logging")?;

    let config = match &cli.config {
        Some(path) => BrokerConfig::load_from(path)?,
        None => BrokerConfig::load()?,
    };

    match cli.command {
        Commands::Check { keep } => {
            handlers::handle_check(&config, keep)?;
        }
        Commands::Token {
            kind,
            instance_id,
            service_id,
            plan_id,
            org_guid,
            space_guid,
        } => {
            handlers::handle_token(
                &config,
                TokenArgs {
                    kind: kind.into(),
                    instance_id,
                    service_id,
                    plan_id,
                    organization_guid: org_guid,
                    space_guid,
                },
            )?;
        }
        Commands::Poll { token } => {
            handlers::handle_poll(&config, &token)?;
        }
        Commands::Config { show } => {
            handlers::handle_config(&config, cli.config.as_deref(), show)?;
        }
    }

    Ok(())
}
