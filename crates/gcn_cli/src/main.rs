//! GCN CLI - Command-line client for the CMS REST API.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod client;
mod commands;
mod http;

#[derive(Parser)]
#[command(name = "gcn")]
#[command(about = "Command-line client for the CMS REST API", long_about = None)]
#[command(version)]
struct Cli {
    /// Directory containing gcn.toml
    #[arg(long, global = true, default_value = ".")]
    config: PathBuf,
    /// Session id from a previous login
    #[arg(long, global = true, env = "GCN_SID")]
    sid: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in with user name and password
    Login {
        /// Login name
        user: String,
        /// Password
        password: String,
    },
    /// End the current session
    Logout,
    /// Log in through single sign-on
    Sso,
    /// Show the logged-in user
    Me,
    /// Load an object and print it
    Load {
        /// Object type (node, folder, page, file, image, template)
        kind: String,
        /// Object id
        id: String,
        /// Channel to load in (0 = none)
        #[arg(short, long, default_value = "0")]
        channel: u32,
    },
    /// Create a channel-local copy of an inherited object
    Localize {
        /// Object type
        kind: String,
        /// Object id
        id: String,
        /// Channel to localize in
        #[arg(short, long)]
        channel: u32,
    },
    /// Remove a channel-local copy
    Unlocalize {
        /// Object type
        kind: String,
        /// Object id
        id: String,
        /// Channel to unlocalize in
        #[arg(short, long)]
        channel: u32,
    },
    /// Render a page preview
    Preview {
        /// Page id
        page: u64,
        /// Channel to render in (0 = none)
        #[arg(short, long, default_value = "0")]
        channel: u32,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Write a default gcn.toml
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration
    Show,
}

fn main() -> Result<()> {
    // Initialize tracing subscriber
    // Respects RUST_LOG environment variable (e.g., RUST_LOG=gcn_core=debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let sid = cli.sid.as_deref();

    match cli.command {
        Commands::Login { user, password } => {
            commands::session::login(&cli.config, &user, &password)
        }
        Commands::Logout => commands::session::logout(&cli.config, sid),
        Commands::Sso => commands::session::sso(&cli.config),
        Commands::Me => commands::session::me(&cli.config, sid),
        Commands::Load { kind, id, channel } => {
            commands::object::load(&cli.config, sid, &kind, &id, channel)
        }
        Commands::Localize { kind, id, channel } => {
            commands::object::localize(&cli.config, sid, &kind, &id, channel)
        }
        Commands::Unlocalize { kind, id, channel } => {
            commands::object::unlocalize(&cli.config, sid, &kind, &id, channel)
        }
        Commands::Preview { page, channel } => {
            commands::preview::run(&cli.config, sid, page, channel)
        }
        Commands::Config { command } => match command {
            ConfigCommands::Init { force } => commands::config::init(&cli.config, force),
            ConfigCommands::Show => commands::config::show(&cli.config),
        },
    }
}
