//! Bookstore CLI - database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! bookstore-cli migrate
//!
//! # Create an admin account
//! bookstore-cli admin create -e admin@example.com -n "Admin Name" -p 'Shelf2024secret'
//!
//! # Load the sample catalog
//! bookstore-cli seed catalog -f crates/cli/seed/catalog.yaml
//!
//! # List books that need restocking
//! bookstore-cli stock low --threshold 3
//! ```
//!
//! All commands read `BOOKSTORE_DATABASE_URL` (a `.env` file is honored).

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "bookstore-cli")]
#[command(author, version, about = "Bookstore CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage admin users
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Seed the database
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
    /// Stock reports
    Stock {
        #[command(subcommand)]
        report: StockReport,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Create a new admin user
    Create {
        /// Admin email address
        #[arg(short, long)]
        email: String,

        /// Admin display name
        #[arg(short, long)]
        name: String,

        /// Initial password (at least 8 characters)
        #[arg(short, long)]
        password: String,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Load authors and books from a YAML file
    Catalog {
        /// Path to the YAML file
        #[arg(short, long, default_value = "crates/cli/seed/catalog.yaml")]
        file: String,
    },
}

#[derive(Subcommand)]
enum StockReport {
    /// Books with stock below the threshold
    Low {
        #[arg(short, long, default_value_t = 3)]
        threshold: i32,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Admin { action } => match action {
            AdminAction::Create {
                email,
                name,
                password,
            } => {
                commands::admin::create_user(&email, &name, &password).await?;
            }
        },
        Commands::Seed { target } => match target {
            SeedTarget::Catalog { file } => {
                commands::seed::catalog(&file).await?;
            }
        },
        Commands::Stock { report } => match report {
            StockReport::Low { threshold } => {
                commands::stock::low(threshold).await?;
            }
        },
    }
    Ok(())
}
