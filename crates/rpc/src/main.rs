//! eKYC CLI - Main entry point

use ekyc_core::{DecisionStatus, SessionStatus};
use ekyc_rpc::commands::{self, DemoQualities};
use ekyc_rpc::{AppConfig, AppContext, ListSessionsRequest};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "ekyc")]
#[command(about = "eKYC - identity verification workflow", long_about = None)]
struct Cli {
    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Database URL (overrides config and EKYC_DATABASE_URL)
    #[arg(short, long)]
    database: Option<String>,

    /// Optional correlation ID
    #[arg(long, global = true)]
    correlation_id: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one session end to end with fixed-quality workers
    Demo {
        /// User ID (registered if missing)
        #[arg(long, default_value = "demo-user")]
        user: String,
        /// OCR quality
        #[arg(long, default_value = "0.9")]
        ocr: Decimal,
        /// Face match quality
        #[arg(long, default_value = "0.85")]
        face: Decimal,
        /// Liveness quality
        #[arg(long, default_value = "0.95")]
        liveness: Decimal,
    },

    /// Manage users
    User {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// Show the status of a session
    Status {
        /// Session ID
        session: String,
    },

    /// List sessions
    List {
        /// Filter by status (e.g. UNDER_REVIEW)
        #[arg(long)]
        status: Option<SessionStatus>,
        /// Filter by user ID
        #[arg(long)]
        user: Option<String>,
        /// Page number, starting at 1
        #[arg(long, default_value = "1")]
        page: u32,
        /// Page size (max 100)
        #[arg(long, default_value = "20")]
        size: u32,
    },

    /// Show everything recorded about a session
    Detail {
        /// Session ID
        session: String,
    },

    /// Apply an admin decision
    Decide {
        /// Session ID
        session: String,
        /// APPROVED or REJECTED
        status: DecisionStatus,
        /// Admin ID
        #[arg(long)]
        admin: String,
        /// Free-text justification
        #[arg(long, default_value = "")]
        note: String,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// Register a user
    Add {
        /// User ID
        id: String,
        /// Email address
        email: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(database) = cli.database {
        config.database_url = database;
    }

    let ctx = AppContext::new(config).await?;
    let correlation_id = cli
        .correlation_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    match cli.command {
        Commands::Demo {
            user,
            ocr,
            face,
            liveness,
        } => {
            let qualities = DemoQualities { ocr, face, liveness };
            commands::demo(&ctx, &user, qualities, &correlation_id).await?;
        }

        Commands::User { command } => match command {
            UserCommands::Add { id, email } => {
                commands::add_user(&ctx, &id, &email).await?;
            }
        },

        Commands::Status { session } => {
            commands::status(&ctx, &session, &correlation_id).await?;
        }

        Commands::List {
            status,
            user,
            page,
            size,
        } => {
            let request = ListSessionsRequest {
                status,
                user_id: user,
                page,
                size,
            };
            commands::list(&ctx, request, &correlation_id).await?;
        }

        Commands::Detail { session } => {
            commands::detail(&ctx, &session, &correlation_id).await?;
        }

        Commands::Decide {
            session,
            status,
            admin,
            note,
        } => {
            commands::decide(&ctx, &session, status, &admin, &note, &correlation_id).await?;
        }
    }

    ctx.shutdown();
    Ok(())
}
