use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use pokerboard::config::Config;
use pokerboard::mail::{ChannelQueue, LogMailer, Mailer, SmtpMailer};
use pokerboard::{build_app, cli, db};

/// Pokerboard accounts and invitations service
#[derive(Parser)]
#[command(name = "pokerboard", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,

    /// Create a user account directly in the database
    CreateUser {
        #[arg(long)]
        email: String,
        #[arg(long)]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
        /// Password for the new account
        #[arg(long, env = "POKERBOARD_PASSWORD")]
        password: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    let pool = db::init_pool(&config.database_url).await?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(pool, config).await,
        Command::CreateUser {
            email,
            first_name,
            last_name,
            password,
        } => cli::create_user(&pool, &email, &first_name, &last_name, &password).await,
    }
}

async fn serve(pool: sqlx::SqlitePool, config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let mailer: Arc<dyn Mailer> = match &config.smtp {
        Some(smtp) => Arc::new(SmtpMailer::new(smtp)?),
        None => {
            tracing::warn!("SMTP_HOST not set; emails will only be logged");
            Arc::new(LogMailer)
        }
    };
    let queue = Arc::new(ChannelQueue::spawn(mailer, config.mail_queue_capacity));

    let addr = config.bind_addr;
    let app = build_app(pool, config, queue).await?;
    let listener = TcpListener::bind(addr).await?;

    tracing::info!("listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
