//! Warden CLI - Command line access to the identity service.

use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use http::{HeaderMap, Uri};
use serde::Serialize;
use warden_auth::{client_error_problem, RequestInfo};
use warden_client::{ClientConfig, ClientError, IdentityClient};

// ============================================================================
// CLI Structure
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "warden")]
#[command(about = "Warden CLI - Authenticate and validate sessions against the identity service")]
#[command(version)]
struct Cli {
    /// Identity service address
    #[arg(long, default_value = "localhost:50051", env = "WARDEN_IDENTITY_ADDR")]
    addr: String,

    /// Authority override sent to the identity service
    #[arg(long, env = "WARDEN_IDENTITY_AUTHORITY")]
    authority: Option<String>,

    /// Tenant slug used for authentication
    #[arg(long, env = "WARDEN_TENANT")]
    tenant: Option<String>,

    /// Per-call deadline in milliseconds
    #[arg(long, env = "WARDEN_REQUEST_TIMEOUT_MS")]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Authenticate with email and password
    Login {
        /// Account email
        #[arg(long)]
        email: String,
        /// Account password (or read from stdin if not provided)
        #[arg(long)]
        password: Option<String>,
    },
    /// Exchange an external provider token for a session
    Provider {
        /// Provider token
        token: String,
    },
    /// Validate a session token and print its user
    Validate {
        /// Session token
        token: String,
    },
}

impl Commands {
    fn method(&self) -> &'static str {
        match self {
            Self::Login { .. } | Self::Provider { .. } => "Authenticate",
            Self::Validate { .. } => "ValidateSession",
        }
    }
}

/// Outcome of a command: either printable output or a remote failure.
enum Outcome {
    Done(String),
    Rejected(ClientError),
}

// ============================================================================
// Command Handlers
// ============================================================================

fn render<T: Serialize>(value: &T) -> Result<Outcome> {
    Ok(Outcome::Done(serde_json::to_string_pretty(value)?))
}

async fn cmd_login(
    client: &IdentityClient,
    tenant: &str,
    email: &str,
    password: Option<String>,
) -> Result<Outcome> {
    let password = match password {
        Some(p) => p,
        None => {
            eprint!("Password: ");
            io::stderr().flush()?;
            let mut line = String::new();
            io::stdin().lock().read_line(&mut line)?;
            line.trim_end_matches(['\r', '\n']).to_string()
        },
    };

    if password.is_empty() {
        bail!("Password cannot be empty");
    }

    match client.authenticate_with_credentials(tenant, email, &password).await {
        Ok(session) => render(&session),
        Err(e) => Ok(Outcome::Rejected(e)),
    }
}

async fn cmd_provider(client: &IdentityClient, tenant: &str, token: &str) -> Result<Outcome> {
    match client.authenticate_with_provider_token(tenant, token).await {
        Ok(session) => render(&session),
        Err(e) => Ok(Outcome::Rejected(e)),
    }
}

async fn cmd_validate(client: &IdentityClient, token: &str) -> Result<Outcome> {
    match client.validate_session(token).await {
        Ok(user) => render(&user),
        Err(e) => Ok(Outcome::Rejected(e)),
    }
}

/// Describes the failed call the way an HTTP caller would see it.
fn print_problem(config: &ClientConfig, method: &str, error: &ClientError) -> Result<()> {
    let endpoint = config.endpoint_uri().unwrap_or_else(|_| "http://localhost".to_string());
    let uri: Uri = format!(
        "{}/warden.identity.v1.IdentityService/{}",
        endpoint.trim_end_matches('/'),
        method
    )
    .parse()
    .context("Failed to build problem instance")?;

    let problem = client_error_problem(&RequestInfo::new(&uri, &HeaderMap::new()), error);
    eprintln!("{}", serde_json::to_string_pretty(&problem)?);
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = ClientConfig::new(cli.addr.clone());
    if let Some(authority) = &cli.authority {
        config = config.with_authority(authority.clone());
    }
    if let Some(ms) = cli.timeout_ms {
        config = config.with_request_timeout(Duration::from_millis(ms));
    }

    let client = IdentityClient::connect(config.clone())
        .await
        .context("Failed to create identity client")?;
    let tenant = cli.tenant.as_deref().unwrap_or_default();
    let method = cli.command.method();

    let outcome = match cli.command {
        Commands::Login { email, password } => cmd_login(&client, tenant, &email, password).await,
        Commands::Provider { token } => cmd_provider(&client, tenant, &token).await,
        Commands::Validate { token } => cmd_validate(&client, &token).await,
    };
    client.close().await;

    match outcome? {
        Outcome::Done(output) => {
            println!("{}", output);
            Ok(ExitCode::SUCCESS)
        },
        Outcome::Rejected(error) => {
            print_problem(&config, method, &error)?;
            Ok(ExitCode::FAILURE)
        },
    }
}
