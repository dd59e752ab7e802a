//! Ticket desk - conference registration, ticket verification and participant lookup
//!
//! Command-line client for the registrar HTTP API.
//!
//! Module structure:
//! - `domain/` - Registrar records, ticket identity, QR payload
//! - `io/` - Registrar API client, static assets, mock registrar
//! - `services/` - Registration, verification, directory workflows
//! - `infra/` - Config, logging, request metrics

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use ticket_desk::domain::{render_ticket, Participant};
use ticket_desk::infra::{logging, Config};
use ticket_desk::io::{ApiClient, AssetKind, RegistrarApi};
use ticket_desk::VERSION;
use ticket_desk::services::{
    Avatar, DirectoryReader, RegistrationForm, RegistrationSubmitter, TicketVerifier,
    VerificationOutcome,
};
use tracing::info;

/// Ticket desk - conference registration client
#[derive(Parser, Debug)]
#[command(name = "ticket-desk", version = VERSION, about)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Registrar base URL (overrides api.base_url)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register an attendee and print the ticket
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        /// GitHub username
        #[arg(long)]
        github: String,
        /// Avatar image (PNG, JPEG, GIF or WebP)
        #[arg(long)]
        avatar: Option<PathBuf>,
        /// Download the QR asset into the download directory
        #[arg(long)]
        save_qr: bool,
    },
    /// Verify a ticket id (or the JSON read from its QR code)
    Verify { input: String },
    /// List participants with registration stats
    Participants {
        /// Case-insensitive filter on name, email and handle
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Show registration counters
    Stats,
    /// Download an avatar or QR asset
    Asset {
        kind: AssetArg,
        filename: String,
        /// Output file (default: <download_dir>/<filename>)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Check registrar health
    Health,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum AssetArg {
    Avatar,
    Qr,
}

impl From<AssetArg> for AssetKind {
    fn from(arg: AssetArg) -> Self {
        match arg {
            AssetArg::Avatar => AssetKind::Avatar,
            AssetArg::Qr => AssetKind::QrCode,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    logging::init_stderr(args.log_json);

    let config_path = Config::resolve_config_path(args.config.as_deref());
    let mut config = Config::load_from_path(&config_path);
    if let Some(base_url) = &args.base_url {
        config = config.with_base_url(base_url.clone());
    }

    info!(
        version = %VERSION,
        config_file = %config.config_file(),
        base_url = %config.base_url(),
        timeout_ms = %config.timeout_ms(),
        "config_loaded"
    );

    let client = Arc::new(ApiClient::from_config(&config).context("Failed to create registrar client")?);
    let api: Arc<dyn RegistrarApi> = client.clone();

    let code = match args.command {
        Command::Register { name, email, github, avatar, save_qr } => {
            let form = RegistrationForm::new(name, email, github);
            register(&client, api, &config, form, avatar.as_deref(), save_qr).await?
        }
        Command::Verify { input } => verify(api, &input).await,
        Command::Participants { search } => participants(api, search.as_deref()).await,
        Command::Stats => stats(api).await,
        Command::Asset { kind, filename, out } => {
            asset(&client, &config, kind.into(), &filename, out.as_deref()).await
        }
        Command::Health => health(&client).await,
    };

    client.metrics().report().log();
    Ok(code)
}

async fn register(
    client: &ApiClient,
    api: Arc<dyn RegistrarApi>,
    config: &Config,
    mut form: RegistrationForm,
    avatar: Option<&Path>,
    save_qr: bool,
) -> anyhow::Result<ExitCode> {
    if let Some(path) = avatar {
        match Avatar::from_path(path, config.max_avatar_bytes()).await {
            Ok(avatar) => form = form.with_avatar(avatar),
            Err(e) => {
                eprintln!("{}", e);
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    let participant = match RegistrationSubmitter::new(api).submit(&form).await {
        Ok(participant) => participant,
        Err(e) => {
            eprintln!("{}", e.user_message());
            return Ok(ExitCode::FAILURE);
        }
    };

    let qr_url = participant
        .qr_code_filename
        .as_deref()
        .and_then(|f| client.asset_url(AssetKind::QrCode, f).ok())
        .map(|u| u.to_string());
    println!("{}", render_ticket(&participant, config.event(), qr_url.as_deref()));

    if save_qr {
        if let Some(filename) = &participant.qr_code_filename {
            let path = client
                .save_asset(AssetKind::QrCode, filename, Path::new(config.download_dir()))
                .await
                .context("Failed to save QR asset")?;
            println!("QR saved to {}", path.display());
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn verify(api: Arc<dyn RegistrarApi>, input: &str) -> ExitCode {
    let outcome = TicketVerifier::new(api).verify(input).await;
    match &outcome {
        VerificationOutcome::Valid { participant } => {
            println!("✓ VALID TICKET");
            print_participant(participant);
            ExitCode::SUCCESS
        }
        VerificationOutcome::NotFound { ticket, message } => {
            println!("✗ INVALID TICKET {}", ticket.marked());
            println!("{}", message);
            ExitCode::FAILURE
        }
        VerificationOutcome::Malformed { .. } => {
            println!("✗ INVALID TICKET");
            println!("{}", outcome.message().unwrap_or_default());
            ExitCode::FAILURE
        }
        // Distinct code: the registrar could not be asked
        VerificationOutcome::Unavailable { ticket, message } => {
            println!("? UNABLE TO VERIFY {}", ticket.marked());
            println!("{}", message);
            ExitCode::from(2)
        }
    }
}

fn print_participant(participant: &Participant) {
    println!("  Name        {}", participant.full_name);
    println!("  Email       {}", participant.email);
    println!("  GitHub      {}", participant.handle());
    println!("  Ticket      #{}", participant.ticket_id);
    if let Some(date) = participant.registration_date {
        println!("  Registered  {}", date.format("%Y-%m-%d %H:%M"));
    }
}

async fn participants(api: Arc<dyn RegistrarApi>, search: Option<&str>) -> ExitCode {
    let directory = match DirectoryReader::new(api).load().await {
        Ok(directory) => directory,
        Err(e) => {
            eprintln!("{}", e.user_message());
            return ExitCode::FAILURE;
        }
    };

    println!(
        "Total participants: {}   Today: {}",
        directory.stats.total_participants, directory.stats.today_registrations
    );
    if directory.truncated {
        println!("(registrar returned a partial list)");
    }

    let rows = directory.filter(search.unwrap_or_default());
    if rows.is_empty() {
        println!("No participants found.");
        return ExitCode::SUCCESS;
    }

    println!();
    println!("{:<10} {:<24} {:<30} {:<18} {}", "TICKET", "NAME", "EMAIL", "GITHUB", "REGISTERED");
    for p in rows {
        let registered =
            p.registration_date.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default();
        println!(
            "{:<10} {:<24} {:<30} {:<18} {}",
            p.ticket_id,
            p.full_name,
            p.email,
            p.handle(),
            registered
        );
    }
    ExitCode::SUCCESS
}

async fn stats(api: Arc<dyn RegistrarApi>) -> ExitCode {
    match api.stats().await {
        Ok(stats) => {
            println!("Total participants   {}", stats.total_participants);
            println!("Today                {}", stats.today_registrations);
            if let Some(week) = stats.week_registrations {
                println!("This week            {}", week);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", e.user_message());
            ExitCode::FAILURE
        }
    }
}

async fn asset(
    client: &ApiClient,
    config: &Config,
    kind: AssetKind,
    filename: &str,
    out: Option<&Path>,
) -> ExitCode {
    let result = match out {
        Some(path) => match client.fetch_asset(kind, filename).await {
            Ok(bytes) => ticket_desk::io::assets::write_asset(path, &bytes)
                .await
                .map(|_| path.to_path_buf()),
            Err(e) => Err(e),
        },
        None => client.save_asset(kind, filename, Path::new(config.download_dir())).await,
    };

    match result {
        Ok(path) => {
            println!("{}", path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn health(client: &ApiClient) -> ExitCode {
    match client.health().await {
        Ok(status) if status.is_healthy() => {
            println!(
                "healthy ({} {})",
                client.base_url(),
                status.version.as_deref().unwrap_or("unknown version")
            );
            ExitCode::SUCCESS
        }
        Ok(status) => {
            println!("unhealthy: {}", status.status);
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
