use blood_donor_files::utils::auth::create_jwt;
use clap::Parser;
use dotenvy::dotenv;
use std::env;

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Mints a bearer token for local testing against the file service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// User id placed in the `sub` claim
    #[arg(short, long)]
    user: String,

    /// Capability to grant, repeatable (e.g. -c donor.read -c donor.update)
    #[arg(short = 'c', long = "capability")]
    capabilities: Vec<String>,

    /// Lifetime in hours
    #[arg(long, default_value_t = 24)]
    hours: i64,
}

fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "issue_token=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let secret = match env::var("JWT_SECRET") {
        Ok(secret) => secret,
        Err(_) => {
            warn!("⚠️  JWT_SECRET not set, signing with the development default");
            "secret".to_string()
        }
    };

    if args.capabilities.is_empty() {
        warn!("⚠️  Token carries no capabilities; every gateway will answer 403");
    }

    let token = create_jwt(
        &args.user,
        &args.capabilities,
        &secret,
        chrono::Duration::hours(args.hours),
    )?;

    info!(
        "🔑 Issued token for {} with [{}], valid {}h",
        args.user,
        args.capabilities.join(", "),
        args.hours
    );
    println!("{}", token);
    Ok(())
}
