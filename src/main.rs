use clap::Parser;
use miette::Result;
use tracing_subscriber::{fmt, EnvFilter};

use gatehouse::{seed, settings, storage, web};

#[derive(Parser, Debug)]
#[command(
    name = "gatehouse",
    version,
    about = "Group/role based access control backend"
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // logging
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    // load settings
    let settings = settings::Settings::load(&cli.config)?;
    tracing::info!(?settings, "Loaded configuration");

    // init storage (connect + migrate)
    let db = storage::init(&settings.database).await?;

    let purged = storage::cleanup_expired_sessions(&db).await?;
    if purged > 0 {
        tracing::info!(purged, "Removed expired sessions");
    }

    // baseline modules, permission grid and admin account
    seed::ensure_baseline(&db).await?;

    // start web server
    web::serve(settings, db).await?;
    Ok(())
}
