use clap::Parser;
use playerparent_onboarding::{
    config::{Config, StoreKind},
    http::{self, App},
    onboarding::OnboardingService,
    session::ForwardedIdentity,
    store,
};
use tracing_subscriber::EnvFilter;

/// Serve the player/parent onboarding API.
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// Listen address, e.g. 0.0.0.0:8790
    #[arg(long, env = "ONBOARD_HTTP_ADDR")]
    addr: Option<String>,
    /// Use the in-memory store instead of SurrealDB
    #[arg(long)]
    memory: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_ansi(false)
        .init();

    let args = Args::parse();
    let mut cfg = Config::load()?;
    if let Some(addr) = args.addr {
        cfg.http_addr = addr;
    }
    if args.memory {
        cfg.store = StoreKind::Memory;
    }
    if cfg.bearer_token.is_none() {
        tracing::warn!("no bearer token configured; the API is open to anything that can reach it");
    }

    let store = store::open(&cfg).await?;
    let service = OnboardingService::from_config(store, &cfg);
    let sessions = ForwardedIdentity::new(&cfg.identity_header)?;
    let app = App::new(service, Box::new(sessions), &cfg);
    http::serve(app, &cfg).await
}
