use playerparent_onboarding::{config::Config, router::Router, server::OnboardingMcp};
use rmcp::{ServiceExt, transport::stdio};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the protocol, so logs go to stderr (RUST_LOG, default warn)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("warn".parse()?))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cfg = Config::load()?;
    let server = OnboardingMcp::new(cfg).await?;
    let router = Router(server);

    let svc = router.serve(stdio()).await?;
    svc.waiting().await?;
    Ok(())
}
