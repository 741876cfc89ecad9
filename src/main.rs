/// Purge Hub server binary
use purge_hub::{
    config::LoggingConfig, context::AppContext, error::HubResult, jobs, server, ServerConfig,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> HubResult<()> {
    let config = ServerConfig::from_env()?;

    init_logging(&config.logging);

    print_banner();

    let ctx = Arc::new(AppContext::new(config).await?);

    // Start background jobs
    let scheduler = Arc::new(jobs::JobScheduler::new(Arc::clone(&ctx)));
    scheduler.start();

    server::serve((*ctx).clone()).await?;

    Ok(())
}

fn init_logging(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| logging.level.as_str().into());

    tracing_subscriber::registry()
        .with(filter)
        .with(logging.json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!logging.json).then(tracing_subscriber::fmt::layer))
        .init();
}

fn print_banner() {
    println!(
        r#"
    ____                          __  __      __
   / __ \__  ___________ ____    / / / /_  __/ /_
  / /_/ / / / / ___/ __ `/ _ \  / /_/ / / / / __ \
 / ____/ /_/ / /  / /_/ /  __/ / __  / /_/ / /_/ /
/_/    \__,_/_/   \__, /\___/ /_/ /_/\__,_/_.___/
                 /____/
        Moderation service v{}
        "#,
        env!("CARGO_PKG_VERSION")
    );
}
