use dotenvy::dotenv;

use backend_base::bootstrap::{config::Config, logging, server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let cfg = Config::from_env()?;
    logging::init(&cfg.logger);

    if let Err(e) = server::run(cfg).await {
        tracing::error!(error = ?e, "backend_failed");
        return Err(e);
    }
    Ok(())
}
