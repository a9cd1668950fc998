use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use gradebook::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).init();

    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = Config::load(&args)?;
    info!(
        target: "startup",
        "gradebook starting: RUST_LOG='{}', bind={}, http_port={}, db_root='{}'",
        rust_log, config.bind, config.http_port, config.db_root.display()
    );

    gradebook::server::run(config).await
}
