use clap::Parser;
use tracing_subscriber::EnvFilter;

use nav_admin::cli::{dispatch, Cli};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("nav_admin=info,tower_http=info")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = dispatch(cli).await {
        tracing::error!("{:#}", e);
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
