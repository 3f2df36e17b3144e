use bucketctl_server::{AccessKeyPair, BucketService, Store};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(
    name = "bucketctl-server",
    about = "bucketctl bucket protocol v1 server"
)]
struct Cli {
    /// Port to listen on.
    #[arg(long, default_value_t = 8390)]
    port: u16,

    /// Directory holding the bucket registry.
    #[arg(long, default_value = "./bucketctl-server-data")]
    data_dir: PathBuf,

    /// Only accept requests signed with this access key.
    #[arg(long, env = "BUCKETCTL_SERVER_ACCESS_KEY", requires = "secret_key")]
    access_key: Option<String>,

    /// Secret key paired with --access-key.
    #[arg(
        long,
        env = "BUCKETCTL_SERVER_SECRET_KEY",
        requires = "access_key",
        hide_env_values = true
    )]
    secret_key: Option<String>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("BUCKETCTL_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = std::fs::create_dir_all(&cli.data_dir) {
        error!("failed to create data directory: {e}");
        return ExitCode::FAILURE;
    }
    let store = match Store::open(cli.data_dir.clone()) {
        Ok(s) => s,
        Err(e) => {
            error!("failed to open registry: {e}");
            return ExitCode::FAILURE;
        }
    };

    let auth = match (cli.access_key, cli.secret_key) {
        (Some(ak), Some(sk)) => Some(AccessKeyPair::new(ak, sk)),
        _ => None,
    };

    let addr = format!("0.0.0.0:{}", cli.port);
    info!("starting bucketctl-server on {addr}");
    info!("data directory: {}", cli.data_dir.display());
    if auth.is_some() {
        info!("credential check enabled");
    }

    let service = Arc::new(BucketService::new(store, auth));
    match bucketctl_server::run_server(&service, &addr) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("server error: {e}");
            ExitCode::FAILURE
        }
    }
}
