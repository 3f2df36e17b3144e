mod commands;

use bucketctl_core::FailurePolicy;
use clap::{Parser, Subcommand};
use commands::{GlobalOpts, EXIT_CREDENTIAL_ERROR, EXIT_FAILURE, EXIT_PLAN_ERROR};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "bucketctl",
    version,
    about = "Declarative reconciliation of tagged object-storage buckets"
)]
struct Cli {
    /// Bucket service endpoint (overrides the provider config file).
    #[arg(long, env = "BUCKETCTL_ENDPOINT", global = true)]
    endpoint: Option<String>,

    /// Provider config file [default: ~/.config/bucketctl/provider.json].
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Managed state file [default: .bucketctl/state.json next to the plan].
    #[arg(long, global = true)]
    state: Option<PathBuf>,

    /// Keep going after a bucket fails instead of stopping at the first failure.
    #[arg(long, default_value_t = false, global = true)]
    continue_on_error: bool,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Parse and normalize a plan without contacting the bucket service.
    Validate {
        /// Path to plan TOML file.
        #[arg(default_value = "buckets.toml")]
        plan: PathBuf,
    },
    /// Create the planned buckets, or retag them if state already exists.
    Apply {
        /// Path to plan TOML file.
        #[arg(default_value = "buckets.toml")]
        plan: PathBuf,
    },
    /// Check that every managed bucket still exists and drop the ones that don't.
    Refresh {
        /// Plan whose state to refresh.
        #[arg(default_value = "buckets.toml")]
        plan: PathBuf,
    },
    /// Delete every managed bucket.
    Destroy {
        /// Plan whose buckets to delete.
        #[arg(default_value = "buckets.toml")]
        plan: PathBuf,
    },
    /// List every bucket in the account, managed or not.
    List,
    /// Print the saved managed state.
    Show {
        /// Plan whose state to show.
        #[arg(default_value = "buckets.toml")]
        plan: PathBuf,
    },
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("BUCKETCTL_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let opts = GlobalOpts {
        endpoint: cli.endpoint,
        config: cli.config,
        state: cli.state,
        policy: if cli.continue_on_error {
            FailurePolicy::ContinueOnError
        } else {
            FailurePolicy::FailFast
        },
        json: cli.json,
    };

    let result = match cli.command {
        Commands::Validate { plan } => commands::validate::run(&plan, opts.json),
        Commands::Apply { plan } => commands::apply::run(&opts, &plan),
        Commands::Refresh { plan } => commands::refresh::run(&opts, &plan),
        Commands::Destroy { plan } => commands::destroy::run(&opts, &plan),
        Commands::List => commands::list::run(&opts),
        Commands::Show { plan } => commands::show::run(&opts, &plan),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            let code = if msg.starts_with("plan error:") {
                EXIT_PLAN_ERROR
            } else if msg.starts_with("credential error:") {
                EXIT_CREDENTIAL_ERROR
            } else {
                EXIT_FAILURE
            };
            ExitCode::from(code)
        }
    }
}
