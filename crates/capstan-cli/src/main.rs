use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "capstan",
    about = "Capstan — ordered, halt-on-failure image rollouts",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Path to capstan.toml
    #[arg(short, long, default_value = "capstan.toml", global = true)]
    config: String,

    /// kubeconfig context to use
    #[arg(long, global = true)]
    kube_context: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Roll a new image across the configured plan.
    ///
    /// Runs the pre-flight gate, then updates each workload in plan
    /// order, halting on the first failure. Exit code 0 only if every
    /// workload converged.
    Run {
        /// Image to roll out: a bare tag ("v123"), a digest, or a full
        /// reference ("ghcr.io/example/app:v123")
        #[arg(short, long)]
        image: String,
        /// Output format: text or json
        #[arg(long, default_value = "text")]
        format: String,
        /// Skip the pre-flight gate (operator re-runs only)
        #[arg(long)]
        skip_preflight: bool,
    },
    /// Resolve and print the rollout plan without touching anything
    Plan {
        /// Output format: text or json
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Run only the pre-flight gate for an image
    Preflight {
        #[arg(short, long)]
        image: String,
    },
    /// Scaffold a capstan.toml
    Init {
        #[arg(short, long, default_value = ".")]
        path: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,capstan=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let code = match dispatch(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            2
        }
    };
    std::process::exit(code);
}

async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.command {
        Commands::Run {
            image,
            format,
            skip_preflight,
        } => commands::run::run(&cli.config, &image, &format, skip_preflight, cli.kube_context)
            .await,
        Commands::Plan { format } => {
            commands::plan::show(&cli.config, &format, cli.kube_context).await
        }
        Commands::Preflight { image } => {
            commands::preflight::check(&cli.config, &image, cli.kube_context).await
        }
        Commands::Init { path } => commands::init::init(&path),
    }
}
