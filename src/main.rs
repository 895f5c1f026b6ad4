use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod cli;

#[derive(Parser)]
#[command(name = "netwatch")]
#[command(about = "Connectivity watchdog that keeps a server heartbeat alive", long_about = None)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to a server and keep the heartbeat running until Ctrl+C
    Run {
        /// WebSocket URL of the server (overrides config)
        #[arg(short, long)]
        url: Option<String>,
        /// host:port probed for connectivity (overrides config)
        #[arg(short, long)]
        probe: Option<String>,
        /// Initial heartbeat interval in milliseconds
        #[arg(short, long)]
        interval_ms: Option<u64>,
        /// Background clock mode: thread, task or disabled
        #[arg(short, long)]
        clock: Option<String>,
    },
    /// Run the watchdog against an in-memory server with a scripted scenario
    Demo {
        /// Scenario length in seconds
        #[arg(short, long, default_value_t = 12)]
        seconds: u64,
    },
    /// Show the effective configuration
    Config {
        /// Write the default configuration file if none exists
        #[arg(long)]
        init: bool,
    },
    /// Show version information
    Version,
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_json);

    match cli.command {
        Some(Commands::Version) | None => {
            println!("netwatch {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Run {
            url,
            probe,
            interval_ms,
            clock,
        }) => {
            cli::run::cmd_run(cli::run::RunArgs {
                url,
                probe,
                interval_ms,
                clock,
            })
            .await?;
        }
        Some(Commands::Demo { seconds }) => {
            cli::demo::cmd_demo(seconds).await?;
        }
        Some(Commands::Config { init }) => {
            cli::cmd_config(init)?;
        }
    }

    Ok(())
}
