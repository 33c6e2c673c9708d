mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use todomvc_harness::HarnessConfig;

#[derive(Parser)]
#[command(name = "todomvc-tools")]
#[command(about = "Run the TodoMVC polling suite against the in-memory app")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: nearest todomvc-harness.toml, else built-in defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the TodoMVC suite
    Test {
        /// Only run cases whose name contains this
        #[arg(short, long)]
        filter: Option<String>,

        /// Print every assertion, not only failures
        #[arg(short, long)]
        verbose: bool,
    },

    /// Inject a flag element after a delay and wait for it
    Wait {
        /// When to add the flag element (ms)
        #[arg(long, default_value = "25")]
        inject_after_ms: u64,

        /// Poll interval (ms), overrides the config
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Give up after this long (ms), overrides the config
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// Print the effective configuration
    Config,
}

fn main() -> Result<()> {
    // RUST_LOG overrides the warn default
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Warn)
        .parse_default_env()
        .init();

    let cli = Cli::parse();
    let cwd = std::env::current_dir()?;
    let (config, source) = HarnessConfig::load(cli.config.as_deref(), &cwd)?;
    log::debug!("configuration from {:?}", source);

    match cli.command {
        Commands::Test { filter, verbose } => {
            let opts = commands::test::TestOptions { filter, verbose };
            let passed = commands::test::run(config, opts)?;
            if !passed {
                std::process::exit(1);
            }
        }

        Commands::Wait {
            inject_after_ms,
            interval_ms,
            timeout_ms,
        } => {
            let opts = commands::wait::WaitCommand {
                inject_after_ms,
                interval_ms,
                timeout_ms,
            };
            let resolved = commands::wait::run(&config, opts)?;
            if !resolved {
                std::process::exit(1);
            }
        }

        Commands::Config => {
            commands::config::run(&config, &source)?;
        }
    }

    Ok(())
}
