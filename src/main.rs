mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use signet::server;
use signet_core::Config;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG if set, otherwise pick defaults based on the
    // verbose flag.
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "signet=trace,signet_db=trace,signet_core=debug,tower_http=debug".to_string()
        } else {
            "signet=debug,signet_db=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(server::start(host, port, cli.config.as_deref()))
        }
        Commands::Validate { config } => {
            let path = config.or(cli.config);
            let mut loaded = Config::load_or_default(path.as_deref());
            loaded.apply_env();
            let warnings = loaded.validate();
            if warnings.is_empty() {
                println!("config OK");
            } else {
                for warning in &warnings {
                    println!("warning: {warning}");
                }
            }
            Ok(())
        }
        Commands::Version => {
            println!("signet {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
