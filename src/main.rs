use clap::{Parser, Subcommand};
use rse::config::Config;
use rse::{crawler, logging, search};

/// A small general web search engine
#[derive(Parser)]
#[command(name = "rse")]
#[command(about = "A small general web search engine: crawl the web, then search it")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the crawler until interrupted
    Crawl {
        #[command(flatten)]
        config: Config,
    },

    /// Serve the HTTP search API
    Serve {
        #[command(flatten)]
        config: Config,
    },
}

#[tokio::main]
async fn main() {
    logging::init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => {
            // --help and --version also arrive through this path; only real
            // configuration errors exit non-zero.
            let _ = error.print();
            std::process::exit(if error.use_stderr() { 1 } else { 0 });
        }
    };

    let result = match cli.command {
        Commands::Crawl { config } => crawler::run(config).await,
        Commands::Serve { config } => search::api::serve(config).await,
    };

    if let Err(error) = result {
        tracing::error!(%error, "fatal error");
        std::process::exit(1);
    }
}
