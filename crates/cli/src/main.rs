use clap::Parser;
use hub_cli::{cli::Cli, logging};
use tracing::error;

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	if let Err(err) = hub_cli::run(cli).await {
		error!(target = "hub", error = %format!("{err:#}"), "hub failed");
		std::process::exit(1);
	}
}
