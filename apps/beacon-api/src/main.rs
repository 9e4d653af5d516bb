use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = beacon_api::Args::parse();

	beacon_api::run(args).await
}
