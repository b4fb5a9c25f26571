use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = vizmapd::Args::parse();

	vizmapd::run(args).await
}
