use clap::Parser;
use data_bridge::cli::utils::output_error;
use data_bridge::cli::{Cli, OutputFormat};
use data_bridge::config::config;
use data_bridge::error::BackendError;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config().logging.default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let output_format = OutputFormat::from_cli(&cli);

    if let Err(e) = data_bridge::cli::run(cli).await {
        let code = e.downcast_ref::<BackendError>().map(|b| b.code);
        match std::env::var("CLI_VERBOSE").as_deref() {
            Ok("true") | Ok("1") => output_error(output_format, &format!("{e:?}"), code)?,
            _ => output_error(output_format, &e.to_string(), code)?,
        }
        std::process::exit(1);
    }

    Ok(())
}
