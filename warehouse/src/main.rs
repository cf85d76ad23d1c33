use clap::{Arg, Command};
use std::process;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let matches = Command::new("Warehouse Pipeline Manager")
        .version("1.0")
        .about("Builds the songplays star schema from raw JSON sources")
        .subcommand(
            Command::new("run")
                .about("Run the warehouse pipeline")
                .arg(
                    Arg::new("config")
                        .short('c')
                        .long("config")
                        .value_name("FILE")
                        .help("Sets a custom config file"),
                ),
        )
        .get_matches();

    match matches.subcommand() {
        Some(("run", run_matches)) => {
            let config_path = run_matches
                .get_one::<String>("config")
                .map(|s| s.as_str())
                .unwrap_or("config/warehouse.toml");

            if let Err(e) = warehouse::run_warehouse_pipeline(config_path).await {
                eprintln!("Warehouse pipeline error: {}", e);
                process::exit(1);
            }
        }

        _ => {
            eprintln!("Please specify a valid subcommand");
            process::exit(1);
        }
    }
}
