//! Binary entry point that loads `.env`, sets up logging and runs the
//! XBee configurator command line.

use clap::Parser;

use xbee_config::cli::{self, Cli};

/// Parses arguments and runs the requested command, exiting non-zero on
/// failure.
fn main() {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("xbee_config=info"),
    )
    .init();

    if let Err(err) = cli::run(Cli::parse()) {
        log::error!("{:#}", err);
        std::process::exit(1);
    }
}
