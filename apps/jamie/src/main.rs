// SPDX-FileCopyrightText: © 2025 Jamie Contributors
//
// SPDX-License-Identifier: MPL-2.0

mod cli;
mod config;
mod logging;
mod server;
mod telemetry;

use clap::Parser;

#[tokio::main]
async fn main() {
    #[allow(clippy::expect_used)]
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("failed to install rustls crypto provider");

    let cli = cli::Cli::parse();
    cli::handle_command(&cli, |log_config, telemetry_config| logging::init_logging(log_config, telemetry_config))
        .await;
}
