// SPDX-License-Identifier: GPL-3.0-only

use barcode_scanner::config::{ConfigStore, Settings, TOKEN_ENV};
use barcode_scanner::constants::app_info;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "barcode-scanner")]
#[command(about = "Scan EAN/UPC barcodes with a webcam and look them up on ean-search.org")]
#[command(version = app_info::version())]
#[command(subcommand_required = false)]
struct Cli {
    /// Settings file (default: ~/.config/ean-search.org/BarcodeScanner.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// API token for this run, overrides the stored one
    #[arg(long, global = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the interactive scanner in the terminal (default)
    Terminal,

    /// List available cameras
    List,

    /// Scan barcodes and print the results line by line
    Scan {
        /// Camera index to use (from 'barcode-scanner list'), default is the last used camera
        #[arg(short, long)]
        camera: Option<usize>,

        /// Show the video in a separate window
        #[arg(short, long)]
        preview: bool,

        /// Render the video into an existing X11 window (id in decimal or 0x hex)
        #[arg(long, conflicts_with = "preview", value_parser = cli::parse_window_handle)]
        window: Option<usize>,
    },

    /// Look up a single product code
    Lookup {
        /// EAN-13 or UPC-A code
        code: String,
    },

    /// Show, set or clear the stored API token
    Token {
        /// New token
        value: Option<String>,

        /// Remove the stored token
        #[arg(long, conflicts_with = "value")]
        clear: bool,
    },

    /// Show version and copyright information
    About,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let terminal_mode = matches!(cli.command, None | Some(Commands::Terminal));

    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=barcode_scanner=debug, RUST_LOG=info
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true);
    if terminal_mode && std::env::var_os("RUST_LOG").is_none() {
        // Log lines would tear the alternate screen
        subscriber.with_writer(std::io::sink).init();
    } else {
        subscriber.with_writer(std::io::stderr).init();
    }

    let store = cli
        .config
        .map(ConfigStore::new)
        .unwrap_or_else(ConfigStore::default_location);
    let token_override = cli
        .token
        .or_else(|| std::env::var(TOKEN_ENV).ok().filter(|t| !t.trim().is_empty()));
    let mut settings = Settings::load(store, token_override);

    let result = match cli.command {
        None | Some(Commands::Terminal) => barcode_scanner::terminal::run(&mut settings),
        Some(Commands::List) => cli::list_cameras(&settings),
        Some(Commands::Scan {
            camera,
            preview,
            window,
        }) => cli::scan(&mut settings, camera, cli::scan_surface(preview, window)),
        Some(Commands::Lookup { code }) => cli::lookup(&settings, &code),
        Some(Commands::Token { value, clear }) => cli::token(&mut settings, value, clear),
        Some(Commands::About) => {
            println!("{}", app_info::about_text());
            Ok(())
        }
    };

    if let Err(e) = settings.save() {
        eprintln!("Failed to save settings: {}", e);
    }

    result
}
