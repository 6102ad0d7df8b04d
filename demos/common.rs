//! Shared utilities for demos.
//!
//! Provides common functionality used across all demos:
//! - Command-line argument parsing
//! - Logging initialization
//! - Graceful exit handling

#![allow(dead_code)]

// ============================================================================
// Imports
// ============================================================================

use tracing_subscriber::EnvFilter;

use ride_sync::{ConnectionStatus, Notice, RefreshTarget, Ride, RideView};

// ============================================================================
// Types
// ============================================================================

/// Command-line arguments for demos.
#[derive(Debug, Clone)]
pub struct Args {
    pub debug: bool,
    pub no_wait: bool,
    pub base_url: Option<String>,
    pub token: Option<String>,
}

impl Args {
    /// Parse command-line arguments.
    ///
    /// The token falls back to `$RIDE_SYNC_TOKEN`.
    pub fn parse() -> Self {
        let args: Vec<String> = std::env::args().collect();
        let value_of = |flag: &str| {
            args.iter()
                .position(|a| a == flag)
                .and_then(|i| args.get(i + 1))
                .cloned()
        };

        Self {
            debug: args.iter().any(|a| a == "--debug"),
            no_wait: args.iter().any(|a| a == "--no-wait"),
            base_url: value_of("--base-url"),
            token: value_of("--token").or_else(|| std::env::var("RIDE_SYNC_TOKEN").ok()),
        }
    }
}

/// View that prints to stdout.
#[derive(Debug, Default)]
pub struct ConsoleView;

impl RideView for ConsoleView {
    fn status(&self, status: ConnectionStatus) {
        println!("[Status] {status}");
    }

    fn notify(&self, notice: Notice) {
        let tag = if notice.is_error() { "Error" } else { "Info" };
        println!("[{tag}] {}", notice.text());
    }

    fn show_rides(&self, target: RefreshTarget, rides: &[Ride]) {
        println!("[List] {target}: {} ride(s)", rides.len());
        for ride in rides {
            println!(
                "        #{} {} -> {} ({:?})",
                ride.id, ride.pickup, ride.dropoff, ride.status
            );
        }
    }
}

// ============================================================================
// Functions
// ============================================================================

/// Initialize tracing/logging.
pub fn init_logging(debug: bool) {
    let filter = if debug {
        "ride_sync=debug"
    } else {
        "ride_sync=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}

/// Wait for Ctrl+C or skip if `--no-wait` flag is set.
pub async fn wait_for_exit(no_wait: bool) {
    if no_wait {
        println!("[--no-wait] Skipping wait");
        return;
    }

    println!("Press Ctrl+C to exit...");
    tokio::signal::ctrl_c().await.ok();
}
