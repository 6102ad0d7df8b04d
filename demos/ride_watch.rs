//! Watch ride updates in real time.
//!
//! Connects with a token, prints every status change, notice and list
//! refresh until Ctrl+C.
//!
//! Usage:
//!   cargo run --example ride_watch -- --token <TOKEN> [--base-url URL] [--debug] [--no-wait]

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{Args, ConsoleView, init_logging, wait_for_exit};
use ride_sync::{Client, RefreshTarget, Result};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.debug);

    let mut builder = Client::builder()
        .view(Arc::new(ConsoleView))
        .heartbeat(Duration::from_secs(25));
    if let Some(base_url) = &args.base_url {
        builder = builder.base_url(base_url.as_str());
    }
    if let Some(token) = &args.token {
        builder = builder.credential(token.as_str());
    }
    let client = builder.build()?;

    println!("[1] Connecting to {}", client.options().base_url);
    client.connect()?;

    println!("[2] Resolving role");
    match client.resolve_role().await {
        Ok(Some(role)) => println!("        role: {role}"),
        Ok(None) => println!("        role: unknown"),
        Err(e) => println!("        role check failed: {}", e.user_message()),
    }

    println!("[3] Loading my rides");
    if let Err(e) = client.refresh(RefreshTarget::MyRides).await {
        println!("        {}", e.user_message());
    }

    wait_for_exit(args.no_wait).await;

    client.shutdown();
    println!("Done");
    Ok(())
}
