//! Live depth mirror - prints the top of a Binance spot book every second
//!
//! Usage:
//!   cargo run --example depth_live -- BTCUSDT
//!
//! Optional:
//!   BINANCE_SYMBOL=ETHUSDT  # Symbol when no argument is given (default: BTCUSDT)
//!   BINANCE_ENV=testnet     # Use the spot testnet (default: production)
//!   BINANCE_DEPTH=10        # Levels printed per side (default: 5)

use std::time::Duration;

use binance_depthbook::config::Environment;
use binance_depthbook::{spawn_live, Config, Error};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for debug output
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("binance_depthbook=info".parse()?),
        )
        .init();

    let symbol = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("BINANCE_SYMBOL").ok())
        .unwrap_or_else(|| "BTCUSDT".to_string());

    let env = match std::env::var("BINANCE_ENV")
        .unwrap_or_default()
        .to_lowercase()
        .as_str()
    {
        "testnet" => Environment::Testnet,
        _ => Environment::Production,
    };

    let display_depth = std::env::var("BINANCE_DEPTH")
        .ok()
        .and_then(|d| d.parse().ok())
        .unwrap_or(5);

    let config = Config::new(symbol)
        .with_environment(env)
        .with_display_depth(display_depth);

    println!("=== Binance Depth Mirror: {} ===\n", config.symbol());

    let live = spawn_live(config.clone()).await?;
    println!("Connected! (Press Ctrl+C to stop)\n");

    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    loop {
        ticker.tick().await;

        if live.is_finished() {
            break;
        }

        match live.view(config.display_depth()) {
            Ok(view) => {
                println!("{}", view);
                let summary = live.reader().with_book(|book| {
                    (book.spread(), book.mid_price(), book.num_levels())
                });
                if let Ok((spread, mid, (bids, asks))) = summary {
                    println!(
                        "spread: {:?} | mid: {:?} | levels: {} bids / {} asks\n",
                        spread.map(|s| s.normalize()),
                        mid.map(|m| m.normalize()),
                        bids,
                        asks
                    );
                }
            }
            Err(Error::BookNotReady { .. }) => println!("(syncing...)"),
            Err(e) => println!("[ERROR] {}", e),
        }
    }

    match live.join().await {
        Ok(()) | Err(Error::StreamClosed) => println!("\nDepth stream closed"),
        Err(e) => println!("\nSync stopped: {}", e),
    }

    Ok(())
}
