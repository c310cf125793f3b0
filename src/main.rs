//! # RustChain weekly node/miner scan
//! Maintainer ops tool for the weekly payout and upgrade outreach round:
//! scans registered nodes to determine weekly node-host payout candidates,
//! scans the miners visible through public node APIs, and flags expected
//! miners that are missing (likely an outdated client, offline, or pointed at
//! the wrong node).
//!
//! The default scan source is the public primary node, `https://50.28.86.131`.
//!
//! # Run the scan
//! ```bash
//! cargo run -- config.json
//! ```
//! The argument is optional and defaults to `./config.json`. All scan settings
//! (seed node, extra node URLs, expected miner IDs, output paths) live in that
//! file; see `config.json` in the repository root for a template.
mod classify;
mod config;
mod fetch;
mod miners;
mod registry;
mod report;
mod scan;

use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.json".to_string());

    let configs = config::Config::load(&config_path).unwrap_or_else(|err| {
        eprintln!("Failed to load config: {}", err);
        std::process::exit(1);
    });

    let expected_miners = configs.expected_miner_ids().unwrap_or_else(|err| {
        eprintln!("Failed to load expected miners: {}", err);
        std::process::exit(1);
    });

    let fetcher = fetch::HttpFetcher::new(
        configs.http_timeout_sec,
        &configs.admin_key,
        configs.verify_tls,
    )
    .unwrap_or_else(|err| {
        eprintln!("Failed to set up http client: {}", err);
        std::process::exit(1);
    });

    let out_json = configs.out_json.clone();
    let out_md = configs.out_md.clone();

    let scanner = scan::Scanner::new(Arc::new(fetcher), Arc::new(configs));
    let scan_report = scanner.build_report(&expected_miners).await;
    let markdown = report::render_markdown(&scan_report);

    if !out_json.is_empty() {
        let json = serde_json::to_string_pretty(&scan_report)?;
        std::fs::write(&out_json, json + "\n")?;
        println!("Wrote JSON report to {}", out_json);
    }
    if !out_md.is_empty() {
        std::fs::write(&out_md, format!("{}\n", markdown))?;
        println!("Wrote markdown report to {}", out_md);
    } else {
        println!("{}", markdown);
    }

    Ok(())
}
