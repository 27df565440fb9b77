//! Bulletin profile listing for `bof sources`.

use anyhow::Result;

use crate::config::Config;

pub fn list_sources(config: &Config) -> Result<()> {
    println!(
        "{:<10} {:<42} {:>11} {:<10}",
        "BULLETIN", "BASE URL", "ISSUES/YEAR", "FEED"
    );
    for (id, profile) in &config.bulletins {
        let feed = if profile.feed_url.is_some() {
            "yes"
        } else {
            "no"
        };
        println!(
            "{:<10} {:<42} {:>11} {:<10}",
            id, profile.base_url, profile.issues_per_year, feed
        );
    }
    if config.bulletins.is_empty() {
        println!("(no bulletins configured)");
    }
    Ok(())
}
