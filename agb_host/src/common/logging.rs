//! Utilities for configuring logging
use std::io::Write;
use std::sync::Once;

use colored::Colorize;
use log::Level;

static ONCE_INIT: Once = Once::new();

fn init_with_filter(default_filter: &str, is_test: bool) {
    let filter_config = std::env::var("AGB_LOG").unwrap_or(default_filter.to_string());
    env_logger::builder()
        .parse_filters(&filter_config)
        .is_test(is_test)
        .format(|buf, record| {
            let tag = match record.level() {
                Level::Error => "E".red().bold(),
                Level::Warn => "W".yellow().bold(),
                Level::Info => "I".blue().bold(),
                Level::Debug => "D".blue(),
                Level::Trace => "T".dimmed(),
            };
            writeln!(buf, "{} {}", tag, record.args())
        })
        .init();
}

/// Configures the process-wide logger. Filters are read from the `AGB_LOG`
/// environment variable using the env_logger syntax.
pub fn init() {
    ONCE_INIT.call_once(|| init_with_filter("info", false));
}

pub fn test_init() {
    ONCE_INIT.call_once(|| init_with_filter("warn", true));
}
