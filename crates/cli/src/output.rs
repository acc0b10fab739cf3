//! Output formatting utilities

use autoscaler_lib::models::Action;
use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a table from a list of items
pub fn print_table<T: Tabled>(items: &[T]) {
    if items.is_empty() {
        println!("{}", "No items found".yellow());
        return;
    }
    let table = Table::new(items).with(Style::rounded()).to_string();
    println!("{}", table);
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format utilization as a percentage
pub fn format_utilization(percent: f64) -> String {
    format!("{:.2}%", percent)
}

/// Color utilization by distance from the target
pub fn color_utilization(percent: f64, target: f64) -> String {
    let formatted = format_utilization(percent);
    let distance = (percent - target).abs();
    if distance <= 10.0 {
        formatted.green().to_string()
    } else if distance <= 25.0 {
        formatted.yellow().to_string()
    } else {
        formatted.red().to_string()
    }
}

/// Color reward; closer to zero is better
pub fn color_reward(reward: f64) -> String {
    let formatted = format!("{:.2}", reward);
    if reward >= -10.0 {
        formatted.green().to_string()
    } else if reward >= -25.0 {
        formatted.yellow().to_string()
    } else {
        formatted.red().to_string()
    }
}

/// Color an action by direction
pub fn color_action(action: Action) -> String {
    let label = action.to_string();
    match action {
        Action::ScaleUp => label.cyan().to_string(),
        Action::Hold => label.normal().to_string(),
        Action::ScaleDown => label.magenta().to_string(),
    }
}

/// Format a unix timestamp as local wall time
pub fn format_timestamp(timestamp: i64) -> String {
    chrono::DateTime::from_timestamp(timestamp, 0)
        .map(|dt| {
            dt.with_timezone(&chrono::Local)
                .format("%H:%M:%S")
                .to_string()
        })
        .unwrap_or_else(|| timestamp.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_utilization() {
        assert_eq!(format_utilization(62.456), "62.46%");
        assert_eq!(format_utilization(0.0), "0.00%");
    }

    #[test]
    fn test_color_helpers_keep_text() {
        colored::control::set_override(false);

        assert_eq!(color_utilization(55.0, 50.0), "55.00%");
        assert_eq!(color_reward(-11.5), "-11.50");
        assert_eq!(color_action(Action::ScaleDown), "Scale Down");
    }

    #[test]
    fn test_format_invalid_timestamp_falls_back() {
        assert_eq!(format_timestamp(i64::MAX), i64::MAX.to_string());
    }
}
