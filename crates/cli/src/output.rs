//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use scaler_lib::ScaleAction;
use serde::Serialize;

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print any serialisable value as pretty JSON
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
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

/// Format a utilisation percentage
pub fn format_percent(value: f64) -> String {
    format!("{:.1}%", value)
}

/// Format millicores as human-readable string
pub fn format_cpu(millicores: f64) -> String {
    if millicores >= 1000.0 {
        format!("{:.1}", millicores / 1000.0)
    } else {
        format!("{:.0}m", millicores)
    }
}

/// Format confidence as percentage
pub fn format_confidence(confidence: f32) -> String {
    format!("{:.0}%", confidence * 100.0)
}

/// Color utilisation against the stress threshold
pub fn color_cpu(value: f64, stress_threshold: f64) -> String {
    let formatted = format_percent(value);
    if value > stress_threshold {
        formatted.red().to_string()
    } else if value > stress_threshold * 0.75 {
        formatted.yellow().to_string()
    } else {
        formatted.green().to_string()
    }
}

/// Color a scale action
pub fn color_action(action: ScaleAction) -> String {
    match action {
        ScaleAction::ScaleUp => action.as_str().yellow().bold().to_string(),
        ScaleAction::ScaleDown => action.as_str().blue().bold().to_string(),
        ScaleAction::Stable => action.as_str().green().to_string(),
    }
}

/// Color confidence based on value
pub fn color_confidence(confidence: f32) -> String {
    let formatted = format_confidence(confidence);
    if confidence >= 0.8 {
        formatted.green().to_string()
    } else if confidence >= 0.5 {
        formatted.yellow().to_string()
    } else {
        formatted.red().to_string()
    }
}

/// Yes/no flag for tables
pub fn format_flag(flag: bool) -> String {
    if flag {
        "yes".to_string()
    } else {
        "no".to_string()
    }
}
