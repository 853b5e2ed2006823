//! Output formatting for the CLI.

use clap::ValueEnum;

/// Output format.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Print a success message.
pub fn print_success(message: &str, format: &OutputFormat) {
    match format {
        OutputFormat::Text => println!("{}", message),
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({ "status": "success", "message": message })
            );
        }
    }
}

/// Print an error message.
pub fn print_error(message: &str, format: &OutputFormat) {
    match format {
        OutputFormat::Text => eprintln!("Error: {}", message),
        OutputFormat::Json => {
            eprintln!(
                "{}",
                serde_json::json!({ "status": "error", "message": message })
            );
        }
    }
}

/// Render a detail row in the selected format.
fn row_line(label: &str, value: &str, format: &OutputFormat) -> String {
    match format {
        OutputFormat::Text => format!("  {:<16} {}", format!("{}:", label), value),
        OutputFormat::Json => {
            serde_json::json!({ "label": label, "value": value }).to_string()
        }
    }
}

/// Print a detail row.
pub fn print_row(label: &str, value: &str, format: &OutputFormat) {
    println!("{}", row_line(label, value, format));
}
