//! Output formatting utilities for the CLI
//!
//! Tables for status displays, summaries of send results, and coloured
//! status lines.

use tabled::{settings::Style, Table, Tabled};

use crate::api::{SendResponse, StatusResponse};

/// Format the relay status as a table
pub fn format_status(base_url: &str, status: &StatusResponse) -> String {
    #[derive(Tabled)]
    struct StatusRow {
        #[tabled(rename = "RELAY")]
        relay: String,
        #[tabled(rename = "SESSION")]
        session: String,
        #[tabled(rename = "ACCOUNT")]
        account: String,
        #[tabled(rename = "NAME")]
        name: String,
    }

    let user = status.user.as_ref();
    let row = StatusRow {
        relay: base_url.to_string(),
        session: if status.connected { "Connected" } else { "Disconnected" }.to_string(),
        account: user
            .map(|u| u.id.user().to_string())
            .unwrap_or_else(|| "-".to_string()),
        name: user
            .and_then(|u| u.name.clone())
            .unwrap_or_else(|| "-".to_string()),
    };

    Table::new([row]).with(Style::rounded()).to_string()
}

/// Reason a send was refused, as reported by the relay
pub fn failure_reason(response: &SendResponse) -> String {
    response
        .msg
        .clone()
        .or_else(|| response.error.clone())
        .unwrap_or_else(|| "Unknown error".to_string())
}

/// Format the ids of delivered messages, one per line
pub fn format_ids(ids: &[String]) -> String {
    ids.iter()
        .enumerate()
        .map(|(i, id)| format!("  {}. {}", i + 1, id))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Print a success message in green with a checkmark prefix
pub fn print_success(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Green),
        Print("✓ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an error message in red with an X prefix to stderr
pub fn print_error(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Red),
        Print("✗ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print a warning message in yellow to stderr
pub fn print_warning(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Yellow),
        Print("⚠ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an informational message in cyan
pub fn print_info(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Cyan),
        Print("ℹ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}
