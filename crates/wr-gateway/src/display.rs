//! Terminal output for the operator
//!
//! Pairing codes, QR codes and lifecycle banners are meant for the person
//! running the daemon, so they go to the terminal directly rather than
//! through the log.

use crossterm::style::{
    Attribute, Color, Print, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor,
};
use qrcode::render::unicode::Dense1x2;
use qrcode::QrCode;

fn print_line(prefix: &str, color: Color, msg: &str) {
    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(color),
        Print(prefix),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print a success message in green with a checkmark prefix
pub fn print_success(msg: &str) {
    print_line("✔ ", Color::Green, msg);
}

/// Print an error message in red with an X prefix
pub fn print_error(msg: &str) {
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

/// Print an informational message in cyan
pub fn print_info(msg: &str) {
    print_line("ℹ ", Color::Cyan, msg);
}

/// Show a pairing code and where to enter it
pub fn print_pairing_code(code: &str) {
    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetBackgroundColor(Color::Green),
        SetForegroundColor(Color::Black),
        Print("Your Pairing Code:"),
        ResetColor,
        Print(" "),
        SetAttribute(Attribute::Bold),
        Print(code),
        SetAttribute(Attribute::Reset),
        Print("\n"),
        SetForegroundColor(Color::Yellow),
        Print("Enter this code in WhatsApp: Settings > Linked Devices > Link a Device.\n"),
        ResetColor
    );
}

/// Render a QR payload for the terminal
pub fn render_qr(payload: &str) -> Result<String, qrcode::types::QrError> {
    let code = QrCode::new(payload.as_bytes())?;
    Ok(code
        .render::<Dense1x2>()
        .dark_color(Dense1x2::Light)
        .light_color(Dense1x2::Dark)
        .quiet_zone(true)
        .build())
}

/// Show a QR code to scan from the phone
pub fn print_qr(payload: &str) {
    match render_qr(payload) {
        Ok(rendered) => {
            print_info("Scan this QR code in WhatsApp: Settings > Linked Devices > Link a Device.");
            println!("{}", rendered);
        }
        Err(e) => tracing::warn!("Failed to render QR code: {}", e),
    }
}
