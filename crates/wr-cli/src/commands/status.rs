//! Status command implementation

use anyhow::Result;

use crate::api::RelayClient;
use crate::output::{format_status, print_error};

/// Execute the status command
pub async fn status_command(client: &RelayClient, json: bool) -> Result<()> {
    let status = match client.status().await {
        Ok(s) => s,
        Err(e) => {
            print_error(&format!("Failed to get relay status: {:#}", e));
            print_error("Is the relay running? Try: wa-relay serve");
            return Err(e);
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("{}", format_status(client.base_url(), &status));
    }

    Ok(())
}
