//! Send command implementations

use anyhow::Result;

use crate::api::{RelayClient, SendResponse};
use crate::output::{failure_reason, format_ids, print_error, print_success, print_warning};

/// Send one or more text messages
pub async fn send_command(client: &RelayClient, to: &str, messages: &[String]) -> Result<()> {
    let response = client.send(to, messages).await?;

    if response.success {
        let ids = response.ids.unwrap_or_default();
        print_success(&format!("Sent {} message(s) to {}", ids.len(), to));
        println!("{}", format_ids(&ids));
        return Ok(());
    }

    if let Some(ids) = response.ids.as_ref().filter(|ids| !ids.is_empty()) {
        print_warning(&format!(
            "Only {} of {} message(s) were sent",
            ids.len(),
            messages.len()
        ));
        println!("{}", format_ids(ids));
    }
    fail(&response)
}

/// Send an image by URL
pub async fn image_command(
    client: &RelayClient,
    to: &str,
    url: &str,
    caption: Option<&str>,
) -> Result<()> {
    let response = client.image(to, url, caption).await?;
    report_single(&response, "Image", to)
}

/// Send a document by URL
pub async fn file_command(
    client: &RelayClient,
    to: &str,
    url: &str,
    filename: Option<&str>,
) -> Result<()> {
    let response = client.file(to, url, filename).await?;
    report_single(&response, "File", to)
}

fn report_single(response: &SendResponse, kind: &str, to: &str) -> Result<()> {
    if !response.success {
        return fail(response);
    }
    print_success(&format!(
        "{} sent to {} (id: {})",
        kind,
        to,
        response.id.as_deref().unwrap_or("-")
    ));
    Ok(())
}

fn fail(response: &SendResponse) -> Result<()> {
    let reason = failure_reason(response);
    print_error(&reason);
    anyhow::bail!("Relay refused the request: {}", reason)
}
