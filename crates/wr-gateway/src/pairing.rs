//! Pairing code linking
//!
//! When the stored credentials are not registered and pairing mode is
//! selected, the account is linked by entering a code on the phone instead of
//! scanning a QR code:
//! 1. The first time an unregistered session starts, a phone number is taken
//!    from the config, typed in on the terminal, or taken from the owner list
//! 2. Everything but digits is stripped and the result must be a valid
//!    international number
//! 3. Shortly after the session starts, a code is requested from the
//!    transport and shown in groups of four

use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;

use wr_core::config::PairingConfig;
use wr_core::traits::Transport;
use wr_protocol::digits_only;

use crate::display;

/// Pairing setup errors. All of them stop startup.
#[derive(Error, Debug)]
pub enum PairingError {
    /// Mobile registration has no pairing-code flow
    #[error("Cannot use pairing code with mobile API")]
    MobileUnsupported,

    /// Number is not a valid international number
    #[error("Invalid phone number '{0}'. Please use full international format.")]
    InvalidNumber(String),

    /// No number configured and none could be asked for
    #[error("No phone number available for pairing")]
    NoNumber,

    /// Reading the number from the terminal failed
    #[error("Failed to read phone number: {0}")]
    Prompt(#[from] std::io::Error),
}

/// A validated number to pair with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingRequest {
    /// Number as entered
    pub raw: String,
    /// Digits only, as sent to the transport
    pub digits: String,
}

impl PairingRequest {
    /// Normalize and validate a phone number
    pub fn parse(raw: &str) -> Result<Self, PairingError> {
        let digits = digits_only(raw);
        if digits.is_empty() || !is_valid_number(&digits) {
            return Err(PairingError::InvalidNumber(raw.trim().to_string()));
        }
        Ok(Self {
            raw: raw.to_string(),
            digits,
        })
    }
}

fn is_valid_number(digits: &str) -> bool {
    match phonenumber::parse(None, format!("+{}", digits)) {
        Ok(number) => phonenumber::is_valid(&number),
        Err(_) => false,
    }
}

/// Where the pairing number comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberSource {
    /// Ask on the terminal
    Prompt,
    /// Non-interactive fallback
    Fallback,
}

/// Pick the source of the number when none is configured
pub fn number_source() -> NumberSource {
    if std::io::stdin().is_terminal() {
        NumberSource::Prompt
    } else {
        NumberSource::Fallback
    }
}

/// Resolve and validate the number to pair with.
///
/// A configured number wins. Otherwise `prompt` is asked on a terminal; with
/// no terminal the configured owner number, then the first owner entry, is used.
pub fn resolve_request(
    config: &PairingConfig,
    owners: &[String],
    source: NumberSource,
    prompt: impl FnOnce() -> std::io::Result<String>,
) -> Result<PairingRequest, PairingError> {
    if config.mobile {
        return Err(PairingError::MobileUnsupported);
    }

    let raw = match &config.phone_number {
        Some(number) => number.clone(),
        None => match source {
            NumberSource::Prompt => prompt()?,
            NumberSource::Fallback => config
                .owner_number
                .clone()
                .or_else(|| owners.first().cloned())
                .ok_or(PairingError::NoNumber)?,
        },
    };

    PairingRequest::parse(&raw)
}

/// Ask for the number on the terminal
pub fn prompt_phone_number() -> std::io::Result<String> {
    use std::io::{self, Write};

    print!("Please type your WhatsApp number (without + or spaces): ");
    io::stdout().flush()?;

    let mut number = String::new();
    io::stdin().read_line(&mut number)?;
    Ok(number.trim().to_string())
}

/// Split a code into hyphen-separated groups of four characters
pub fn format_code(code: &str) -> String {
    let chars: Vec<char> = code.chars().collect();
    chars
        .chunks(4)
        .map(|group| group.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join("-")
}

type Resolver = dyn Fn() -> Result<PairingRequest, PairingError> + Send + Sync;

/// Requests and shows a pairing code for a fresh session.
///
/// The number is resolved at most once, the first time an unregistered
/// session needs it. A session that starts out linked never resolves it
/// unless a logout later wipes the credentials.
#[derive(Clone)]
pub struct PairingCoordinator {
    transport: Arc<dyn Transport>,
    resolver: Arc<Resolver>,
    request: Arc<OnceCell<PairingRequest>>,
    delay: Duration,
}

impl PairingCoordinator {
    /// Coordinator for an already validated number
    pub fn new(transport: Arc<dyn Transport>, request: PairingRequest, delay: Duration) -> Self {
        let resolved = request.clone();
        let coordinator = Self::deferred(transport, move || Ok(resolved.clone()), delay);
        let _ = coordinator.request.set(request);
        coordinator
    }

    /// Coordinator that runs `resolver` the first time a number is needed.
    ///
    /// `resolver` may block on terminal input; it runs on the blocking pool.
    pub fn deferred(
        transport: Arc<dyn Transport>,
        resolver: impl Fn() -> Result<PairingRequest, PairingError> + Send + Sync + 'static,
        delay: Duration,
    ) -> Self {
        Self {
            transport,
            resolver: Arc::new(resolver),
            request: Arc::new(OnceCell::new()),
            delay,
        }
    }

    /// The number being paired, once resolved
    pub fn resolved(&self) -> Option<&PairingRequest> {
        self.request.get()
    }

    /// Resolve the number, or return the one resolved before
    pub async fn resolve(&self) -> Result<PairingRequest, PairingError> {
        let request = self
            .request
            .get_or_try_init(|| async {
                let resolver = Arc::clone(&self.resolver);
                tokio::task::spawn_blocking(move || resolver())
                    .await
                    .map_err(|e| PairingError::Prompt(std::io::Error::other(e)))?
            })
            .await?;
        Ok(request.clone())
    }

    /// Request a code after the configured delay, in the background.
    ///
    /// The task is not tied to the session; if the session ends first the
    /// request simply fails and is logged.
    pub fn spawn(&self) -> JoinHandle<Option<String>> {
        let this = self.clone();
        tokio::spawn(async move { this.run().await })
    }

    /// Wait for the delay, then request and show a code. Errors are logged
    /// and not retried.
    pub async fn run(&self) -> Option<String> {
        let request = match self.resolve().await {
            Ok(request) => request,
            Err(e) => {
                tracing::error!("No pairing number: {}", e);
                return None;
            }
        };

        tokio::time::sleep(self.delay).await;

        match self.transport.request_pairing_code(&request.digits).await {
            Ok(code) => {
                let code = format_code(&code);
                tracing::info!("Pairing code issued for {}", request.digits);
                display::print_pairing_code(&code);
                Some(code)
            }
            Err(e) => {
                tracing::error!("Failed to get pairing code: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;

    fn config(phone: Option<&str>) -> PairingConfig {
        PairingConfig {
            enabled: true,
            phone_number: phone.map(str::to_string),
            ..Default::default()
        }
    }

    fn no_prompt() -> std::io::Result<String> {
        panic!("prompt must not be used")
    }

    #[test]
    fn test_format_code() {
        assert_eq!(format_code("ABCD1234"), "ABCD-1234");
        assert_eq!(format_code("ABCDEFGHIJ"), "ABCD-EFGH-IJ");
        assert_eq!(format_code("ABC"), "ABC");
        assert_eq!(format_code(""), "");
    }

    #[test]
    fn test_parse_strips_formatting() {
        let request = PairingRequest::parse("+20 (114) 879-5529").unwrap();
        assert_eq!(request.digits, "201148795529");
    }

    #[test]
    fn test_parse_rejects_invalid() {
        assert!(matches!(
            PairingRequest::parse("12"),
            Err(PairingError::InvalidNumber(_))
        ));
        assert!(matches!(
            PairingRequest::parse("no digits"),
            Err(PairingError::InvalidNumber(_))
        ));
    }

    #[test]
    fn test_configured_number_wins() {
        let request =
            resolve_request(&config(Some("201148795529")), &[], NumberSource::Prompt, no_prompt)
                .unwrap();
        assert_eq!(request.digits, "201148795529");
    }

    #[test]
    fn test_prompt_used_on_terminal() {
        let request = resolve_request(&config(None), &[], NumberSource::Prompt, || {
            Ok("20 114 879 5529".to_string())
        })
        .unwrap();
        assert_eq!(request.digits, "201148795529");
    }

    #[test]
    fn test_fallback_to_owner_list() {
        let owners = vec!["201148795529".to_string()];
        let request =
            resolve_request(&config(None), &owners, NumberSource::Fallback, no_prompt).unwrap();
        assert_eq!(request.digits, "201148795529");

        assert!(matches!(
            resolve_request(&config(None), &[], NumberSource::Fallback, no_prompt),
            Err(PairingError::NoNumber)
        ));
    }

    #[test]
    fn test_mobile_rejected() {
        let mut config = config(Some("201148795529"));
        config.mobile = true;
        assert!(matches!(
            resolve_request(&config, &[], NumberSource::Fallback, no_prompt),
            Err(PairingError::MobileUnsupported)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_code_requested_after_delay() {
        let transport = Arc::new(MockTransport::new());
        let coordinator = PairingCoordinator::new(
            Arc::clone(&transport) as Arc<dyn Transport>,
            PairingRequest::parse("201148795529").unwrap(),
            Duration::from_secs(3),
        );

        let task = coordinator.spawn();
        tokio::time::sleep(Duration::from_millis(2900)).await;
        assert!(transport.pairing_requests().is_empty());

        assert_eq!(task.await.unwrap().as_deref(), Some("ABCD-1234"));
        assert_eq!(transport.pairing_requests(), vec!["201148795529"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deferred_resolves_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let transport = Arc::new(MockTransport::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let coordinator = PairingCoordinator::deferred(
            Arc::clone(&transport) as Arc<dyn Transport>,
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                PairingRequest::parse("201148795529")
            },
            Duration::from_secs(3),
        );
        assert!(coordinator.resolved().is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        coordinator.spawn().await.unwrap();
        coordinator.spawn().await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.resolved().unwrap().digits, "201148795529");
        assert_eq!(
            transport.pairing_requests(),
            vec!["201148795529", "201148795529"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_resolution_requests_nothing() {
        let transport = Arc::new(MockTransport::new());
        let coordinator = PairingCoordinator::deferred(
            Arc::clone(&transport) as Arc<dyn Transport>,
            || PairingRequest::parse("12"),
            Duration::from_secs(3),
        );

        assert!(coordinator.spawn().await.unwrap().is_none());
        assert!(transport.pairing_requests().is_empty());
        assert!(coordinator.resolved().is_none());
    }
}
