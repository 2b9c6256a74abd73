use anyhow::Result;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use std::time::Duration;
use tracing::{info, warn};

use crate::config::EmailConfig;

/// Delivers end-of-run reports to whoever maintains the import
pub trait Notifier: Send + Sync {
    fn notify(&self, subject: &str, body: &str) -> Result<()>;
}

/// Writes reports to the log only
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, subject: &str, body: &str) -> Result<()> {
        info!("{}\n{}", subject, body);
        Ok(())
    }
}

/// Sends reports over SMTP. Without a configuration it does nothing.
pub struct EmailNotifier {
    config: Option<EmailConfig>,
}

impl EmailNotifier {
    pub fn new(config: Option<EmailConfig>) -> Self {
        Self { config }
    }

    /// Configure from the `SMTP_*`, `FROM_EMAIL` and `TO_EMAIL` variables,
    /// falling back to a disabled notifier when any are missing
    pub fn from_env() -> Self {
        match EmailConfig::from_env() {
            Ok(config) => Self::new(Some(config)),
            Err(e) => {
                info!("Email notifications disabled: {}", e);
                Self::new(None)
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.is_some()
    }
}

impl Notifier for EmailNotifier {
    fn notify(&self, subject: &str, body: &str) -> Result<()> {
        let Some(config) = &self.config else {
            return Ok(());
        };

        let email = Message::builder()
            .from(config.from_address.parse()?)
            .to(config.to_address.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())?;

        let creds = Credentials::new(config.smtp_username.clone(), config.smtp_password.clone());

        let mailer = SmtpTransport::relay(&config.smtp_server)?
            .port(config.smtp_port)
            .credentials(creds)
            .timeout(Some(Duration::from_secs(30)))
            .build();

        match mailer.send(&email) {
            Ok(_) => {
                info!("Email report sent to {}", config.to_address);
                Ok(())
            }
            Err(e) => {
                warn!("Failed to send email report: {}", e);
                Err(e.into())
            }
        }
    }
}
