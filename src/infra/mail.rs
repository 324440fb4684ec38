//! SMTP delivery for outgoing mail, with a log-only fallback.

use std::sync::Arc;

use async_trait::async_trait;
use lettre::message::{Mailbox, Message, header};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use tracing::{info, warn};

use crate::application::mail::{MailError, Mailer, OutgoingMail};
use crate::config::MailSettings;

use super::error::InfraError;

#[derive(Clone)]
pub struct SmtpMailer {
    transport: Option<Arc<AsyncSmtpTransport<Tokio1Executor>>>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Without an SMTP host the mailer only logs what it would have sent.
    pub fn new(settings: &MailSettings) -> Result<Self, InfraError> {
        let transport = match settings.smtp.as_ref() {
            None => {
                warn!(
                    target = "quire::infra::mail",
                    "SMTP host not configured; outgoing mail will only be logged"
                );
                None
            }
            Some(smtp) => {
                let builder = if smtp.starttls {
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host)
                } else {
                    AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp.host)
                }
                .map_err(|err| {
                    InfraError::configuration(format!("failed to configure SMTP transport: {err}"))
                })?
                .port(smtp.port);

                let builder = match (&smtp.username, &smtp.password) {
                    (Some(username), Some(password)) => {
                        builder.credentials(Credentials::new(username.clone(), password.clone()))
                    }
                    _ => builder,
                };

                Some(Arc::new(builder.build()))
            }
        };

        Ok(Self {
            transport,
            from: settings.from.clone(),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.transport.is_some()
    }

    fn build_message(&self, mail: &OutgoingMail) -> Result<Message, MailError> {
        let to = mail
            .to
            .parse::<Mailbox>()
            .map_err(|err| MailError::InvalidAddress {
                address: mail.to.clone(),
                reason: err.to_string(),
            })?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(mail.subject.as_str())
            .header(header::ContentType::TEXT_PLAIN)
            .body(mail.body.clone())
            .map_err(|err| MailError::Build(err.to_string()))
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        let message = self.build_message(&mail)?;

        match &self.transport {
            Some(transport) => {
                transport
                    .send(message)
                    .await
                    .map_err(|err| MailError::Transport(err.to_string()))?;
                info!(
                    target = "quire::infra::mail",
                    subject = %mail.subject,
                    "email sent"
                );
            }
            None => {
                info!(
                    target = "quire::infra::mail",
                    subject = %mail.subject,
                    recipient = %mail.to,
                    body = %mail.body,
                    "mail transport disabled; skipping delivery"
                );
            }
        }

        Ok(())
    }
}
