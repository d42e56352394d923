//! Booking confirmation emails.
//!
//! Delivery is a single attempt bounded by the SMTP timeout. The pipeline
//! treats every error from here as non-fatal.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;

use crate::config::SmtpConfig;

const IMPLICIT_TLS_PORT: u16 = 465;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("failed to build message: {0}")]
    Message(String),

    #[error("smtp delivery failed: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

impl From<lettre::error::Error> for NotificationError {
    fn from(err: lettre::error::Error) -> Self {
        Self::Message(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct BookingConfirmation {
    pub to_email: String,
    pub user_name: String,
    pub event_name: String,
    pub ticket_id: String,
    pub ticket_pdf: Vec<u8>,
    pub invoice_pdf: Vec<u8>,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_booking_confirmation(
        &self,
        confirmation: &BookingConfirmation,
    ) -> Result<(), NotificationError>;
}

#[derive(Clone)]
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(config: &SmtpConfig) -> Result<Self, NotificationError> {
        let builder = if config.port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
        };
        let transport = builder
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .timeout(Some(config.timeout))
            .build();

        Ok(Self {
            transport,
            from: Mailbox::new(Some(config.from_name.clone()), config.from_email.parse()?),
        })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send_booking_confirmation(
        &self,
        confirmation: &BookingConfirmation,
    ) -> Result<(), NotificationError> {
        let message = build_message(&self.from, confirmation)?;
        self.transport.send(message).await?;
        tracing::info!(ticket_id = %confirmation.ticket_id, "confirmation email sent");
        Ok(())
    }
}

/// Stands in for SMTP when no credentials are configured.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_booking_confirmation(
        &self,
        confirmation: &BookingConfirmation,
    ) -> Result<(), NotificationError> {
        tracing::info!(
            to = %confirmation.to_email,
            ticket_id = %confirmation.ticket_id,
            ticket_bytes = confirmation.ticket_pdf.len(),
            invoice_bytes = confirmation.invoice_pdf.len(),
            "smtp not configured, confirmation email skipped"
        );
        Ok(())
    }
}

pub(crate) fn build_message(
    from: &Mailbox,
    confirmation: &BookingConfirmation,
) -> Result<Message, NotificationError> {
    let to = Mailbox::new(
        Some(confirmation.user_name.clone()),
        confirmation.to_email.parse()?,
    );
    let pdf = ContentType::parse("application/pdf")
        .map_err(|err| NotificationError::Message(err.to_string()))?;

    let body = MultiPart::mixed()
        .singlepart(SinglePart::html(confirmation_html(confirmation)))
        .singlepart(
            Attachment::new(format!("Ticket-{}.pdf", confirmation.ticket_id))
                .body(confirmation.ticket_pdf.clone(), pdf.clone()),
        )
        .singlepart(
            Attachment::new(format!("Invoice-{}.pdf", confirmation.ticket_id))
                .body(confirmation.invoice_pdf.clone(), pdf),
        );

    Ok(Message::builder()
        .from(from.clone())
        .to(to)
        .subject(format!("Booking Confirmed: {}", confirmation.event_name))
        .multipart(body)?)
}

fn confirmation_html(confirmation: &BookingConfirmation) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
    <div style="max-width: 600px; margin: 0 auto; padding: 20px;">
        <h2 style="color: #1a365d;">Booking Confirmed!</h2>
        <p>Hi {name},</p>
        <p>Your booking for <strong>{event}</strong> is confirmed.</p>
        <p>Ticket ID: <strong>{ticket}</strong></p>
        <p>Your ticket and invoice are attached. Please present the QR code on the ticket at the venue.</p>
        <p style="color: #666; font-size: 12px; margin-top: 40px;">NagpurEvents Elite</p>
    </div>
</body>
</html>"#,
        name = escape(&confirmation.user_name),
        event = escape(&confirmation.event_name),
        ticket = escape(&confirmation.ticket_id),
    )
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
