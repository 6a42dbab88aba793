//! Notification dispatcher: delivers the finished kit over SMTP.
//!
//! The PDF and the tribute page travel as two separate attachments; the
//! message body is fixed boilerplate. "Not configured" is reported as its own
//! outcome so callers can tell "nothing was attempted" from "attempted and
//! rejected". The dispatcher never retries; the outcome is recorded on the
//! pipeline result and surfaced no further.

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{info, warn};

use petstory_core::{Config, DeliveryOutcome};

const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Seam between the pipeline and the mail transport.
#[async_trait]
pub trait KitNotifier: Send + Sync {
    /// Send the kit to `to`. Infallible by contract: every failure mode is
    /// folded into the returned [`DeliveryOutcome`].
    async fn send_kit(
        &self,
        to: &str,
        pet_name: &str,
        pdf_bytes: Vec<u8>,
        pdf_filename: &str,
        tribute_html: &str,
    ) -> DeliveryOutcome;
}

/// SMTP-backed implementation of [`KitNotifier`].
pub struct EmailService {
    mailer: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from: String,
    from_name: String,
}

impl EmailService {
    /// Build from config. When SMTP credentials are absent the service still
    /// constructs, but every send reports [`DeliveryOutcome::NotConfigured`].
    pub fn from_config(config: &Config) -> Self {
        let mailer = match (&config.smtp_user, &config.smtp_password) {
            (Some(user), Some(password)) => {
                match AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_server) {
                    Ok(builder) => {
                        info!(
                            host = %config.smtp_server,
                            port = config.smtp_port,
                            "email service initialized (SMTP with STARTTLS)"
                        );
                        Some(
                            builder
                                .port(config.smtp_port)
                                .credentials(Credentials::new(user.clone(), password.clone()))
                                .timeout(Some(SMTP_TIMEOUT))
                                .build(),
                        )
                    }
                    Err(e) => {
                        warn!(host = %config.smtp_server, error = %e,
                            "SMTP relay setup failed, email delivery disabled");
                        None
                    }
                }
            }
            _ => {
                warn!("SMTP credentials not provided, email delivery disabled");
                None
            }
        };

        Self {
            mailer,
            from: config.email_from.clone(),
            from_name: config.email_from_name.clone(),
        }
    }

    fn body_html(pet_name: &str) -> String {
        format!(
            "<html><body style=\"font-family: Arial, sans-serif; padding: 20px;\">\
             <h2>O Kit Digital de {pet_name} está pronto!</h2>\
             <p>Olá!</p>\
             <p>O kit digital personalizado de <strong>{pet_name}</strong> foi criado com sucesso.</p>\
             <p>Você encontrará em anexo:</p>\
             <ul>\
             <li><strong>PDF do Kit Digital</strong>: capa, biografia, páginas para colorir e adesivos</li>\
             <li><strong>Página de Homenagem</strong>: uma página web para compartilhar ou guardar</li>\
             </ul>\
             <p>Divirta-se colorindo!</p>\
             <hr>\
             <p style=\"color: #666; font-size: 12px;\">PetStory</p>\
             </body></html>"
        )
    }

    fn build_message(
        &self,
        to: &str,
        pet_name: &str,
        pdf_bytes: Vec<u8>,
        pdf_filename: &str,
        tribute_html: &str,
    ) -> Result<Message, String> {
        let from: Mailbox = format!("{} <{}>", self.from_name, self.from)
            .parse()
            .map_err(|e| format!("invalid sender address: {e}"))?;
        let to: Mailbox = to
            .parse()
            .map_err(|e| format!("invalid recipient address: {e}"))?;

        let pdf_content_type = ContentType::parse("application/pdf")
            .map_err(|e| format!("pdf content type: {e}"))?;
        let html_filename = format!("homenagem_{}.html", pet_name.replace(' ', "_"));

        Message::builder()
            .from(from)
            .to(to)
            .subject(format!("O Kit Digital de {pet_name} está pronto!"))
            .multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::html(Self::body_html(pet_name)))
                    .singlepart(
                        Attachment::new(pdf_filename.to_string())
                            .body(pdf_bytes, pdf_content_type),
                    )
                    .singlepart(
                        Attachment::new(html_filename)
                            .body(tribute_html.as_bytes().to_vec(), ContentType::TEXT_HTML),
                    ),
            )
            .map_err(|e| format!("message build failed: {e}"))
    }
}

/// Map an SMTP error into a stable human-readable reason.
fn classify_smtp_error(e: &lettre::transport::smtp::Error) -> String {
    if e.is_timeout() {
        format!("smtp timeout: {e}")
    } else if e.is_permanent() {
        // Covers auth rejection, refused recipients and rejected message data.
        format!("rejected by smtp server: {e}")
    } else if e.is_transient() {
        format!("transient smtp failure: {e}")
    } else if e.is_client() {
        format!("smtp client error: {e}")
    } else {
        format!("smtp transport error: {e}")
    }
}

#[async_trait]
impl KitNotifier for EmailService {
    async fn send_kit(
        &self,
        to: &str,
        pet_name: &str,
        pdf_bytes: Vec<u8>,
        pdf_filename: &str,
        tribute_html: &str,
    ) -> DeliveryOutcome {
        let Some(mailer) = &self.mailer else {
            info!(to, "SMTP not configured, skipping kit delivery");
            return DeliveryOutcome::NotConfigured;
        };

        let message = match self.build_message(to, pet_name, pdf_bytes, pdf_filename, tribute_html)
        {
            Ok(m) => m,
            Err(reason) => {
                warn!(to, %reason, "kit email could not be built");
                return DeliveryOutcome::Failed(reason);
            }
        };

        match mailer.send(message).await {
            Ok(_) => {
                info!(to, pet_name, "kit email sent");
                DeliveryOutcome::Delivered
            }
            Err(e) => {
                let reason = classify_smtp_error(&e);
                warn!(to, %reason, "kit email delivery failed");
                DeliveryOutcome::Failed(reason)
            }
        }
    }
}
