//! Outbound email over SMTP

use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use crate::config::SmtpSettings;

/// An email ready to send
#[derive(Debug, Clone)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub cc: Option<String>,
    pub bcc: Option<String>,
}

impl Email {
    /// The login-link message sent by `POST /api/login`
    pub fn login_link(to: &str, link: &str) -> Self {
        Self {
            to: to.to_string(),
            subject: "Your Flowstate login link".to_string(),
            body: format!(
                "Hi,\n\nClick the link below to sign in to Flowstate:\n\n{}\n\nIf you didn't \
                 request this, you can safely ignore this email.\n",
                link
            ),
            cc: None,
            bcc: None,
        }
    }
}

/// STARTTLS SMTP sender
pub struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl Mailer {
    pub fn new(settings: &SmtpSettings) -> anyhow::Result<Self> {
        let password = std::env::var(&settings.password_env).unwrap_or_default();
        let credentials = Credentials::new(settings.username.clone(), password);

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.server)?
            .port(settings.port)
            .credentials(credentials)
            .build();

        let from = settings
            .from
            .as_deref()
            .unwrap_or(&settings.username)
            .parse()?;

        Ok(Self { transport, from })
    }

    pub async fn send(&self, email: Email) -> anyhow::Result<()> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .to(email.to.parse()?)
            .subject(&email.subject);
        if let Some(cc) = &email.cc {
            builder = builder.cc(cc.parse()?);
        }
        if let Some(bcc) = &email.bcc {
            builder = builder.bcc(bcc.parse()?);
        }

        let message = builder.body(email.body)?;
        self.transport.send(message).await?;
        info!(to = %email.to, subject = %email.subject, "email sent");
        Ok(())
    }
}
