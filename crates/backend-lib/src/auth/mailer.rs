//! Out-of-band delivery of password-reset codes.
//!
//! [`SmtpMailer`] talks to a relay for real deployments; [`LogMailer`] is the
//! local default and [`RecordingMailer`] backs the tests.
use crate::config::{MailSettings, MailTransport, SmtpSecurity};
use crate::error::AppError;
use async_trait::async_trait;
use dashmap::DashMap;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::Arc;

pub const RESET_SUBJECT: &str = "Password Reset OTP";

/// Delivers reset OTPs to users
#[async_trait]
pub trait OtpMailer: Send + Sync {
    async fn send_reset_otp(&self, email: &str, otp: &str) -> Result<(), AppError>;
}

/// Mailer that only records the delivery in the log, without the code
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl OtpMailer for LogMailer {
    async fn send_reset_otp(&self, email: &str, _otp: &str) -> Result<(), AppError> {
        tracing::info!(%email, subject = RESET_SUBJECT, "reset code dispatched");
        Ok(())
    }
}

/// Mailer sending reset codes through an SMTP relay
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    app_name: String,
}

impl SmtpMailer {
    /// Build the relay client. No connection is made until the first send.
    pub fn new(settings: &MailSettings) -> Result<Self, AppError> {
        let from: Mailbox = settings
            .from
            .parse()
            .map_err(|e| AppError::Mail(format!("invalid from address {:?}: {e}", settings.from)))?;

        let host = settings.smtp_host.as_str();
        let builder = match settings.security {
            SmtpSecurity::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(host),
            SmtpSecurity::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host),
            SmtpSecurity::None => Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)),
        }
        .map_err(|e| AppError::Mail(format!("smtp relay {host}: {e}")))?
        .port(settings.smtp_port);

        let builder = match (&settings.username, &settings.password) {
            (Some(username), Some(password)) => builder.credentials(Credentials::new(
                username.clone(),
                password.expose().to_string(),
            )),
            _ => builder,
        };

        Ok(Self {
            transport: builder.build(),
            from,
            app_name: settings.app_name.clone(),
        })
    }

    /// The reset message for `email`
    pub fn message(&self, email: &str, otp: &str) -> Result<Message, AppError> {
        let to: Mailbox = email
            .parse()
            .map_err(|e| AppError::Mail(format!("invalid recipient: {e}")))?;
        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(RESET_SUBJECT)
            .header(ContentType::TEXT_PLAIN)
            .body(format!("Your {} password reset OTP is {otp}", self.app_name))
            .map_err(|e| AppError::Mail(e.to_string()))
    }
}

#[async_trait]
impl OtpMailer for SmtpMailer {
    async fn send_reset_otp(&self, email: &str, otp: &str) -> Result<(), AppError> {
        let message = self.message(email, otp)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| AppError::Mail(format!("smtp delivery failed: {e}")))?;
        tracing::info!(%email, subject = RESET_SUBJECT, "reset code mailed");
        Ok(())
    }
}

/// The mailer selected by `settings.transport`
pub fn mailer_from_settings(settings: &MailSettings) -> Result<Arc<dyn OtpMailer>, AppError> {
    let mailer: Arc<dyn OtpMailer> = match settings.transport {
        MailTransport::Log => Arc::new(LogMailer),
        MailTransport::Smtp => Arc::new(SmtpMailer::new(settings)?),
    };
    Ok(mailer)
}

/// Mailer keeping the last code sent to each address
#[derive(Debug, Clone, Default)]
pub struct RecordingMailer {
    sent: Arc<DashMap<String, String>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last code delivered to `email`
    pub fn last_otp(&self, email: &str) -> Option<String> {
        self.sent.get(&email.to_lowercase()).map(|otp| otp.clone())
    }
}

#[async_trait]
impl OtpMailer for RecordingMailer {
    async fn send_reset_otp(&self, email: &str, otp: &str) -> Result<(), AppError> {
        self.sent.insert(email.to_lowercase(), otp.to_string());
        Ok(())
    }
}
