use lettre::message::header::ContentType;
use lettre::message::{MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

use crate::config::EmailConfig;
use crate::errors::ApiError;

pub struct EmailService {
    config: EmailConfig,
}

impl EmailService {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    pub fn from_env() -> Self {
        Self::new(EmailConfig::from_env())
    }

    /// Send the password reset email carrying the raw token inside the link.
    pub async fn send_password_reset_email(
        &self,
        to_email: &str,
        to_name: &str,
        reset_link: &str,
    ) -> Result<(), ApiError> {
        if !self.config.enabled {
            log::warn!("email delivery disabled, skipping password reset email to {to_email}");
            return Ok(());
        }

        let html = reset_email_html(to_name, reset_link);
        let text = reset_email_text(to_name, reset_link);
        self.send(to_email, "Password Reset Request", &html, &text).await
    }

    /// Confirmation after a successful reset. Callers treat failures as
    /// non-fatal.
    pub async fn send_reset_confirmation_email(
        &self,
        to_email: &str,
        to_name: &str,
    ) -> Result<(), ApiError> {
        if !self.config.enabled {
            log::warn!("email delivery disabled, skipping reset confirmation email to {to_email}");
            return Ok(());
        }

        let html = confirmation_email_html(to_name);
        let text = confirmation_email_text(to_name);
        self.send(to_email, "Password Reset Successful", &html, &text).await
    }

    async fn send(
        &self,
        to_email: &str,
        subject: &str,
        html_body: &str,
        text_body: &str,
    ) -> Result<(), ApiError> {
        let email = Message::builder()
            .from(
                format!("{} <{}>", self.config.from_name, self.config.from_address)
                    .parse()
                    .map_err(|e| ApiError::EmailSend(format!("Invalid from address: {e}")))?,
            )
            .to(to_email
                .parse()
                .map_err(|e| ApiError::EmailSend(format!("Invalid to address: {e}")))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )
            .map_err(|e| ApiError::EmailSend(format!("Failed to build email: {e}")))?;

        let creds = Credentials::new(
            self.config.smtp_username.clone(),
            self.config.smtp_password.clone(),
        );

        let mailer = SmtpTransport::relay(&self.config.smtp_host)
            .map_err(|e| ApiError::EmailSend(format!("Failed to create SMTP transport: {e}")))?
            .credentials(creds)
            .port(self.config.smtp_port)
            .build();

        // lettre's SmtpTransport is blocking
        let result = tokio::task::spawn_blocking(move || mailer.send(&email))
            .await
            .map_err(|e| ApiError::EmailSend(format!("Failed to spawn email sending task: {e}")))?;

        result.map_err(|e| ApiError::EmailSend(format!("Failed to send email: {e}")))?;

        log::info!("email sent to {to_email}");
        Ok(())
    }
}

fn reset_email_html(to_name: &str, reset_link: &str) -> String {
    format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
  <h2 style="color: #333;">Password Reset Request</h2>
  <p>Hello {to_name},</p>
  <p>You requested to reset your password. Click the button below to proceed:</p>
  <div style="text-align: center; margin: 30px 0;">
    <a href="{reset_link}"
       style="background-color: #4CAF50; color: white; padding: 12px 30px;
              text-decoration: none; border-radius: 5px; display: inline-block;">
      Reset Password
    </a>
  </div>
  <p>Or copy and paste this link in your browser:</p>
  <p style="color: #666; word-break: break-all;">{reset_link}</p>
  <p style="color: #666; font-size: 14px;">
    This link will expire in 1 hour. If you didn't request this, please ignore this email.
  </p>
  <hr style="border: 1px solid #eee; margin: 30px 0;">
  <p style="color: #999; font-size: 12px;">JustHike - Your Adventure Awaits</p>
</div>"#
    )
}

fn reset_email_text(to_name: &str, reset_link: &str) -> String {
    format!(
        "Hello {to_name},\n\n\
         You requested to reset your JustHike password.\n\n\
         Reset it using the link below:\n{reset_link}\n\n\
         This link will expire in 1 hour. If you didn't request this, please ignore this email.\n\n\
         JustHike - Your Adventure Awaits\n"
    )
}

fn confirmation_email_html(to_name: &str) -> String {
    format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
  <h2 style="color: #333;">Password Reset Successful</h2>
  <p>Hello {to_name},</p>
  <p>Your password has been successfully reset.</p>
  <p>If you didn't make this change, please contact support immediately.</p>
  <hr style="border: 1px solid #eee; margin: 30px 0;">
  <p style="color: #999; font-size: 12px;">JustHike - Your Adventure Awaits</p>
</div>"#
    )
}

fn confirmation_email_text(to_name: &str) -> String {
    format!(
        "Hello {to_name},\n\n\
         Your JustHike password has been successfully reset.\n\n\
         If you didn't make this change, please contact support immediately.\n\n\
         JustHike - Your Adventure Awaits\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_email_contains_name_and_link() {
        let html = reset_email_html("Asha", "https://example.com/reset?token=abc123");
        assert!(html.contains("Asha"));
        assert!(html.contains("https://example.com/reset?token=abc123"));
        assert!(html.contains("1 hour"));

        let text = reset_email_text("Asha", "https://example.com/reset?token=abc123");
        assert!(text.contains("Asha"));
        assert!(text.contains("https://example.com/reset?token=abc123"));
        assert!(text.contains("1 hour"));
    }

    #[test]
    fn confirmation_email_contains_name() {
        let html = confirmation_email_html("Tenzing");
        assert!(html.contains("Tenzing"));
        assert!(html.contains("Password Reset Successful"));

        let text = confirmation_email_text("Tenzing");
        assert!(text.contains("Tenzing"));
    }

    #[tokio::test]
    async fn disabled_service_skips_sending() {
        let config = EmailConfig {
            smtp_host: String::new(),
            smtp_port: 587,
            smtp_username: String::new(),
            smtp_password: String::new(),
            from_address: "noreply@justhike.com".to_string(),
            from_name: "JustHike".to_string(),
            enabled: false,
        };
        let service = EmailService::new(config);
        assert!(service
            .send_password_reset_email("someone@example.com", "Someone", "https://x/reset")
            .await
            .is_ok());
        assert!(service
            .send_reset_confirmation_email("someone@example.com", "Someone")
            .await
            .is_ok());
    }
}
