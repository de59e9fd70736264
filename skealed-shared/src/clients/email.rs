use std::time::Duration;

use reqwest::Client;
use serde::Serialize;

const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";

/// One outgoing e-mail with an HTML body and a plain-text fallback.
#[derive(Debug, Serialize)]
pub struct Message {
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[derive(Serialize)]
struct ResendPayload<'a> {
    from: &'a str,
    #[serde(flatten)]
    message: &'a Message,
}

/// Transactional mail through the Resend HTTP API.
#[derive(Clone)]
pub struct EmailClient {
    client: Client,
    api_key: String,
    sender: String,
}

impl EmailClient {
    pub fn new(api_key: &str, from_email: &str, from_name: &str) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_key: api_key.to_string(),
            sender: format!("{from_name} <{from_email}>"),
        }
    }

    pub async fn deliver(&self, message: &Message) -> Result<(), String> {
        let response = self
            .client
            .post(RESEND_ENDPOINT)
            .bearer_auth(&self.api_key)
            .json(&ResendPayload { from: &self.sender, message })
            .send()
            .await
            .map_err(|e| format!("email send failed: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("email API error ({status}): {body}"));
        }

        tracing::debug!(subject = %message.subject, "email sent");
        Ok(())
    }

    pub async fn send_magic_link(&self, to: &str, link: &str, ttl_minutes: i64) -> Result<(), String> {
        self.deliver(&magic_link_message(to, link, ttl_minutes)).await
    }
}

pub fn magic_link_message(to: &str, link: &str, ttl_minutes: i64) -> Message {
    let html = format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
        <h2 style="color: #2563eb;">Sign in to Skealed</h2>
        <p>Tap the button below to sign in. No password needed.</p>
        <p style="text-align: center; margin: 32px 0;">
          <a href="{link}" style="background: #2563eb; color: #fff; padding: 14px 28px; border-radius: 8px; text-decoration: none; font-weight: bold;">Sign in</a>
        </p>
        <p style="color: #666;">This link works once and expires in {ttl_minutes} minutes. If you did not ask for it, ignore this email.</p>
        </div>"#
    );
    let text = format!(
        "Sign in to Skealed: {link}\n\nThis link works once and expires in {ttl_minutes} minutes. \
         If you did not ask for it, ignore this email."
    );

    Message {
        to: vec![to.to_string()],
        subject: "Your Skealed sign-in link".to_string(),
        html,
        text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_link_message_embeds_link_and_expiry() {
        let msg = magic_link_message("me@example.com", "https://skealed.app/auth/callback?token=abc", 15);
        assert_eq!(msg.to, vec!["me@example.com"]);
        assert!(msg.html.contains(r#"href="https://skealed.app/auth/callback?token=abc""#));
        assert!(msg.html.contains("expires in 15 minutes"));
        assert!(msg.text.starts_with("Sign in to Skealed: https://skealed.app/auth/callback?token=abc"));
    }

    #[test]
    fn payload_flattens_message_next_to_sender() {
        let msg = magic_link_message("me@example.com", "https://x", 5);
        let json = serde_json::to_value(ResendPayload { from: "Skealed <no-reply@skealed.app>", message: &msg }).unwrap();
        assert_eq!(json["from"], "Skealed <no-reply@skealed.app>");
        assert_eq!(json["to"][0], "me@example.com");
        assert!(json.get("message").is_none());
    }
}
