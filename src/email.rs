use dotenvy::dotenv;
use serde_json::json;

use crate::middleware::logging::ApiError;

//Transactional mail goes out through the provider's HTTP API. When the
//provider env vars are missing the client stays disabled and sends become
//logged no-ops, which keeps local runs and tests off the network.
pub struct EmailClient {
    http: reqwest::Client,
    config: Option<EmailConfig>,
}

struct EmailConfig {
    api_url: String,
    api_key: String,
    from: String,
}

pub struct OrderLine {
    pub name: String,
    pub quantity: u32,
    pub price: f64,
}

impl EmailClient {
    pub fn from_env() -> Self {
        dotenv().ok();
        let config = match (
            std::env::var("EMAIL_API_URL"),
            std::env::var("EMAIL_API_KEY"),
            std::env::var("EMAIL_FROM"),
        ) {
            (Ok(api_url), Ok(api_key), Ok(from)) => Some(EmailConfig {
                api_url,
                api_key,
                from,
            }),
            _ => {
                tracing::warn!("Email provider is not configured, delivery is disabled");
                None
            }
        };

        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), ApiError> {
        let config = match &self.config {
            Some(config) => config,
            None => {
                tracing::info!(to = %to, subject = %subject, "Email delivery disabled, skipping");
                return Ok(());
            }
        };

        let response = self
            .http
            .post(&config.api_url)
            .bearer_auth(&config.api_key)
            .json(&json!({
                "from": config.from,
                "to": to,
                "subject": subject,
                "html": html,
            }))
            .send()
            .await
            .map_err(|err| ApiError::EmailError(err.to_string()))?;

        if !response.status().is_success() {
            return Err(ApiError::EmailError(format!(
                "Provider returned {}",
                response.status()
            )));
        }

        Ok(())
    }

    pub async fn send_welcome(&self, to: &str, username: &str) -> Result<(), ApiError> {
        let html = format!(
            "<h1>Welcome, {username}!</h1>\
             <p>Your account was created successfully. Happy shopping!</p>"
        );
        self.send(to, "Welcome to the store", &html).await
    }

    pub async fn send_order_confirmation(
        &self,
        to: &str,
        order_id: i32,
        lines: &[OrderLine],
        total: f64,
    ) -> Result<(), ApiError> {
        let mut rows = String::new();
        for line in lines {
            rows.push_str(&format!(
                "<li>{} x{} - {:.2}</li>",
                line.name,
                line.quantity,
                line.price * line.quantity as f64
            ));
        }
        let html = format!(
            "<h1>Order #{order_id} confirmed</h1>\
             <ul>{rows}</ul>\
             <p>Total: {total:.2}</p>"
        );
        self.send(to, &format!("Order #{order_id} confirmation"), &html)
            .await
    }
}
