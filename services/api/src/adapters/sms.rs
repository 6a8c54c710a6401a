//! services/api/src/adapters/sms.rs
//!
//! This module contains the adapters for sending outbound SMS. It implements
//! the `SmsSender` port from the `textpoll_core` crate, once against a
//! Twilio-style HTTP gateway and once as a log-only stand-in for local
//! development.

use async_trait::async_trait;
use textpoll_core::ports::{PortError, PortResult, SmsSender};
use tracing::{info, warn};

//=========================================================================================
// The HTTP Gateway Adapter
//=========================================================================================

/// An adapter that implements the `SmsSender` port against a form-encoded
/// HTTP messaging API with basic-auth credentials.
#[derive(Clone)]
pub struct HttpSmsSender {
    client: reqwest::Client,
    api_url: String,
    account_sid: String,
    auth_token: String,
    /// The E.164 number outbound messages are sent from.
    from_number: String,
}

impl HttpSmsSender {
    /// Creates a new `HttpSmsSender`.
    pub fn new(
        api_url: String,
        account_sid: String,
        auth_token: String,
        from_number: String,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
            account_sid,
            auth_token,
            from_number,
        }
    }
}

#[async_trait]
impl SmsSender for HttpSmsSender {
    async fn send(&self, to: &str, body: &str) -> PortResult<()> {
        let params = [("To", to), ("From", self.from_number.as_str()), ("Body", body)];

        let response = self
            .client
            .post(&self.api_url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&params)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("SMS gateway request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(PortError::Unexpected(format!(
                "SMS gateway returned {}: {}",
                status, detail
            )));
        }

        info!(to = %to, "sent SMS via gateway");
        Ok(())
    }
}

//=========================================================================================
// The Development Adapter
//=========================================================================================

/// A stand-in `SmsSender` that logs instead of delivering. Used whenever no
/// gateway credentials are configured, so registration stays testable
/// end-to-end on a laptop.
#[derive(Clone, Default)]
pub struct LoggingSmsSender;

#[async_trait]
impl SmsSender for LoggingSmsSender {
    async fn send(&self, to: &str, body: &str) -> PortResult<()> {
        warn!(to = %to, body = %body, "no SMS gateway configured; message logged only");
        Ok(())
    }
}
