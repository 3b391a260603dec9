//! Email notification handler.
//!
//! Delivery is simulated: the handler composes the message and "sends" it,
//! failing the first `simulated_failures` deliveries to exercise retries.

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use courier_core::{AttemptContext, Event, EventHandler, HandlerError};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::config::MailSettings;

const CONTENT_TYPE: &str = "Content-Type: text/plain; charset=UTF-8";

/// Payload shape expected in `Event<Value>`.
#[derive(Debug, Deserialize)]
struct EmailBody {
    body: String,
}

pub struct EmailHandler {
    settings: MailSettings,
    remaining_failures: AtomicU32,
}

impl EmailHandler {
    pub fn new(settings: MailSettings, simulated_failures: u32) -> Self {
        Self {
            settings,
            remaining_failures: AtomicU32::new(simulated_failures),
        }
    }

    pub fn compose(&self, body: &str) -> String {
        format!(
            "From: {}\r\nTo: {}\r\nSubject: {}\r\n{CONTENT_TYPE}\r\n\r\n{}",
            self.settings.from, self.settings.to, self.settings.subject, body
        )
    }

    fn take_simulated_failure(&self) -> Option<u32> {
        self.remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .ok()
    }
}

#[async_trait]
impl EventHandler<Value> for EmailHandler {
    async fn handle(
        &self,
        event: &Event<Value>,
        ctx: &AttemptContext,
    ) -> Result<(), HandlerError> {
        self.settings
            .validate()
            .map_err(|e| HandlerError::failed(format!("invalid email configuration: {e}")))?;

        let email = EmailBody::deserialize(event.payload()).map_err(|e| {
            HandlerError::invalid_payload(format!("expected {{\"body\": string}}: {e}"))
        })?;

        if let Some(left) = self.take_simulated_failure() {
            return Err(HandlerError::failed(format!(
                "failed to send email via {} (simulated, left={left})",
                self.settings.address()
            )));
        }

        let message = self.compose(&email.body);
        info!(
            worker_id = ctx.worker_id,
            event_id = %event.id(),
            attempt = ctx.attempt,
            to = %self.settings.to,
            bytes = message.len(),
            "email sent"
        );
        Ok(())
    }
}
