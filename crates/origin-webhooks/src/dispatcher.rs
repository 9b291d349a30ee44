//! Durable webhook delivery
//!
//! Events are published onto an in-process queue at ingest commit; the
//! dispatcher fans each event out to the tenant's subscribed endpoints.
//! Every attempt appends a WebhookDelivery row. Failures back off on the
//! configured schedule and exhaustion dead-letters the delivery, which is
//! retained for inspection. Deliveries are independent; ordering across
//! events is not guaranteed.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use uuid::Uuid;

use origin_crypto::EncryptionProvider;
use origin_db::{Database, DbWebhook};

use crate::signing::{sign_payload, SignatureHeaders};
use crate::{Result, WebhookError};

/// An event awaiting delivery. `body` is the exact byte payload that will
/// be signed and transmitted.
#[derive(Debug, Clone)]
pub struct OutboundEvent {
    pub tenant_id: Uuid,
    pub event_type: String,
    pub event_id: Uuid,
    pub body: Vec<u8>,
    pub correlation_id: String,
}

/// Producer handle for the dispatcher queue
#[derive(Clone)]
pub struct WebhookQueue {
    tx: mpsc::UnboundedSender<OutboundEvent>,
}

impl WebhookQueue {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<OutboundEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Best-effort publish; ingest never fails because dispatch is down.
    pub fn publish(&self, event: OutboundEvent) {
        if self.tx.send(event).is_err() {
            tracing::warn!("webhook queue closed, dropping event");
        }
    }
}

/// Dispatcher tuning
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Sleep before each retry; length+1 = total attempts
    pub retry_schedule: Vec<Duration>,
    pub request_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            retry_schedule: vec![
                Duration::from_secs(5),
                Duration::from_secs(30),
                Duration::from_secs(120),
                Duration::from_secs(600),
                Duration::from_secs(1800),
            ],
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Consumes the queue and performs deliveries
pub struct Dispatcher {
    db: Database,
    encryption: Arc<dyn EncryptionProvider>,
    http: reqwest::Client,
    config: DispatcherConfig,
}

impl Dispatcher {
    pub fn new(
        db: Database,
        encryption: Arc<dyn EncryptionProvider>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            db,
            encryption,
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Drain the queue until every producer handle is dropped.
    pub async fn run(self: Arc<Self>, mut rx: mpsc::UnboundedReceiver<OutboundEvent>) {
        while let Some(event) = rx.recv().await {
            let webhooks = match self
                .db
                .webhooks()
                .find_subscribed(event.tenant_id, &event.event_type)
                .await
            {
                Ok(webhooks) => webhooks,
                Err(e) => {
                    tracing::error!(error = %e, event_id = %event.event_id, "failed to load webhooks");
                    continue;
                }
            };

            for webhook in webhooks {
                let dispatcher = Arc::clone(&self);
                let event = event.clone();
                tokio::spawn(async move {
                    if let Err(e) = dispatcher.deliver_with_retries(&webhook, &event).await {
                        tracing::warn!(
                            webhook_id = %webhook.id,
                            event_id = %event.event_id,
                            error = %e,
                            "delivery dead-lettered"
                        );
                    }
                });
            }
        }
        tracing::info!("webhook dispatcher drained");
    }

    async fn deliver_with_retries(&self, webhook: &DbWebhook, event: &OutboundEvent) -> Result<()> {
        let secret = self.encryption.decrypt(&webhook.encrypted_secret).await?;
        let max_attempts = self.config.retry_schedule.len() as i32 + 1;

        for attempt in 1..=max_attempts {
            let scheduled_at = Utc::now();
            let outcome = self.attempt(webhook, event, &secret).await;
            let (status, response_code) = match &outcome {
                Ok(code) => ("delivered", Some(*code)),
                Err(_) if attempt == max_attempts => ("dead_lettered", None),
                Err(_) => ("failed", None),
            };

            if let Err(e) = self
                .db
                .webhooks()
                .insert_delivery(
                    webhook.id,
                    event.event_id,
                    &event.event_type,
                    attempt,
                    status,
                    response_code,
                    &event.correlation_id,
                    scheduled_at,
                    Some(Utc::now()),
                )
                .await
            {
                tracing::error!(error = %e, "failed to record webhook delivery");
            }

            match outcome {
                Ok(_) => return Ok(()),
                Err(e) if attempt == max_attempts => return Err(e),
                Err(e) => {
                    let backoff = self.config.retry_schedule[(attempt - 1) as usize];
                    tracing::debug!(
                        webhook_id = %webhook.id,
                        attempt,
                        backoff_secs = backoff.as_secs(),
                        error = %e,
                        "delivery attempt failed, backing off"
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
        unreachable!("loop returns on success or final attempt")
    }

    /// One HTTP attempt. The signed bytes and the transmitted bytes are the
    /// same buffer.
    async fn attempt(
        &self,
        webhook: &DbWebhook,
        event: &OutboundEvent,
        secret: &[u8],
    ) -> Result<i32> {
        let timestamp = Utc::now().timestamp();
        let signature = sign_payload(secret, timestamp, &event.body);

        let response = self
            .http
            .post(&webhook.url)
            .header("Content-Type", "application/json")
            .header(SignatureHeaders::SIGNATURE, signature)
            .header(SignatureHeaders::TIMESTAMP, timestamp.to_string())
            .header(SignatureHeaders::EVENT, &event.event_type)
            .header(SignatureHeaders::EVENT_ID, event.event_id.to_string())
            .header(SignatureHeaders::CORRELATION_ID, &event.correlation_id)
            .body(event.body.clone())
            .timeout(self.config.request_timeout)
            .send()
            .await
            .map_err(|e| WebhookError::Delivery(e.to_string()))?;

        let code = response.status().as_u16() as i32;
        if response.status().is_success() {
            Ok(code)
        } else {
            Err(WebhookError::Delivery(format!("HTTP {code}")))
        }
    }

    /// Synchronous single-shot delivery for POST /v1/webhooks/test.
    pub async fn send_test(&self, webhook: &DbWebhook, correlation_id: &str) -> Result<i32> {
        let secret = self.encryption.decrypt(&webhook.encrypted_secret).await?;
        let event = OutboundEvent {
            tenant_id: webhook.tenant_id,
            event_type: "webhook.test".to_string(),
            event_id: Uuid::new_v4(),
            body: br#"{"test":true}"#.to_vec(),
            correlation_id: correlation_id.to_string(),
        };
        let code = self.attempt(webhook, &event, &secret).await?;
        self.db
            .webhooks()
            .insert_delivery(
                webhook.id,
                event.event_id,
                &event.event_type,
                1,
                "delivered",
                Some(code),
                correlation_id,
                Utc::now(),
                Some(Utc::now()),
            )
            .await?;
        Ok(code)
    }
}
