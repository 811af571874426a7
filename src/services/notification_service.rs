//! Notificaciones push
//!
//! Sumidero fire-and-forget: los fallos se registran y nunca llegan al
//! flujo de despacho.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::utils::errors::{AppError, AppResult};

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, user_id: Uuid, message: &str, metadata: Value) -> AppResult<()>;
}

/// Envía la notificación a un servicio push externo por HTTP
pub struct HttpNotificationSink {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpNotificationSink {
    pub fn new(endpoint: String) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl NotificationSink for HttpNotificationSink {
    async fn notify(&self, user_id: Uuid, message: &str, metadata: Value) -> AppResult<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&json!({
                "userId": user_id,
                "message": message,
                "metadata": metadata,
            }))
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("push request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Internal(format!("push service answered {}", status)));
        }
        Ok(())
    }
}

/// Solo registra la notificación (sin servicio push configurado)
pub struct LogNotificationSink;

#[async_trait]
impl NotificationSink for LogNotificationSink {
    async fn notify(&self, user_id: Uuid, message: &str, metadata: Value) -> AppResult<()> {
        info!("🔔 Notificación para {}: {} {}", user_id, message, metadata);
        Ok(())
    }
}

/// Lanza la notificación en segundo plano
pub fn notify_in_background(
    sink: &Arc<dyn NotificationSink>,
    user_id: Uuid,
    message: impl Into<String>,
    metadata: Value,
) {
    let sink = Arc::clone(sink);
    let message = message.into();
    tokio::spawn(async move {
        if let Err(e) = sink.notify(user_id, &message, metadata).await {
            warn!("⚠️ Notificación a {} fallida: {}", user_id, e);
        }
    });
}
