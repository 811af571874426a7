//! Transporte de canales
//!
//! Capacidad de presencia/difusión que consume el núcleo: unirse a un
//! canal, emitir a un canal y propagar señales de resolución de despacho
//! entre procesos.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use super::channel_registry::{ChannelRegistry, Connection, ConnectionId};
use crate::dto::events::OutboundMessage;
use crate::models::CancelledBy;
use crate::utils::errors::AppResult;

const SIGNAL_BUFFER: usize = 256;

/// Señal de que un despacho armado ya no debe expirar
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DispatchSignal {
    Accepted {
        ride_id: Uuid,
        driver_id: Uuid,
    },
    Cancelled {
        ride_id: Uuid,
        cancelled_by: CancelledBy,
    },
}

impl DispatchSignal {
    pub fn ride_id(&self) -> Uuid {
        match self {
            DispatchSignal::Accepted { ride_id, .. } => *ride_id,
            DispatchSignal::Cancelled { ride_id, .. } => *ride_id,
        }
    }
}

#[async_trait]
pub trait ChannelTransport: Send + Sync {
    async fn join(&self, channel: &str, connection: &Connection);

    async fn leave(&self, channel: &str, connection_id: ConnectionId);

    async fn leave_all(&self, connection_id: ConnectionId);

    /// Entrega best-effort, como mucho una vez, a todos los miembros del canal
    async fn emit(&self, channel: &str, message: OutboundMessage) -> AppResult<()>;

    async fn publish_signal(&self, signal: DispatchSignal) -> AppResult<()>;

    fn subscribe_signals(&self) -> broadcast::Receiver<DispatchSignal>;
}

/// Transporte de un solo proceso
#[derive(Clone)]
pub struct LocalTransport {
    registry: ChannelRegistry,
    signals: broadcast::Sender<DispatchSignal>,
}

impl LocalTransport {
    pub fn new() -> Self {
        let (signals, _) = broadcast::channel(SIGNAL_BUFFER);
        Self {
            registry: ChannelRegistry::new(),
            signals,
        }
    }

    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }
}

impl Default for LocalTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChannelTransport for LocalTransport {
    async fn join(&self, channel: &str, connection: &Connection) {
        self.registry.join(channel, connection).await;
    }

    async fn leave(&self, channel: &str, connection_id: ConnectionId) {
        self.registry.leave(channel, connection_id).await;
    }

    async fn leave_all(&self, connection_id: ConnectionId) {
        self.registry.leave_all(connection_id).await;
    }

    async fn emit(&self, channel: &str, message: OutboundMessage) -> AppResult<()> {
        self.registry.deliver(channel, &message).await;
        Ok(())
    }

    async fn publish_signal(&self, signal: DispatchSignal) -> AppResult<()> {
        // Sin suscriptores no es un error: nadie tenía un despacho armado
        let _ = self.signals.send(signal);
        Ok(())
    }

    fn subscribe_signals(&self) -> broadcast::Receiver<DispatchSignal> {
        self.signals.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::events::Envelope;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_signals_reach_subscribers() {
        let transport = LocalTransport::new();
        let mut rx = transport.subscribe_signals();
        let ride_id = Uuid::new_v4();

        transport
            .publish_signal(DispatchSignal::Cancelled {
                ride_id,
                cancelled_by: CancelledBy::Rider,
            })
            .await
            .unwrap();

        assert_eq!(rx.recv().await.unwrap().ride_id(), ride_id);
    }

    #[tokio::test]
    async fn test_emit_without_members_is_ok() {
        let transport = LocalTransport::new();
        let msg = OutboundMessage::new("x", Envelope::success("x", "", ()));
        assert!(transport.emit("user:nobody", msg).await.is_ok());
    }

    #[tokio::test]
    async fn test_emit_reaches_joined_connection() {
        let transport = LocalTransport::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = Connection::new(tx);
        transport.join("user:7", &conn).await;

        let msg = OutboundMessage::new("hello", Envelope::success("hello", "", ()));
        transport.emit("user:7", msg.clone()).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), msg);
    }

    #[test]
    fn test_signal_wire_format() {
        let signal = DispatchSignal::Accepted {
            ride_id: Uuid::nil(),
            driver_id: Uuid::nil(),
        };
        let value = serde_json::to_value(&signal).unwrap();
        assert_eq!(value["kind"], "accepted");
    }
}
