use async_trait::async_trait;
use futures::StreamExt;
use redis::{aio::ConnectionManager, AsyncCommands};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use super::channel_registry::{ChannelRegistry, Connection, ConnectionId};
use super::transport::{ChannelTransport, DispatchSignal};
use crate::dto::events::OutboundMessage;
use crate::utils::errors::AppResult;

const SIGNAL_BUFFER: usize = 256;
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Mensaje que viaja por el bus compartido entre procesos
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum BusMessage {
    Deliver {
        channel: String,
        message: OutboundMessage,
    },
    Signal {
        signal: DispatchSignal,
    },
}

/// Transporte multi-proceso sobre Redis pub/sub
///
/// Todo `emit` se publica en el bus; cada proceso (incluido el emisor)
/// lo recibe por su suscripción y lo entrega a sus conexiones locales.
#[derive(Clone)]
pub struct RedisTransport {
    publisher: ConnectionManager,
    registry: ChannelRegistry,
    signals: broadcast::Sender<DispatchSignal>,
    bus_channel: String,
}

impl RedisTransport {
    /// Conectar a Redis y arrancar la tarea suscriptora
    pub async fn connect(redis_url: &str, bus_channel: &str) -> anyhow::Result<Self> {
        info!("🔗 Conectando transporte Redis: {}", redis_url);

        let client = redis::Client::open(redis_url)?;
        let publisher = ConnectionManager::new(client.clone()).await?;

        // Test de conexión usando un comando simple
        let mut conn = publisher.clone();
        let _: () = redis::cmd("PING").query_async(&mut conn).await?;

        let (signals, _) = broadcast::channel(SIGNAL_BUFFER);
        let transport = Self {
            publisher,
            registry: ChannelRegistry::new(),
            signals,
            bus_channel: bus_channel.to_string(),
        };

        tokio::spawn(subscriber_loop(
            client,
            transport.bus_channel.clone(),
            transport.registry.clone(),
            transport.signals.clone(),
        ));

        info!("✅ Transporte Redis suscrito a {}", bus_channel);
        Ok(transport)
    }

    async fn publish(&self, message: &BusMessage) -> AppResult<()> {
        let payload = serde_json::to_string(message)?;
        let mut conn = self.publisher.clone();
        let receivers: i64 = conn.publish(&self.bus_channel, payload).await?;
        debug!("📤 Publicado en {} ({} suscriptores)", self.bus_channel, receivers);
        Ok(())
    }
}

async fn subscriber_loop(
    client: redis::Client,
    bus_channel: String,
    registry: ChannelRegistry,
    signals: broadcast::Sender<DispatchSignal>,
) {
    loop {
        if let Err(e) = consume(&client, &bus_channel, &registry, &signals).await {
            error!("❌ Suscripción Redis perdida: {}", e);
        }
        warn!("⚠️ Reintentando suscripción en {:?}", RECONNECT_DELAY);
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}

async fn consume(
    client: &redis::Client,
    bus_channel: &str,
    registry: &ChannelRegistry,
    signals: &broadcast::Sender<DispatchSignal>,
) -> redis::RedisResult<()> {
    let mut pubsub = client.get_async_connection().await?.into_pubsub();
    pubsub.subscribe(bus_channel).await?;

    let mut stream = pubsub.on_message();
    while let Some(msg) = stream.next().await {
        let payload: String = match msg.get_payload() {
            Ok(p) => p,
            Err(e) => {
                warn!("⚠️ Payload ilegible en el bus: {}", e);
                continue;
            }
        };

        match serde_json::from_str::<BusMessage>(&payload) {
            Ok(BusMessage::Deliver { channel, message }) => {
                registry.deliver(&channel, &message).await;
            }
            Ok(BusMessage::Signal { signal }) => {
                let _ = signals.send(signal);
            }
            Err(e) => warn!("⚠️ Mensaje de bus inválido: {}", e),
        }
    }

    Ok(())
}

#[async_trait]
impl ChannelTransport for RedisTransport {
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
        self.publish(&BusMessage::Deliver {
            channel: channel.to_string(),
            message,
        })
        .await
    }

    async fn publish_signal(&self, signal: DispatchSignal) -> AppResult<()> {
        self.publish(&BusMessage::Signal { signal }).await
    }

    fn subscribe_signals(&self) -> broadcast::Receiver<DispatchSignal> {
        self.signals.subscribe()
    }
}
