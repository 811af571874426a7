//! Registro de presencia
//!
//! Asocia cada canal con nombre (`user:<id>`) al conjunto de conexiones
//! WebSocket activas en este proceso.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::debug;
use uuid::Uuid;

use crate::dto::events::OutboundMessage;

pub type ConnectionId = Uuid;
pub type OutboundSender = mpsc::UnboundedSender<OutboundMessage>;

/// Canal personal de un pasajero o conductor
pub fn user_channel(user_id: Uuid) -> String {
    format!("user:{}", user_id)
}

/// Extremo de envío de una conexión
#[derive(Clone, Debug)]
pub struct Connection {
    pub id: ConnectionId,
    pub sender: OutboundSender,
}

impl Connection {
    pub fn new(sender: OutboundSender) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender,
        }
    }

    /// Envío directo a esta conexión; falla en silencio si ya se cerró
    pub fn send(&self, message: OutboundMessage) {
        if self.sender.send(message).is_err() {
            debug!("🔌 Conexión {} cerrada, mensaje descartado", self.id);
        }
    }
}

#[derive(Clone, Default)]
pub struct ChannelRegistry {
    channels: Arc<RwLock<HashMap<String, HashMap<ConnectionId, OutboundSender>>>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn join(&self, channel: &str, connection: &Connection) {
        let mut channels = self.channels.write().await;
        channels
            .entry(channel.to_string())
            .or_default()
            .insert(connection.id, connection.sender.clone());
        debug!("➕ Conexión {} unida a {}", connection.id, channel);
    }

    pub async fn leave(&self, channel: &str, connection_id: ConnectionId) {
        let mut channels = self.channels.write().await;
        if let Some(members) = channels.get_mut(channel) {
            members.remove(&connection_id);
            if members.is_empty() {
                channels.remove(channel);
            }
        }
    }

    pub async fn leave_all(&self, connection_id: ConnectionId) {
        let mut channels = self.channels.write().await;
        channels.retain(|_, members| {
            members.remove(&connection_id);
            !members.is_empty()
        });
    }

    /// Entrega a todas las conexiones locales del canal; devuelve cuántas lo recibieron
    pub async fn deliver(&self, channel: &str, message: &OutboundMessage) -> usize {
        let mut delivered = 0;
        let mut closed = Vec::new();

        {
            let channels = self.channels.read().await;
            let Some(members) = channels.get(channel) else {
                return 0;
            };
            for (id, sender) in members {
                if sender.send(message.clone()).is_ok() {
                    delivered += 1;
                } else {
                    closed.push(*id);
                }
            }
        }

        for id in closed {
            self.leave(channel, id).await;
        }

        delivered
    }

    pub async fn member_count(&self, channel: &str) -> usize {
        self.channels
            .read()
            .await
            .get(channel)
            .map_or(0, |members| members.len())
    }
}
