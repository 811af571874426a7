pub mod channel_registry;
pub mod redis_transport;
pub mod transport;

pub use channel_registry::{user_channel, ChannelRegistry, Connection, ConnectionId};
pub use redis_transport::RedisTransport;
pub use transport::{ChannelTransport, DispatchSignal, LocalTransport};
