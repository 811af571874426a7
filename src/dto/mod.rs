//! DTOs
//!
//! Formas de los mensajes que cruzan el borde del servicio: protocolo
//! WebSocket y respuestas REST.

pub mod api_response;
pub mod events;

pub use api_response::ApiResponse;
