//! Utilidades del sistema
//!
//! Este módulo contiene utilidades para manejo de errores y métricas.

pub mod errors;
pub mod metrics;
