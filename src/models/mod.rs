//! Modelos del sistema
//!
//! Este módulo contiene los modelos de datos del despacho: el documento
//! Ride y las vistas de conductores y vehículos.

pub mod driver;
pub mod ride;
pub mod vehicle;

pub use driver::{Driver, Gender};
pub use ride::*;
pub use vehicle::Vehicle;
