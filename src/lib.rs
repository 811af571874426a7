//! Coordinador de despacho y ciclo de vida de viajes en tiempo real
//!
//! Difunde cada solicitud a los conductores elegibles, resuelve la
//! carrera de aceptación con una escritura condicional y conduce el
//! viaje por `booked -> accepted -> arrived -> started -> ended`.

pub mod config;
pub mod controllers;
pub mod dto;
pub mod middleware;
pub mod models;
pub mod realtime;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;
