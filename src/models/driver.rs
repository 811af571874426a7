//! Modelo de Driver
//!
//! Vista mínima del directorio de usuarios que necesita el despacho:
//! identidad, género declarado y última posición conocida.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

use super::ride::Coordinates;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "gender", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

/// Fila de la tabla users con role = 'driver'
#[derive(Debug, Clone, FromRow)]
pub struct DriverRecord {
    pub id: Uuid,
    pub full_name: String,
    pub gender: Option<Gender>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Driver {
    pub id: Uuid,
    pub full_name: String,
    pub gender: Option<Gender>,
    pub last_location: Option<Coordinates>,
}

impl From<DriverRecord> for Driver {
    fn from(record: DriverRecord) -> Self {
        let last_location = match (record.latitude, record.longitude) {
            (Some(lat), Some(lng)) => Some(Coordinates::new(lat, lng)),
            _ => None,
        };

        Self {
            id: record.id,
            full_name: record.full_name,
            gender: record.gender,
            last_location,
        }
    }
}
