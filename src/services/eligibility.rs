//! Selección de conductores candidatos
//!
//! Predicado enchufable sobre el directorio de conductores. Parte del
//! filtro se delega al directorio (`query`) y el resto se evalúa aquí.

use crate::models::{Driver, Ride};
use crate::repositories::DriverQuery;
use crate::services::geo_service::{haversine_distance, DistanceUnit};

pub trait DriverEligibility: Send + Sync {
    /// Filtros que el directorio puede resolver por sí mismo
    fn query(&self, _ride: &Ride) -> DriverQuery {
        DriverQuery::default()
    }

    fn is_eligible(&self, ride: &Ride, driver: &Driver) -> bool;
}

/// Todos los conductores son candidatos
pub struct AnyDriver;

impl DriverEligibility for AnyDriver {
    fn is_eligible(&self, _ride: &Ride, _driver: &Driver) -> bool {
        true
    }
}

/// Respeta la preferencia de género de conductor declarada por el pasajero
pub struct GenderPreference;

impl DriverEligibility for GenderPreference {
    fn query(&self, ride: &Ride) -> DriverQuery {
        DriverQuery {
            gender: ride.preferences.driver_gender,
        }
    }

    fn is_eligible(&self, ride: &Ride, driver: &Driver) -> bool {
        match ride.preferences.driver_gender {
            Some(wanted) => driver.gender == Some(wanted),
            None => true,
        }
    }
}

/// Conductor a menos de `max_distance` del punto de recogida.
/// Un radio <= 0 desactiva el filtro; sin posición conocida el conductor se incluye.
pub struct WithinRadius {
    pub max_distance: f64,
    pub unit: DistanceUnit,
}

impl DriverEligibility for WithinRadius {
    fn is_eligible(&self, ride: &Ride, driver: &Driver) -> bool {
        if self.max_distance <= 0.0 {
            return true;
        }
        match driver.last_location {
            Some(position) => {
                haversine_distance(position, ride.pickup.coordinates, self.unit)
                    <= self.max_distance
            }
            None => true,
        }
    }
}

/// Conjunción de predicados
pub struct AllOf(pub Vec<Box<dyn DriverEligibility>>);

impl DriverEligibility for AllOf {
    fn query(&self, ride: &Ride) -> DriverQuery {
        let mut merged = DriverQuery::default();
        for rule in &self.0 {
            let q = rule.query(ride);
            if merged.gender.is_none() {
                merged.gender = q.gender;
            }
        }
        merged
    }

    fn is_eligible(&self, ride: &Ride, driver: &Driver) -> bool {
        self.0.iter().all(|rule| rule.is_eligible(ride, driver))
    }
}

/// Política por defecto: preferencia de género + radio configurado
pub fn default_policy(max_distance: f64, unit: DistanceUnit) -> AllOf {
    AllOf(vec![
        Box::new(GenderPreference),
        Box::new(WithinRadius { max_distance, unit }),
    ])
}
