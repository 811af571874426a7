//! Cálculo de distancias y ETA
//!
//! Funciones puras: distancia de círculo máximo (haversine) y ETA a
//! partir de una velocidad media configurada, sin ninguna E/S.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::models::Coordinates;

const EARTH_RADIUS_KM: f64 = 6371.0;
const EARTH_RADIUS_MI: f64 = 3958.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceUnit {
    Km,
    Mi,
}

impl DistanceUnit {
    pub fn earth_radius(&self) -> f64 {
        match self {
            DistanceUnit::Km => EARTH_RADIUS_KM,
            DistanceUnit::Mi => EARTH_RADIUS_MI,
        }
    }
}

impl FromStr for DistanceUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "km" | "kilometers" => Ok(DistanceUnit::Km),
            "mi" | "miles" => Ok(DistanceUnit::Mi),
            other => Err(format!("unknown distance unit '{}'", other)),
        }
    }
}

/// Distancia de círculo máximo entre dos puntos, en la unidad pedida
pub fn haversine_distance(from: Coordinates, to: Coordinates, unit: DistanceUnit) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let d_lat = (to.latitude - from.latitude).to_radians();
    let d_lon = (to.longitude - from.longitude).to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    unit.earth_radius() * c
}

/// Minutos redondeados para recorrer `distance` a `speed` (unidad/hora)
pub fn eta_minutes(distance: f64, speed: f64) -> i64 {
    if distance <= 0.0 || speed <= 0.0 {
        return 0;
    }
    (distance / speed * 60.0).round() as i64
}

/// Banda legible: "< 1 min", "M min", "H hr" o "H hr M min"
pub fn format_eta(minutes: i64) -> String {
    if minutes < 1 {
        return "< 1 min".to_string();
    }

    let hours = minutes / 60;
    let mins = minutes % 60;
    match (hours, mins) {
        (0, m) => format!("{} min", m),
        (h, 0) => format!("{} hr", h),
        (h, m) => format!("{} hr {} min", h, m),
    }
}

pub fn calculate_eta(distance: f64, speed: f64) -> String {
    format_eta(eta_minutes(distance, speed))
}

/// Resultado de una consulta de ETA
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EtaEstimate {
    pub distance: f64,
    pub unit: DistanceUnit,
    pub minutes: i64,
    pub eta: String,
}

/// Calculadora configurada con unidad y velocidad media
#[derive(Debug, Clone, Copy)]
pub struct EtaCalculator {
    unit: DistanceUnit,
    average_speed: f64,
}

impl EtaCalculator {
    pub fn new(unit: DistanceUnit, average_speed: f64) -> Self {
        Self {
            unit,
            average_speed,
        }
    }

    pub fn distance(&self, from: Coordinates, to: Coordinates) -> f64 {
        haversine_distance(from, to, self.unit)
    }

    pub fn estimate(&self, from: Coordinates, to: Coordinates) -> EtaEstimate {
        let distance = self.distance(from, to);
        let minutes = eta_minutes(distance, self.average_speed);

        EtaEstimate {
            distance,
            unit: self.unit,
            minutes,
            eta: format_eta(minutes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_distance_is_under_a_minute() {
        assert_eq!(calculate_eta(0.0, 35.0), "< 1 min");
    }

    #[test]
    fn test_exact_hours() {
        assert_eq!(calculate_eta(70.0, 35.0), "2 hr");
    }

    #[test]
    fn test_hours_and_minutes() {
        // 45 km a 30 km/h = 90 min
        assert_eq!(calculate_eta(45.0, 30.0), "1 hr 30 min");
        assert_eq!(calculate_eta(5.0, 30.0), "10 min");
    }

    #[test]
    fn test_rounding() {
        // 0.4 min redondea a 0
        assert_eq!(calculate_eta(0.2, 30.0), "< 1 min");
        // 0.6 min redondea a 1
        assert_eq!(calculate_eta(0.3, 30.0), "1 min");
    }

    #[test]
    fn test_haversine_known_distance() {
        // París - Londres ~ 343.5 km
        let paris = Coordinates::new(48.8566, 2.3522);
        let london = Coordinates::new(51.5074, -0.1278);
        let km = haversine_distance(paris, london, DistanceUnit::Km);
        assert!((km - 343.5).abs() < 1.0, "got {}", km);

        let mi = haversine_distance(paris, london, DistanceUnit::Mi);
        assert!((mi - 213.4).abs() < 1.0, "got {}", mi);
    }

    #[test]
    fn test_haversine_same_point() {
        let p = Coordinates::new(-33.8688, 151.2093);
        assert_eq!(haversine_distance(p, p, DistanceUnit::Km), 0.0);
    }

    #[test]
    fn test_estimate_is_deterministic() {
        let calc = EtaCalculator::new(DistanceUnit::Km, 35.0);
        let a = Coordinates::new(40.4168, -3.7038);
        let b = Coordinates::new(40.4530, -3.6883);
        assert_eq!(calc.estimate(a, b), calc.estimate(a, b));
        assert_eq!(calc.estimate(a, a).eta, "< 1 min");
    }

    #[test]
    fn test_unit_parsing() {
        assert_eq!("KM".parse::<DistanceUnit>().unwrap(), DistanceUnit::Km);
        assert_eq!("miles".parse::<DistanceUnit>().unwrap(), DistanceUnit::Mi);
        assert!("furlongs".parse::<DistanceUnit>().is_err());
    }
}
