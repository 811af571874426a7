//! Modelo de Ride
//!
//! Este módulo contiene el documento Ride, su máquina de estados y los
//! tipos de itinerario, tarifa, cancelación y seguimiento.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::Type;
use std::fmt;
use uuid::Uuid;
use validator::Validate;

use super::driver::Gender;

/// Estado del viaje - mapea al ENUM ride_status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "ride_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RideStatus {
    Pending,
    Booked,
    Accepted,
    Arrived,
    Started,
    Ended,
    Cancelled,
}

impl RideStatus {
    /// Estados que cuentan como "viaje activo" para un pasajero
    pub const ACTIVE: [RideStatus; 4] = [
        RideStatus::Booked,
        RideStatus::Accepted,
        RideStatus::Arrived,
        RideStatus::Started,
    ];

    /// Estados con conductor asignado y viaje sin terminar
    pub const IN_PROGRESS: [RideStatus; 3] =
        [RideStatus::Accepted, RideStatus::Arrived, RideStatus::Started];

    /// Estados desde los que se puede cancelar
    pub const CANCELLABLE: [RideStatus; 2] = [RideStatus::Booked, RideStatus::Accepted];

    pub fn as_str(&self) -> &'static str {
        match self {
            RideStatus::Pending => "pending",
            RideStatus::Booked => "booked",
            RideStatus::Accepted => "accepted",
            RideStatus::Arrived => "arrived",
            RideStatus::Started => "started",
            RideStatus::Ended => "ended",
            RideStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_active(&self) -> bool {
        Self::ACTIVE.contains(self)
    }

    pub fn is_in_progress(&self) -> bool {
        Self::IN_PROGRESS.contains(self)
    }
}

impl fmt::Display for RideStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Par de coordenadas en grados decimales
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Validate)]
pub struct Coordinates {
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// Dirección con coordenadas (pickup / dropoff)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
pub struct Location {
    #[validate(length(min = 1, max = 500))]
    pub address: String,
    #[validate]
    pub coordinates: Coordinates,
}

/// Parada intermedia del itinerario
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
pub struct Stop {
    pub address: Option<String>,
    #[validate]
    pub coordinates: Coordinates,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
}

/// Tarifa por parte: lo que paga el pasajero y lo que recibe el conductor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Fare {
    pub rider_amount: Decimal,
    pub driver_amount: Decimal,
    pub payment_status: PaymentStatus,
}

/// Importes que el pasajero envía al reservar; el estado de pago no viene del cliente
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FareRequest {
    pub rider_amount: Decimal,
    pub driver_amount: Decimal,
}

/// Quién canceló el viaje
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "cancelled_by", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CancelledBy {
    Rider,
    Driver,
    System,
}

impl CancelledBy {
    /// Nombre del evento saliente que describe la cancelación
    pub fn event_name(&self) -> &'static str {
        match self {
            CancelledBy::Rider => "ride-cancelled-by-passenger",
            CancelledBy::Driver => "ride-cancelled-by-driver",
            CancelledBy::System => "ride-cancelled-by-system",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CancellationRecord {
    pub cancelled_by: CancelledBy,
    pub canceller_id: Option<Uuid>,
    pub reason: Option<String>,
    pub description: Option<String>,
    pub cancelled_at: DateTime<Utc>,
}

/// Última posición conocida del conductor y ETA calculada
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Tracking {
    pub coordinates: Coordinates,
    pub eta_minutes: Option<i64>,
    pub updated_at: DateTime<Utc>,
}

/// Preferencias declaradas por el pasajero al reservar
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RidePreferences {
    pub driver_gender: Option<Gender>,
}

/// Ride principal - documento autoritativo enviado en cada evento
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Ride {
    pub id: Uuid,
    pub rider_id: Uuid,
    pub driver_id: Option<Uuid>,
    pub vehicle_id: Option<Uuid>,
    pub pickup: Location,
    pub dropoff: Location,
    pub stops: Vec<Stop>,
    pub total_distance: f64,
    pub fare: Fare,
    pub preferences: RidePreferences,
    pub status: RideStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_issued_at: Option<DateTime<Utc>>,
    pub pickup_verified: bool,
    pub cancellation: Option<CancellationRecord>,
    pub tracking: Option<Tracking>,
    pub created_at: DateTime<Utc>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Ride {
    /// Copia sin el código de verificación, para el canal del conductor
    pub fn without_verification_code(&self) -> Ride {
        Ride {
            verification_code: None,
            verification_issued_at: None,
            ..self.clone()
        }
    }

    /// La contraparte de `user_id` en este viaje, si `user_id` participa
    pub fn counterparty_of(&self, user_id: Uuid) -> Option<Option<Uuid>> {
        if user_id == self.rider_id {
            Some(self.driver_id)
        } else if self.driver_id == Some(user_id) {
            Some(Some(self.rider_id))
        } else {
            None
        }
    }
}

/// Datos necesarios para crear un viaje ya reservado
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewRide {
    pub rider_id: Uuid,
    #[validate]
    pub pickup: Location,
    #[validate]
    pub dropoff: Location,
    #[serde(default)]
    #[validate]
    pub stops: Vec<Stop>,
    #[validate(range(min = 0.0))]
    pub total_distance: f64,
    pub fare: FareRequest,
    #[serde(default)]
    pub preferences: RidePreferences,
    pub scheduled_at: Option<DateTime<Utc>>,
}

impl NewRide {
    /// Materializa el documento en estado `booked`
    pub fn into_booked(self) -> Ride {
        Ride {
            id: Uuid::new_v4(),
            rider_id: self.rider_id,
            driver_id: None,
            vehicle_id: None,
            pickup: self.pickup,
            dropoff: self.dropoff,
            stops: self.stops,
            total_distance: self.total_distance,
            fare: Fare {
                rider_amount: self.fare.rider_amount,
                driver_amount: self.fare.driver_amount,
                payment_status: PaymentStatus::Pending,
            },
            preferences: self.preferences,
            status: RideStatus::Booked,
            verification_code: None,
            verification_issued_at: None,
            pickup_verified: false,
            cancellation: None,
            tracking: None,
            created_at: Utc::now(),
            scheduled_at: self.scheduled_at,
            started_at: None,
            ended_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_groups() {
        assert!(RideStatus::Booked.is_active());
        assert!(!RideStatus::Booked.is_in_progress());
        assert!(RideStatus::Arrived.is_in_progress());
        assert!(!RideStatus::Ended.is_active());
        assert!(!RideStatus::Pending.is_active());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&RideStatus::Cancelled).unwrap();
        assert_eq!(json, "\"cancelled\"");
    }

    #[test]
    fn test_counterparty() {
        let rider = Uuid::new_v4();
        let driver = Uuid::new_v4();
        let mut ride = NewRide {
            rider_id: rider,
            pickup: Location {
                address: "A".to_string(),
                coordinates: Coordinates::new(0.0, 0.0),
            },
            dropoff: Location {
                address: "B".to_string(),
                coordinates: Coordinates::new(1.0, 1.0),
            },
            stops: vec![],
            total_distance: 10.0,
            fare: FareRequest {
                rider_amount: Decimal::new(1250, 2),
                driver_amount: Decimal::new(1000, 2),
            },
            preferences: RidePreferences::default(),
            scheduled_at: None,
        }
        .into_booked();

        assert_eq!(ride.counterparty_of(rider), Some(None));
        ride.driver_id = Some(driver);
        assert_eq!(ride.counterparty_of(rider), Some(Some(driver)));
        assert_eq!(ride.counterparty_of(driver), Some(Some(rider)));
        assert_eq!(ride.counterparty_of(Uuid::new_v4()), None);
    }

    #[test]
    fn test_booking_request_cannot_preset_payment() {
        let json = serde_json::json!({
            "riderId": Uuid::new_v4(),
            "pickup": {"address": "A", "coordinates": {"latitude": 0.0, "longitude": 0.0}},
            "dropoff": {"address": "B", "coordinates": {"latitude": 1.0, "longitude": 1.0}},
            "totalDistance": 3.5,
            "fare": {"riderAmount": "12.50", "driverAmount": "10.00", "paymentStatus": "paid"}
        });
        let request: NewRide = serde_json::from_value(json).unwrap();
        let ride = request.into_booked();

        assert_eq!(ride.fare.payment_status, PaymentStatus::Pending);
        assert_eq!(ride.fare.rider_amount, Decimal::new(1250, 2));
        assert_eq!(ride.status, RideStatus::Booked);
    }

    #[test]
    fn test_verification_code_hidden_for_driver() {
        let json = serde_json::json!({
            "id": Uuid::new_v4(),
            "riderId": Uuid::new_v4(),
            "driverId": null,
            "vehicleId": null,
            "pickup": {"address": "A", "coordinates": {"latitude": 0.0, "longitude": 0.0}},
            "dropoff": {"address": "B", "coordinates": {"latitude": 1.0, "longitude": 1.0}},
            "stops": [],
            "totalDistance": 3.5,
            "fare": {"riderAmount": "12.50", "driverAmount": "10.00", "paymentStatus": "paid"},
            "preferences": {"driverGender": null},
            "status": "arrived",
            "verificationCode": "4821",
            "pickupVerified": false,
            "cancellation": null,
            "tracking": null,
            "createdAt": "2026-01-01T00:00:00Z",
            "scheduledAt": null,
            "startedAt": null,
            "endedAt": null
        });
        let ride: Ride = serde_json::from_value(json).unwrap();
        assert_eq!(ride.verification_code.as_deref(), Some("4821"));

        let redacted = serde_json::to_value(ride.without_verification_code()).unwrap();
        assert!(redacted.get("verificationCode").is_none());
    }
}
