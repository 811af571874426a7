//! Métricas Prometheus del despacho

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Once;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref RIDE_REQUESTS: IntCounter =
        IntCounter::new("ride_requests_total", "Ride requests received for dispatch")
            .expect("metric can be created");
    pub static ref RIDE_BROADCASTS: IntCounter = IntCounter::new(
        "ride_broadcasts_total",
        "New ride request events sent to candidate drivers"
    )
    .expect("metric can be created");
    pub static ref RIDE_ACCEPTANCES: IntCounter =
        IntCounter::new("ride_acceptances_total", "Rides accepted by a driver")
            .expect("metric can be created");
    pub static ref ACCEPTANCE_RACES_LOST: IntCounter = IntCounter::new(
        "ride_acceptance_races_lost_total",
        "Acceptance attempts that found the ride no longer booked"
    )
    .expect("metric can be created");
    pub static ref RIDE_EXPIRATIONS: IntCounter = IntCounter::new(
        "ride_expirations_total",
        "Dispatch windows that closed without an acceptance"
    )
    .expect("metric can be created");
    pub static ref RIDE_CANCELLATIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("ride_cancellations_total", "Cancelled rides by party"),
        &["cancelled_by"]
    )
    .expect("metric can be created");
    pub static ref RIDE_TRANSITIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("ride_transitions_total", "Successful lifecycle transitions"),
        &["to"]
    )
    .expect("metric can be created");
}

static REGISTER: Once = Once::new();

/// Registrar todas las métricas (idempotente)
pub fn register_metrics() {
    REGISTER.call_once(|| {
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(RIDE_REQUESTS.clone()),
            Box::new(RIDE_BROADCASTS.clone()),
            Box::new(RIDE_ACCEPTANCES.clone()),
            Box::new(ACCEPTANCE_RACES_LOST.clone()),
            Box::new(RIDE_EXPIRATIONS.clone()),
            Box::new(RIDE_CANCELLATIONS.clone()),
            Box::new(RIDE_TRANSITIONS.clone()),
        ];
        for collector in collectors {
            if let Err(e) = REGISTRY.register(collector) {
                tracing::warn!("⚠️ No se pudo registrar métrica: {}", e);
            }
        }
    });
}

/// Exportar en formato texto de Prometheus
pub fn render() -> String {
    let mut buffer = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer) {
        tracing::error!("❌ Error codificando métricas: {}", e);
    }
    String::from_utf8(buffer).unwrap_or_default()
}
