//! Utilidades compartidas por los tests de integración
#![allow(dead_code)]

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

use ride_dispatch::controllers::RideSocketController;
use ride_dispatch::dto::events::{InboundEvent, OutboundMessage};
use ride_dispatch::models::{
    Coordinates, Driver, FareRequest, Gender, Location, NewRide, PaymentStatus, Ride, RidePreferences,
    RideStatus, Vehicle,
};
use ride_dispatch::realtime::{user_channel, ChannelTransport, Connection, LocalTransport};
use ride_dispatch::repositories::{
    InMemoryDriverDirectory, InMemoryRideStore, InMemoryVehicleDirectory, RideGuard, RideStore,
    RideUpdate,
};
use ride_dispatch::services::eligibility::default_policy;
use ride_dispatch::services::geo_service::{DistanceUnit, EtaCalculator};
use ride_dispatch::services::notification_service::LogNotificationSink;
use ride_dispatch::utils::errors::AppResult;
use ride_dispatch::services::{DispatchContext, DispatchService, LifecycleService, TrackingService};

pub const DISPATCH_TIMEOUT: Duration = Duration::from_secs(10);

pub struct Harness {
    pub rides: InMemoryRideStore,
    pub drivers: InMemoryDriverDirectory,
    pub vehicles: InMemoryVehicleDirectory,
    pub transport: Arc<LocalTransport>,
    pub dispatch: Arc<DispatchService>,
    pub lifecycle: Arc<LifecycleService>,
    pub tracking: Arc<TrackingService>,
    pub sockets: Arc<RideSocketController>,
}

impl Harness {
    pub fn new() -> Self {
        let rides = InMemoryRideStore::new();
        let drivers = InMemoryDriverDirectory::new();
        let vehicles = InMemoryVehicleDirectory::new();
        let transport = Arc::new(LocalTransport::new());

        let ctx = DispatchContext {
            rides: Arc::new(rides.clone()),
            drivers: Arc::new(drivers.clone()),
            vehicles: Arc::new(vehicles.clone()),
            transport: transport.clone(),
            notifier: Arc::new(LogNotificationSink),
        };

        let dispatch = Arc::new(DispatchService::new(
            ctx.clone(),
            Arc::new(default_policy(0.0, DistanceUnit::Km)),
            DISPATCH_TIMEOUT,
        ));
        let lifecycle = Arc::new(LifecycleService::new(ctx.clone()));
        let tracking = Arc::new(TrackingService::new(
            ctx.clone(),
            EtaCalculator::new(DistanceUnit::Km, 35.0),
        ));
        let sockets = Arc::new(RideSocketController::new(
            transport.clone(),
            dispatch.clone(),
            lifecycle.clone(),
            tracking.clone(),
        ));

        Self {
            rides,
            drivers,
            vehicles,
            transport,
            dispatch,
            lifecycle,
            tracking,
            sockets,
        }
    }

    /// Igual que `new`, con el listener de señales ya en marcha
    pub fn with_signal_listener() -> Self {
        let harness = Self::new();
        let _listener = harness.dispatch.spawn_signal_listener();
        harness
    }

    pub async fn booked_ride(&self, rider_id: Uuid) -> Ride {
        self.rides.create(new_ride(rider_id)).await.unwrap()
    }

    pub async fn try_book(&self, rider_id: Uuid) -> AppResult<Ride> {
        self.rides.create(new_ride(rider_id)).await
    }

    pub async fn booked_ride_with(&self, ride: NewRide) -> Ride {
        self.rides.create(ride).await.unwrap()
    }

    pub async fn add_driver(&self, gender: Option<Gender>) -> Uuid {
        let driver_id = self.add_driver_without_vehicle(gender).await;
        self.vehicles
            .insert(Vehicle {
                id: Uuid::new_v4(),
                owner_id: driver_id,
                license_plate: format!("{}-RD", &driver_id.simple().to_string()[..6]),
                brand: Some("Toyota".to_string()),
                model: Some("Prius".to_string()),
                color: Some("blanco".to_string()),
                created_at: Utc::now(),
            })
            .await;
        driver_id
    }

    pub async fn add_driver_without_vehicle(&self, gender: Option<Gender>) -> Uuid {
        let driver_id = Uuid::new_v4();
        self.drivers
            .insert(Driver {
                id: driver_id,
                full_name: "Conductor de prueba".to_string(),
                gender,
                last_location: Some(Coordinates::new(40.4168, -3.7038)),
            })
            .await;
        driver_id
    }

    pub async fn ride(&self, ride_id: Uuid) -> Ride {
        self.rides.find_by_id(ride_id).await.unwrap().unwrap()
    }

    /// El cobro es externo al núcleo
    pub async fn mark_paid(&self, ride_id: Uuid) {
        let update = RideUpdate {
            payment_status: Some(PaymentStatus::Paid),
            ..Default::default()
        };
        self.rides
            .find_one_and_update(ride_id, &RideGuard::any_of(&RideStatus::ACTIVE), &update)
            .await
            .unwrap()
            .expect("ride must be active to be paid");
    }

    /// Viaje `accepted` por un conductor con vehículo
    pub async fn accepted_ride(&self) -> (Ride, Uuid) {
        let rider_id = Uuid::new_v4();
        let driver_id = self.add_driver(None).await;
        let ride = self.booked_ride(rider_id).await;
        let accepted = self.dispatch.accept_ride(ride.id, driver_id).await.unwrap();
        (accepted.ride, driver_id)
    }

    pub async fn client(&self, user_id: Uuid) -> Client {
        let (tx, rx) = mpsc::unbounded_channel();
        let connection = Connection::new(tx);
        self.transport.join(&user_channel(user_id), &connection).await;
        Client { connection, rx }
    }

    /// Envía un evento como lo haría un socket y devuelve la respuesta directa
    pub async fn send(&self, client: &Client, frame: Value) -> OutboundMessage {
        let event: InboundEvent = serde_json::from_value(frame).unwrap();
        self.sockets.handle(&client.connection, event).await
    }
}

pub struct Client {
    pub connection: Connection,
    rx: mpsc::UnboundedReceiver<OutboundMessage>,
}

impl Client {
    /// Espera el siguiente mensaje con ese `event`, descartando los demás
    pub async fn next_event(&mut self, event: &str) -> OutboundMessage {
        let wait = async {
            loop {
                match self.rx.recv().await {
                    Some(msg) if msg.event == event => return msg,
                    Some(_) => continue,
                    None => panic!("channel closed while waiting for '{}'", event),
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(60), wait)
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for '{}'", event))
    }

    /// Mensajes ya entregados, sin esperar
    pub fn drain(&mut self) -> Vec<OutboundMessage> {
        let mut messages = Vec::new();
        while let Ok(msg) = self.rx.try_recv() {
            messages.push(msg);
        }
        messages
    }

    pub fn drain_events(&mut self) -> Vec<String> {
        self.drain().into_iter().map(|m| m.event).collect()
    }
}

pub fn new_ride(rider_id: Uuid) -> NewRide {
    NewRide {
        rider_id,
        pickup: Location {
            address: "Puerta del Sol".to_string(),
            coordinates: Coordinates::new(40.4169, -3.7035),
        },
        dropoff: Location {
            address: "Estadio Santiago Bernabéu".to_string(),
            coordinates: Coordinates::new(40.4531, -3.6883),
        },
        stops: vec![],
        total_distance: 4.6,
        fare: FareRequest {
            rider_amount: Decimal::new(1450, 2),
            driver_amount: Decimal::new(1160, 2),
        },
        preferences: RidePreferences::default(),
        scheduled_at: None,
    }
}
