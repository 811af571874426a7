//! Shared application state
//!
//! Este módulo define el estado compartido de la aplicación que se pasa
//! a través del router de Axum.

use std::sync::Arc;

use crate::config::environment::EnvironmentConfig;
use crate::controllers::{RideController, RideSocketController};
use crate::realtime::transport::ChannelTransport;
use crate::services::eligibility::default_policy;
use crate::services::geo_service::EtaCalculator;
use crate::services::{DispatchContext, DispatchService, LifecycleService, TrackingService};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<EnvironmentConfig>,
    pub transport: Arc<dyn ChannelTransport>,
    pub dispatch: Arc<DispatchService>,
    pub sockets: Arc<RideSocketController>,
    pub rides: Arc<RideController>,
}

impl AppState {
    /// Cablea los servicios del núcleo sobre los colaboradores ya elegidos
    pub fn new(config: EnvironmentConfig, ctx: DispatchContext) -> Self {
        let eligibility = Arc::new(default_policy(
            config.driver_search_radius,
            config.distance_unit,
        ));
        let calculator = EtaCalculator::new(config.distance_unit, config.average_speed);

        let dispatch = Arc::new(DispatchService::new(
            ctx.clone(),
            eligibility,
            config.dispatch_timeout,
        ));
        let lifecycle = Arc::new(LifecycleService::new(ctx.clone()));
        let tracking = Arc::new(TrackingService::new(ctx.clone(), calculator));

        let sockets = Arc::new(RideSocketController::new(
            Arc::clone(&ctx.transport),
            Arc::clone(&dispatch),
            lifecycle,
            tracking,
        ));

        Self {
            config: Arc::new(config),
            transport: Arc::clone(&ctx.transport),
            dispatch,
            sockets,
            rides: Arc::new(RideController::new(Arc::clone(&ctx.rides))),
        }
    }
}
