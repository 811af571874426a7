//! Services module
//!
//! Lógica de negocio del despacho: difusión y aceptación, máquina de
//! estados del viaje, seguimiento y cálculo de ETA.

pub mod context;
pub mod dispatch_service;
pub mod dispatch_timers;
pub mod eligibility;
pub mod geo_service;
pub mod lifecycle_service;
pub mod notification_service;
pub mod tracking_service;

pub use context::DispatchContext;
pub use dispatch_service::DispatchService;
pub use lifecycle_service::LifecycleService;
pub use tracking_service::TrackingService;
