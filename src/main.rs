use anyhow::Result;
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use ride_dispatch::config::database::{run_migrations, DatabaseConfig};
use ride_dispatch::config::{EnvironmentConfig, StoreBackend, TransportBackend};
use ride_dispatch::realtime::{ChannelTransport, LocalTransport, RedisTransport};
use ride_dispatch::repositories::{
    DriverDirectory, DriverRepository, InMemoryDriverDirectory, InMemoryRideStore,
    InMemoryVehicleDirectory, RideRepository, RideStore, VehicleDirectory, VehicleRepository,
};
use ride_dispatch::routes::create_router;
use ride_dispatch::services::notification_service::{
    HttpNotificationSink, LogNotificationSink, NotificationSink,
};
use ride_dispatch::services::DispatchContext;
use ride_dispatch::state::AppState;
use ride_dispatch::utils::metrics;

const BUS_CHANNEL: &str = "ride-dispatch:bus";

type Stores = (
    Arc<dyn RideStore>,
    Arc<dyn DriverDirectory>,
    Arc<dyn VehicleDirectory>,
);

#[tokio::main]
async fn main() -> Result<()> {
    // Cargar variables de entorno
    dotenv().ok();

    // Configurar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("🚕 Ride Dispatch - Coordinador de viajes en tiempo real");
    info!("======================================================");

    let config = EnvironmentConfig::from_env()?;
    metrics::register_metrics();

    let (rides, drivers, vehicles) = match build_stores(&config).await {
        Ok(stores) => stores,
        Err(e) => {
            error!("❌ Error inicializando el almacén: {}", e);
            return Err(e);
        }
    };

    let transport: Arc<dyn ChannelTransport> = match config.transport {
        TransportBackend::Redis => {
            let transport = RedisTransport::connect(config.redis_url()?, BUS_CHANNEL)
                .await
                .map_err(|e| {
                    error!("❌ Error conectando a Redis: {}", e);
                    e
                })?;
            info!("✅ Redis conectado, bus '{}'", BUS_CHANNEL);
            Arc::new(transport)
        }
        TransportBackend::Local => {
            warn!("⚠️ Transporte local: sin difusión entre procesos");
            Arc::new(LocalTransport::new())
        }
    };

    let notifier: Arc<dyn NotificationSink> = match &config.notification_url {
        Some(url) => Arc::new(HttpNotificationSink::new(url.clone())?),
        None => Arc::new(LogNotificationSink),
    };

    let ctx = DispatchContext {
        rides,
        drivers,
        vehicles,
        transport,
        notifier,
    };

    let addr: SocketAddr = config.server_url().parse()?;
    let dispatch_timeout = config.dispatch_timeout;
    let state = AppState::new(config, ctx);
    let signal_listener = state.dispatch.spawn_signal_listener();
    let app = create_router(state);

    info!("🌐 Servidor iniciando en http://{}", addr);
    info!("🔍 Endpoints disponibles:");
    info!("   GET  /health - Estado del servicio");
    info!("   GET  /metrics - Métricas Prometheus");
    info!("   GET  /ws - Canal WebSocket de eventos");
    info!("   POST /api/rides - Reservar viaje");
    info!("   GET  /api/rides/:id - Obtener viaje");
    info!("⏱️ Ventana de aceptación: {}s", dispatch_timeout.as_secs());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("❌ Error del servidor: {}", e);
    }

    signal_listener.abort();
    info!("👋 Servidor terminado");
    Ok(())
}

async fn build_stores(config: &EnvironmentConfig) -> Result<Stores> {
    match config.store {
        StoreBackend::Postgres => {
            let pool = DatabaseConfig::new(config.database_url()?)
                .create_pool()
                .await?;
            info!("✅ Base de datos conectada");
            run_migrations(&pool).await?;

            let rides: Arc<dyn RideStore> = Arc::new(RideRepository::new(pool.clone()));
            let drivers: Arc<dyn DriverDirectory> = Arc::new(DriverRepository::new(pool.clone()));
            let vehicles: Arc<dyn VehicleDirectory> = Arc::new(VehicleRepository::new(pool));
            Ok((rides, drivers, vehicles))
        }
        StoreBackend::Memory => {
            warn!("⚠️ Almacén en memoria: los datos se pierden al reiniciar");
            let rides: Arc<dyn RideStore> = Arc::new(InMemoryRideStore::new());
            let drivers: Arc<dyn DriverDirectory> = Arc::new(InMemoryDriverDirectory::new());
            let vehicles: Arc<dyn VehicleDirectory> = Arc::new(InMemoryVehicleDirectory::new());
            Ok((rides, drivers, vehicles))
        }
    }
}

/// Señal de apagado graceful
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("❌ No se pudo instalar el manejador de Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("❌ No se pudo instalar el manejador de SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("🛑 Señal Ctrl+C recibida, apagando servidor...");
        },
        _ = terminate => {
            info!("🛑 Señal de terminación recibida, apagando servidor...");
        },
    }
}
