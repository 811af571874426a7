//! Configuración de variables de entorno
//!
//! Todas las variables tienen un valor por defecto razonable salvo las
//! URLs de infraestructura, que solo se exigen cuando el backend elegido
//! las necesita.

use anyhow::{bail, Context, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::services::geo_service::DistanceUnit;

/// Almacén de viajes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "postgres" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => bail!("STORE desconocido: '{}' (postgres|memory)", other),
        }
    }
}

/// Transporte de canales
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportBackend {
    Redis,
    Local,
}

impl FromStr for TransportBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "redis" => Ok(TransportBackend::Redis),
            "local" => Ok(TransportBackend::Local),
            other => bail!("TRANSPORT desconocido: '{}' (redis|local)", other),
        }
    }
}

/// Configuración del entorno
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    pub environment: String,
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub store: StoreBackend,
    pub database_url: Option<String>,
    pub transport: TransportBackend,
    pub redis_url: Option<String>,
    pub dispatch_timeout: Duration,
    pub average_speed: f64,
    pub distance_unit: DistanceUnit,
    /// 0 desactiva el filtro por radio
    pub driver_search_radius: f64,
    pub notification_url: Option<String>,
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = var_or(key, default);
    raw.trim()
        .parse::<T>()
        .map_err(|e| anyhow::anyhow!("{} inválido ('{}'): {}", key, raw, e))
}

impl EnvironmentConfig {
    pub fn from_env() -> Result<Self> {
        let config = Self {
            environment: var_or("ENVIRONMENT", "development"),
            host: var_or("HOST", "0.0.0.0"),
            port: parse_var("PORT", "3000")?,
            cors_origins: var_or("CORS_ORIGINS", "*")
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            store: parse_var("STORE", "postgres")?,
            database_url: env::var("DATABASE_URL").ok(),
            transport: parse_var("TRANSPORT", "redis")?,
            redis_url: env::var("REDIS_URL").ok(),
            dispatch_timeout: Duration::from_secs(parse_var("DISPATCH_TIMEOUT_SECS", "10")?),
            average_speed: parse_var("AVERAGE_SPEED", "35")?,
            distance_unit: parse_var("DISTANCE_UNIT", "km")?,
            driver_search_radius: parse_var("DRIVER_SEARCH_RADIUS", "0")?,
            notification_url: env::var("NOTIFICATION_URL").ok().filter(|s| !s.is_empty()),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.store == StoreBackend::Postgres && self.database_url.is_none() {
            bail!("DATABASE_URL es obligatorio con STORE=postgres");
        }
        if self.transport == TransportBackend::Redis && self.redis_url.is_none() {
            bail!("REDIS_URL es obligatorio con TRANSPORT=redis");
        }
        if self.average_speed <= 0.0 {
            bail!("AVERAGE_SPEED debe ser positivo");
        }
        if self.driver_search_radius < 0.0 {
            bail!("DRIVER_SEARCH_RADIUS no puede ser negativo");
        }
        Ok(())
    }

    pub fn database_url(&self) -> Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL no configurado")
    }

    pub fn redis_url(&self) -> Result<&str> {
        self.redis_url.as_deref().context("REDIS_URL no configurado")
    }

    /// Verificar si estamos en modo desarrollo
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Obtener la dirección de escucha
    pub fn server_url(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_parsing() {
        assert_eq!("Memory".parse::<StoreBackend>().unwrap(), StoreBackend::Memory);
        assert_eq!(" redis ".parse::<TransportBackend>().unwrap(), TransportBackend::Redis);
        assert!("mongo".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn test_validate_requires_urls_for_backends() {
        let config = EnvironmentConfig {
            environment: "test".to_string(),
            host: "127.0.0.1".to_string(),
            port: 3000,
            cors_origins: vec!["*".to_string()],
            store: StoreBackend::Postgres,
            database_url: None,
            transport: TransportBackend::Local,
            redis_url: None,
            dispatch_timeout: Duration::from_secs(10),
            average_speed: 35.0,
            distance_unit: DistanceUnit::Km,
            driver_search_radius: 0.0,
            notification_url: None,
        };
        assert!(config.validate().is_err());

        let memory = EnvironmentConfig {
            store: StoreBackend::Memory,
            ..config
        };
        assert!(memory.validate().is_ok());
        assert_eq!(memory.server_url(), "127.0.0.1:3000");
        assert!(!memory.is_development());

        let development = EnvironmentConfig {
            environment: "development".to_string(),
            ..memory
        };
        assert!(development.is_development());
    }
}
