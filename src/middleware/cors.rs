//! Middleware de CORS

use axum::http::{HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::warn;

/// Orígenes explícitos; `None` significa cualquier origen.
///
/// `*` (o lista vacía) solo abre CORS en desarrollo; fuera de él se
/// ignora y quedan únicamente los orígenes concretos de la lista.
fn allowed_origins(origins: &[String], development: bool) -> Option<Vec<HeaderValue>> {
    let wildcard = origins.is_empty() || origins.iter().any(|o| o == "*");
    if wildcard && development {
        return None;
    }
    if wildcard {
        warn!("⚠️ CORS_ORIGINS='*' ignorado fuera de desarrollo; solo se aceptan orígenes explícitos");
    }

    Some(
        origins
            .iter()
            .filter(|o| o.as_str() != "*")
            .filter_map(|origin| HeaderValue::from_str(origin).ok())
            .collect(),
    )
}

pub fn cors_layer(origins: &[String], development: bool) -> CorsLayer {
    let Some(allowed) = allowed_origins(origins, development) else {
        return CorsLayer::very_permissive();
    };

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            HeaderName::from_static("content-type"),
            HeaderName::from_static("accept"),
            HeaderName::from_static("origin"),
        ])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origins(list: &[&str]) -> Vec<String> {
        list.iter().map(|o| o.to_string()).collect()
    }

    #[test]
    fn test_wildcard_only_in_development() {
        assert_eq!(allowed_origins(&origins(&["*"]), true), None);
        assert_eq!(allowed_origins(&[], true), None);

        assert_eq!(allowed_origins(&origins(&["*"]), false), Some(vec![]));
        assert_eq!(allowed_origins(&[], false), Some(vec![]));
    }

    #[test]
    fn test_explicit_origins_are_kept() {
        let allowed = allowed_origins(
            &origins(&["https://app.example.com", "*", "http://localhost:3000"]),
            false,
        )
        .unwrap();
        assert_eq!(
            allowed,
            vec![
                HeaderValue::from_static("https://app.example.com"),
                HeaderValue::from_static("http://localhost:3000"),
            ]
        );
    }
}
