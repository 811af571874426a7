//! Temporizadores de expiración de despacho
//!
//! Una tarea programada y cancelable por viaje. Armar de nuevo un viaje
//! reemplaza el temporizador anterior; desarmar garantiza que la
//! expiración pendiente no se ejecute. Cada temporizador se resuelve
//! exactamente una vez: o expira, o se desarma.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tracing::debug;
use uuid::Uuid;

/// Lo que queda de un despacho al resolverse
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedDispatch {
    pub ride_id: Uuid,
    pub rider_id: Uuid,
    pub candidates: Vec<Uuid>,
}

struct ArmedDispatch {
    generation: u64,
    rider_id: Uuid,
    candidates: Vec<Uuid>,
    cancel: oneshot::Sender<()>,
}

#[derive(Default)]
struct TimersInner {
    next_generation: u64,
    armed: HashMap<Uuid, ArmedDispatch>,
}

#[derive(Clone, Default)]
pub struct DispatchTimers {
    inner: Arc<Mutex<TimersInner>>,
}

impl DispatchTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arma (o re-arma) el temporizador de `ride_id`
    pub async fn arm<F, Fut>(
        &self,
        ride_id: Uuid,
        rider_id: Uuid,
        candidates: Vec<Uuid>,
        timeout: Duration,
        on_expire: F,
    ) where
        F: FnOnce(ResolvedDispatch) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (cancel_tx, cancel_rx) = oneshot::channel();

        let generation = {
            let mut inner = self.inner.lock().await;
            inner.next_generation += 1;
            let generation = inner.next_generation;

            let mut candidates = candidates;
            if let Some(previous) = inner.armed.remove(&ride_id) {
                let _ = previous.cancel.send(());
                for id in previous.candidates {
                    if !candidates.contains(&id) {
                        candidates.push(id);
                    }
                }
            }

            inner.armed.insert(
                ride_id,
                ArmedDispatch {
                    generation,
                    rider_id,
                    candidates,
                    cancel: cancel_tx,
                },
            );
            generation
        };

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(timeout) => {
                    let expired = {
                        let mut guard = inner.lock().await;
                        let current = guard.armed.get(&ride_id).map(|armed| armed.generation);
                        if current == Some(generation) {
                            guard.armed.remove(&ride_id)
                        } else {
                            None
                        }
                    };
                    if let Some(armed) = expired {
                        debug!("⏰ Despacho {} expirado", ride_id);
                        on_expire(ResolvedDispatch {
                            ride_id,
                            rider_id: armed.rider_id,
                            candidates: armed.candidates,
                        })
                        .await;
                    }
                }
                _ = cancel_rx => {
                    debug!("🛑 Temporizador de {} cancelado", ride_id);
                }
            }
        });
    }

    /// Desarma el temporizador; `None` si no había ninguno armado
    pub async fn disarm(&self, ride_id: Uuid) -> Option<ResolvedDispatch> {
        let armed = self.inner.lock().await.armed.remove(&ride_id)?;
        let _ = armed.cancel.send(());

        Some(ResolvedDispatch {
            ride_id,
            rider_id: armed.rider_id,
            candidates: armed.candidates,
        })
    }

    pub async fn is_armed(&self, ride_id: Uuid) -> bool {
        self.inner.lock().await.armed.contains_key(&ride_id)
    }

    pub async fn armed_count(&self) -> usize {
        self.inner.lock().await.armed.len()
    }
}
