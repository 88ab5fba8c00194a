//! Lazy selection of the active cache backend
//!
//! The loader starts [`BackendState::Unresolved`]. The first caller either
//! connects the distributed backend or, if that fails, settles on the local
//! store for good. Only [`BackendLoader::reset`] goes back to unresolved.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::backend::{CacheBackend, ConnectionStatus};
use super::errors::CacheError;
use super::memory_cache::LocalCache;
use crate::infrastructure::clock::Clock;

/// Builds the distributed backend on first use
#[async_trait]
pub trait DistributedCacheFactory: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn CacheBackend>, CacheError>;
}

#[derive(Clone, Default)]
enum BackendState {
    #[default]
    Unresolved,
    Distributed(Arc<dyn CacheBackend>),
    LocalFallback,
}

#[derive(Default)]
struct LoaderState {
    backend: BackendState,
    local: Option<Arc<LocalCache>>,
}

/// Best-effort snapshot of the loader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BackendStatus {
    /// Whether the distributed backend is switched on
    pub distributed_enabled: bool,
    /// Whether a distributed client has been connected and memoized
    pub client_loaded: bool,
    pub connection: Option<ConnectionStatus>,
}

/// The resolved backend handed to the facade
#[derive(Clone)]
pub enum ActiveBackend {
    Distributed(Arc<dyn CacheBackend>),
    Local(Arc<LocalCache>),
}

impl ActiveBackend {
    pub fn handle(&self) -> Arc<dyn CacheBackend> {
        match self {
            Self::Distributed(backend) => backend.clone(),
            Self::Local(local) => local.clone(),
        }
    }

    pub fn is_distributed(&self) -> bool {
        matches!(self, Self::Distributed(_))
    }
}

pub struct BackendLoader {
    distributed_enabled: bool,
    factory: Option<Arc<dyn DistributedCacheFactory>>,
    clock: Arc<dyn Clock>,
    sweep_interval: Duration,
    state: Mutex<LoaderState>,
    /// Copy of the memoized distributed handle, readable without awaiting
    loaded: RwLock<Option<Arc<dyn CacheBackend>>>,
}

impl BackendLoader {
    /// A loader that tries `factory` on first use
    pub fn distributed(
        factory: Arc<dyn DistributedCacheFactory>,
        clock: Arc<dyn Clock>,
        sweep_interval: Duration,
    ) -> Self {
        Self {
            distributed_enabled: true,
            factory: Some(factory),
            clock,
            sweep_interval,
            state: Mutex::new(LoaderState::default()),
            loaded: RwLock::new(None),
        }
    }

    /// A loader that only ever serves the local store
    pub fn local_only(clock: Arc<dyn Clock>, sweep_interval: Duration) -> Self {
        Self {
            distributed_enabled: false,
            factory: None,
            clock,
            sweep_interval,
            state: Mutex::new(LoaderState::default()),
            loaded: RwLock::new(None),
        }
    }

    fn local_from(&self, state: &mut LoaderState) -> Arc<LocalCache> {
        state
            .local
            .get_or_insert_with(|| Arc::new(LocalCache::new(self.clock.clone(), self.sweep_interval)))
            .clone()
    }

    /// The shared local store, created on first request
    pub async fn local_store(&self) -> Arc<LocalCache> {
        let mut state = self.state.lock().await;
        self.local_from(&mut state)
    }

    /// Resolve the active backend
    ///
    /// Concurrent first calls wait on the same lock, so the factory runs at
    /// most once per resolution.
    pub async fn backend(&self) -> ActiveBackend {
        let mut state = self.state.lock().await;

        match &state.backend {
            BackendState::Distributed(backend) => {
                return ActiveBackend::Distributed(backend.clone());
            }
            BackendState::LocalFallback => {
                return ActiveBackend::Local(self.local_from(&mut state));
            }
            BackendState::Unresolved => {}
        }

        let Some(factory) = self.factory.clone() else {
            return ActiveBackend::Local(self.local_from(&mut state));
        };

        match factory.connect().await {
            Ok(backend) => {
                info!(
                    backend = backend.backend_name(),
                    "Using distributed cache backend"
                );
                state.backend = BackendState::Distributed(backend.clone());
                self.set_loaded(Some(backend.clone()));
                ActiveBackend::Distributed(backend)
            }
            Err(e) => {
                warn!(
                    error = %e,
                    "Distributed cache unavailable, falling back to local cache"
                );
                state.backend = BackendState::LocalFallback;
                ActiveBackend::Local(self.local_from(&mut state))
            }
        }
    }

    fn set_loaded(&self, backend: Option<Arc<dyn CacheBackend>>) {
        *self.loaded.write().unwrap_or_else(PoisonError::into_inner) = backend;
    }

    /// Snapshot of the loader without I/O
    ///
    /// Never blocks on an in-flight resolution or cache call.
    pub fn status(&self) -> BackendStatus {
        let backend = self
            .loaded
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        BackendStatus {
            distributed_enabled: self.distributed_enabled,
            client_loaded: backend.is_some(),
            connection: backend.map(|backend| backend.connection_status()),
        }
    }

    /// Disconnect every memoized backend and forget the resolution
    pub async fn reset(&self) {
        let previous = {
            let mut state = self.state.lock().await;
            self.set_loaded(None);
            std::mem::take(&mut *state)
        };

        if let BackendState::Distributed(backend) = previous.backend {
            backend.disconnect().await;
        }
        if let Some(local) = previous.local {
            local.disconnect().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingFactory {
        calls: AtomicUsize,
        succeed: bool,
        clock: Arc<dyn Clock>,
    }

    impl CountingFactory {
        fn new(succeed: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                succeed,
                clock: Arc::new(ManualClock::new(0)),
            })
        }
    }

    #[async_trait]
    impl DistributedCacheFactory for CountingFactory {
        async fn connect(&self) -> Result<Arc<dyn CacheBackend>, CacheError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            if self.succeed {
                // Any backend will do; the loader only memoizes the handle
                Ok(Arc::new(LocalCache::new(
                    self.clock.clone(),
                    Duration::from_secs(60),
                )))
            } else {
                Err(CacheError::connection("connection refused"))
            }
        }
    }

    fn loader(factory: Arc<CountingFactory>) -> BackendLoader {
        BackendLoader::distributed(
            factory,
            Arc::new(ManualClock::new(0)),
            Duration::from_secs(60),
        )
    }

    #[tokio::test]
    async fn test_local_only_never_distributed() {
        let loader = BackendLoader::local_only(Arc::new(ManualClock::new(0)), Duration::from_secs(60));

        assert!(!loader.backend().await.is_distributed());
        assert_eq!(
            loader.status(),
            BackendStatus {
                distributed_enabled: false,
                client_loaded: false,
                connection: None,
            }
        );
    }

    #[tokio::test]
    async fn test_local_store_is_shared() {
        let loader = BackendLoader::local_only(Arc::new(ManualClock::new(0)), Duration::from_secs(60));

        let a = loader.local_store().await;
        let b = loader.local_store().await;
        assert!(Arc::ptr_eq(&a, &b));

        match loader.backend().await {
            ActiveBackend::Local(c) => assert!(Arc::ptr_eq(&a, &c)),
            ActiveBackend::Distributed(_) => panic!("expected local backend"),
        }
    }

    #[tokio::test]
    async fn test_success_is_memoized() {
        let factory = CountingFactory::new(true);
        let loader = loader(factory.clone());

        assert!(loader.backend().await.is_distributed());
        assert!(loader.backend().await.is_distributed());
        assert_eq!(factory.calls.load(Ordering::SeqCst), 1);

        let status = loader.status();
        assert!(status.client_loaded);
        assert_eq!(status.connection, Some(ConnectionStatus::always_connected()));
    }

    #[tokio::test]
    async fn test_status_while_loader_is_busy() {
        let factory = CountingFactory::new(true);
        let loader = loader(factory);

        loader.backend().await;
        let _busy = loader.state.lock().await;

        let status = loader.status();
        assert!(status.client_loaded);
        assert_eq!(status.connection, Some(ConnectionStatus::always_connected()));
    }

    #[tokio::test]
    async fn test_reset_clears_status() {
        let factory = CountingFactory::new(true);
        let loader = loader(factory);

        loader.backend().await;
        loader.reset().await;
        assert!(!loader.status().client_loaded);
    }

    #[tokio::test]
    async fn test_failure_is_sticky() {
        let factory = CountingFactory::new(false);
        let loader = loader(factory.clone());

        for _ in 0..3 {
            assert!(!loader.backend().await.is_distributed());
        }
        assert_eq!(factory.calls.load(Ordering::SeqCst), 1);

        let status = loader.status();
        assert!(status.distributed_enabled);
        assert!(!status.client_loaded);
    }

    #[tokio::test]
    async fn test_concurrent_first_calls_connect_once() {
        let factory = CountingFactory::new(true);
        let loader = Arc::new(loader(factory.clone()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let loader = loader.clone();
                tokio::spawn(async move { loader.backend().await.is_distributed() })
            })
            .collect();

        for handle in handles {
            assert!(handle.await.unwrap());
        }
        assert_eq!(factory.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reset_allows_new_resolution() {
        let factory = CountingFactory::new(false);
        let loader = loader(factory.clone());

        loader.backend().await;
        loader.reset().await;
        loader.backend().await;

        assert_eq!(factory.calls.load(Ordering::SeqCst), 2);
    }
}
