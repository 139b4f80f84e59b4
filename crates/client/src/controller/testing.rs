//! Test doubles for controller tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use fintrack_core::{MemoryStore, Snapshot};
use url::Url;

use super::{CacheController, ControllerConfig};
use crate::fetch::{FetchError, FetchRequest, Fetcher};

pub(crate) const SCOPE: &str = "http://localhost:8080/";

enum Route {
    Respond(u16, Vec<u8>),
    /// 206 with `partial` when the request carries a `Range` header, else 200 with `full`.
    Ranged { full: Vec<u8>, partial: Vec<u8> },
    Fail(FetchError),
}

/// Fetcher answering from a fixed route table.
///
/// Unknown URLs fail like an unreachable host; `go_offline` fails everything
/// and `hang` makes every fetch wait forever.
#[derive(Default)]
pub(crate) struct FakeFetcher {
    routes: Mutex<HashMap<String, Route>>,
    requests: Mutex<Vec<FetchRequest>>,
    offline: AtomicBool,
    hanging: AtomicBool,
}

impl FakeFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn route(self, url: &str, route: Route) -> Self {
        self.routes.lock().unwrap().insert(url.to_string(), route);
        self
    }

    pub(crate) fn serve(self, url: &str, status: u16, body: &str) -> Self {
        self.route(url, Route::Respond(status, body.as_bytes().to_vec()))
    }

    pub(crate) fn serve_ranged(self, url: &str, full: &str, partial: &str) -> Self {
        let route = Route::Ranged { full: full.as_bytes().to_vec(), partial: partial.as_bytes().to_vec() };
        self.route(url, route)
    }

    pub(crate) fn fail(self, url: &str, error: FetchError) -> Self {
        self.route(url, Route::Fail(error))
    }

    pub(crate) fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    pub(crate) fn set_hanging(&self, hanging: bool) {
        self.hanging.store(hanging, Ordering::SeqCst);
    }

    pub(crate) fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub(crate) fn calls_to(&self, url: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.url.as_str() == url)
            .count()
    }
}

#[async_trait::async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<Snapshot, FetchError> {
        self.requests.lock().unwrap().push(request.clone());

        if self.hanging.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(FetchError::Network("offline".into()));
        }

        let ranged = request.headers.iter().any(|(name, _)| name.eq_ignore_ascii_case("range"));
        let (status, body) = match self.routes.lock().unwrap().get(request.url.as_str()) {
            Some(Route::Respond(status, body)) => (*status, body.clone()),
            Some(Route::Ranged { partial, .. }) if ranged => (206, partial.clone()),
            Some(Route::Ranged { full, .. }) => (200, full.clone()),
            Some(Route::Fail(error)) => return Err(error.clone()),
            None => return Err(FetchError::Network(format!("unreachable: {}", request.url))),
        };
        Ok(Snapshot::new(
            request.url.as_str(),
            status,
            vec![("content-type".into(), "text/plain".into())],
            body,
        ))
    }
}

/// Controller for the default config at `SCOPE`, backed by a fresh memory store.
pub(crate) fn controller_with(fetcher: FakeFetcher) -> (CacheController, Arc<FakeFetcher>, Arc<MemoryStore>) {
    let config = ControllerConfig::new("finance-offline-v1", Url::parse(SCOPE).unwrap());
    controller_with_config(config, fetcher)
}

pub(crate) fn controller_with_config(
    config: ControllerConfig, fetcher: FakeFetcher,
) -> (CacheController, Arc<FakeFetcher>, Arc<MemoryStore>) {
    let fetcher = Arc::new(fetcher);
    let store = Arc::new(MemoryStore::new());
    let controller = CacheController::new(config, fetcher.clone(), store.clone());
    (controller, fetcher, store)
}
