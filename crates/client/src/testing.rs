//! In-crate fakes for the network and storage seams.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use shelter_core::{AppConfig, CacheStorage, Error, MemoryCacheStorage, Request, RequestKey, Response};

use crate::fetch::Network;
use crate::worker::Policy;

/// Policy for generation `app-v2` served from `https://app.example.com/`
/// with manifest `./`, `index.html`, `offline.html`.
pub(crate) fn test_policy() -> Policy {
    let config = AppConfig {
        cache_name: "app-v2".into(),
        origin: "https://app.example.com/".into(),
        manifest: vec!["./".into(), "index.html".into(), "offline.html".into()],
        ..Default::default()
    };
    Policy::from_config(&config).unwrap()
}

#[derive(Clone)]
enum Reply {
    Respond(Response),
    RespondAfter(Duration, Response),
    Fail,
    Hang,
}

/// Scripted [`Network`]: each URL gets a canned reply, unknown URLs fail.
#[derive(Default)]
pub(crate) struct StubNetwork {
    routes: Mutex<HashMap<String, Reply>>,
    calls: AtomicUsize,
    requested: Mutex<Vec<String>>,
}

impl StubNetwork {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn route(self, url: &str, reply: Reply) -> Self {
        self.routes.lock().unwrap().insert(url.to_string(), reply);
        self
    }

    pub(crate) fn respond(self, url: &str, status: u16, body: &'static str) -> Self {
        self.route(url, Reply::Respond(Response::new(status, body)))
    }

    pub(crate) fn respond_after(self, url: &str, delay: Duration, status: u16, body: &'static str) -> Self {
        self.route(url, Reply::RespondAfter(delay, Response::new(status, body)))
    }

    pub(crate) fn fail(self, url: &str) -> Self {
        self.route(url, Reply::Fail)
    }

    pub(crate) fn hang(self, url: &str) -> Self {
        self.route(url, Reply::Hang)
    }

    /// Total number of network calls issued.
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of calls issued for `url`.
    pub(crate) fn calls_for(&self, url: &str) -> usize {
        self.requested.lock().unwrap().iter().filter(|u| u.as_str() == url).count()
    }
}

#[async_trait::async_trait]
impl Network for StubNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let url = request.url.as_str().to_string();
        self.requested.lock().unwrap().push(url.clone());

        let reply = self.routes.lock().unwrap().get(&url).cloned();
        match reply {
            Some(Reply::Respond(response)) => Ok(response.with_url(request.url.clone())),
            Some(Reply::RespondAfter(delay, response)) => {
                tokio::time::sleep(delay).await;
                Ok(response.with_url(request.url.clone()))
            }
            Some(Reply::Fail) => Err(Error::Network(format!("{url}: connection refused"))),
            Some(Reply::Hang) => std::future::pending().await,
            None => Err(Error::Network(format!("{url}: no route to host"))),
        }
    }
}

/// [`CacheStorage`] whose every operation fails like an exhausted quota.
pub(crate) struct FailingStorage;

fn quota() -> Error {
    Error::Storage("quota exceeded".into())
}

#[async_trait::async_trait]
impl CacheStorage for FailingStorage {
    async fn open(&self, _generation: &str) -> Result<(), Error> {
        Err(quota())
    }

    async fn match_request(&self, _generation: &str, _key: &RequestKey) -> Result<Option<Response>, Error> {
        Err(quota())
    }

    async fn put(&self, _generation: &str, _key: &RequestKey, _response: &Response) -> Result<(), Error> {
        Err(quota())
    }

    async fn delete(&self, _generation: &str) -> Result<bool, Error> {
        Err(quota())
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        Err(quota())
    }
}

/// Memory storage that refuses to delete one generation.
pub(crate) struct StuckGeneration {
    pub(crate) inner: MemoryCacheStorage,
    pub(crate) stuck: &'static str,
}

#[async_trait::async_trait]
impl CacheStorage for StuckGeneration {
    async fn open(&self, generation: &str) -> Result<(), Error> {
        self.inner.open(generation).await
    }

    async fn match_request(&self, generation: &str, key: &RequestKey) -> Result<Option<Response>, Error> {
        self.inner.match_request(generation, key).await
    }

    async fn put(&self, generation: &str, key: &RequestKey, response: &Response) -> Result<(), Error> {
        self.inner.put(generation, key, response).await
    }

    async fn delete(&self, generation: &str) -> Result<bool, Error> {
        if generation == self.stuck {
            return Err(Error::Storage(format!("{generation} is locked")));
        }
        self.inner.delete(generation).await
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        self.inner.keys().await
    }
}
