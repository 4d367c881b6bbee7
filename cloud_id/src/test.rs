//! Test doubles for the transport, the clock, and the shared cache

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
};

use aliri_clock::{Clock, UnixTime};
use async_trait::async_trait;
use cloud_id_cache::{CacheAdapter, CacheScope, CacheUnavailable, PersistOptions};

use crate::{
    error::TransportError,
    transport::{Transport, TransportResponse},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct RecordedCall {
    pub(crate) method: &'static str,
    pub(crate) url: String,
    pub(crate) body: Option<serde_json::Value>,
    pub(crate) headers: Vec<(String, String)>,
}

impl RecordedCall {
    pub(crate) fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Default)]
struct MockState {
    responses: HashMap<String, Result<TransportResponse, String>>,
    calls: Vec<RecordedCall>,
}

/// A transport answering from canned responses keyed by URL
///
/// URLs without a canned response yield a `404`.
#[derive(Clone, Debug, Default)]
pub(crate) struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(&self, url: &str, status: u16, body: impl Into<String>) {
        self.state
            .lock()
            .unwrap()
            .responses
            .insert(url.to_owned(), Ok(TransportResponse::new(status, body)));
    }

    pub(crate) fn fail(&self, url: &str, message: &str) {
        self.state
            .lock()
            .unwrap()
            .responses
            .insert(url.to_owned(), Err(message.to_owned()));
    }

    pub(crate) fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }

    fn answer(
        &self,
        method: &'static str,
        url: &str,
        body: Option<&serde_json::Value>,
        headers: &[(&str, &str)],
    ) -> Result<TransportResponse, TransportError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(RecordedCall {
            method,
            url: url.to_owned(),
            body: body.cloned(),
            headers: headers
                .iter()
                .map(|(n, v)| ((*n).to_owned(), (*v).to_owned()))
                .collect(),
        });

        match state.responses.get(url) {
            Some(Ok(response)) => Ok(response.clone()),
            Some(Err(message)) => Err(TransportError::new(message.clone())),
            None => Ok(TransportResponse::new(404, "")),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<TransportResponse, TransportError> {
        self.answer("GET", url, None, headers)
    }

    async fn post_json(
        &self,
        url: &str,
        body: Option<&serde_json::Value>,
        headers: &[(&str, &str)],
    ) -> Result<TransportResponse, TransportError> {
        self.answer("POST", url, body, headers)
    }
}

/// A clock that only moves when told to
#[derive(Clone, Debug, Default)]
pub(crate) struct ManualClock(Arc<AtomicU64>);

impl ManualClock {
    pub(crate) fn at(secs: u64) -> Self {
        Self(Arc::new(AtomicU64::new(secs)))
    }

    pub(crate) fn advance(&self, secs: u64) {
        self.0.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> UnixTime {
        UnixTime(self.0.load(Ordering::SeqCst))
    }
}

/// A cache whose backend is always down
#[derive(Clone, Debug, Default)]
pub(crate) struct FailingCache {
    attempts: Arc<AtomicU64>,
}

impl FailingCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// The number of reads and writes attempted
    pub(crate) fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }

    fn unavailable(&self) -> CacheUnavailable {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        CacheUnavailable::new("backend down")
    }
}

#[async_trait]
impl CacheAdapter for FailingCache {
    async fn get(&self, _: CacheScope, _: &str) -> Result<Option<String>, CacheUnavailable> {
        Err(self.unavailable())
    }

    async fn persist(
        &self,
        _: CacheScope,
        _: &str,
        _: &str,
        _: PersistOptions,
    ) -> Result<(), CacheUnavailable> {
        Err(self.unavailable())
    }
}
