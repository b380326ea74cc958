//! Test doubles for the transport and credential seams.
#![allow(dead_code)] // each test binary uses a subset of these

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use chatarc_client::error::{ClientError, Result};
use chatarc_client::{ApiRequest, ApiResponse, CredentialSupplier, Transport};

/// One scripted reply, consumed in order.
#[derive(Debug, Clone)]
pub enum Step {
    Status(u16),
    RateLimited { retry_after: Option<u64> },
    Body(Vec<u8>),
    TransportError(String),
}

/// Replays a fixed sequence of responses and records what was sent.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Step>>,
    pub calls: AtomicUsize,
    pub sent: Mutex<Vec<(String, Option<String>)>>,
}

impl ScriptedTransport {
    pub fn new(steps: Vec<Step>) -> ScriptedTransport {
        ScriptedTransport {
            script: Mutex::new(steps.into()),
            calls: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &ApiRequest) -> std::result::Result<ApiResponse, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.sent
            .lock()
            .unwrap()
            .push((request.url.clone(), request.bearer.clone()));

        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .expect("scripted transport exhausted");
        match step {
            Step::Status(status) => Ok(ApiResponse {
                status,
                retry_after: None,
                body: Vec::new(),
            }),
            Step::RateLimited { retry_after } => Ok(ApiResponse {
                status: 429,
                retry_after,
                body: Vec::new(),
            }),
            Step::Body(body) => Ok(ApiResponse {
                status: 200,
                retry_after: None,
                body,
            }),
            Step::TransportError(message) => Err(message),
        }
    }
}

/// Serves fixed bodies by exact URL; unknown URLs answer 404. Tracks per-URL
/// hit counts so tests can assert memoization.
pub struct RoutedTransport {
    routes: HashMap<String, Vec<u8>>,
    pub hits: Mutex<HashMap<String, usize>>,
}

impl RoutedTransport {
    pub fn new() -> RoutedTransport {
        RoutedTransport {
            routes: HashMap::new(),
            hits: Mutex::new(HashMap::new()),
        }
    }

    pub fn route(mut self, url: &str, body: impl Into<Vec<u8>>) -> RoutedTransport {
        self.routes.insert(url.to_owned(), body.into());
        self
    }

    pub fn hit_count(&self, url: &str) -> usize {
        self.hits.lock().unwrap().get(url).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Transport for RoutedTransport {
    async fn send(&self, request: &ApiRequest) -> std::result::Result<ApiResponse, String> {
        *self
            .hits
            .lock()
            .unwrap()
            .entry(request.url.clone())
            .or_insert(0) += 1;

        match self.routes.get(&request.url) {
            Some(body) => Ok(ApiResponse {
                status: 200,
                retry_after: None,
                body: body.clone(),
            }),
            None => Ok(ApiResponse {
                status: 404,
                retry_after: None,
                body: b"not found".to_vec(),
            }),
        }
    }
}

/// Hands out tokens from a queue; an exhausted queue means the supplier
/// failed.
pub struct QueueSupplier {
    tokens: Mutex<VecDeque<String>>,
}

impl QueueSupplier {
    pub fn new(tokens: &[&str]) -> QueueSupplier {
        QueueSupplier {
            tokens: Mutex::new(tokens.iter().map(|t| t.to_string()).collect()),
        }
    }
}

#[async_trait]
impl CredentialSupplier for QueueSupplier {
    async fn token(&self) -> Result<String> {
        self.tokens
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(ClientError::AuthExpired)
    }
}
