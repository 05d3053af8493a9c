//! The remote side.
//!
//! The engine never talks to the network itself. A [`Transport`] receives a
//! [`Request`] and resolves to one [`Response`] or one [`TransportError`];
//! verbs, headers and body encoding are the transport's business.

use crate::event::{EventKind, Source};
use crate::options::SetOptions;
use crate::{Attributes, Error, Result, Store, TransportError};
use futures::future::LocalBoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// The five persistence operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Read,
    Update,
    Patch,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Patch => "patch",
            Operation::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// One request handed to the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub operation: Operation,
    pub url: String,
    /// Query string values, already merged from every source
    pub query: Attributes,
    /// Entity representation for create, update and patch
    pub body: Option<Value>,
}

impl Request {
    pub fn new(operation: Operation, url: impl Into<String>) -> Self {
        Self {
            operation,
            url: url.into(),
            query: Attributes::new(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_query(mut self, query: Attributes) -> Self {
        self.query = query;
        self
    }
}

/// A successful response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub body: Value,
    pub headers: BTreeMap<String, String>,
}

impl Response {
    pub fn new(body: Value) -> Self {
        Self {
            body,
            headers: BTreeMap::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Look up a header, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Carries requests to the remote resource.
///
/// Implementations own their configuration (base address, credentials,
/// headers). Dropping the returned future cancels the request.
pub trait Transport {
    fn sync(
        &self,
        request: Request,
    ) -> LocalBoxFuture<'static, std::result::Result<Response, TransportError>>;
}

/// Request bookkeeping of a record or collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub loading: bool,
    pub saving: bool,
    pub deleting: bool,
    pub syncing: bool,
}

impl Status {
    fn begin(operation: Operation) -> Self {
        Self {
            loading: operation == Operation::Read,
            saving: matches!(
                operation,
                Operation::Create | Operation::Update | Operation::Patch
            ),
            deleting: operation == Operation::Delete,
            syncing: true,
        }
    }

    /// Whether a request is in flight.
    pub fn is_busy(&self) -> bool {
        self.syncing
    }
}

/// Send `request` on behalf of `source`.
///
/// Emits `Request` before handing it over. On failure emits `Error` on the
/// source and returns it; on success the caller reconciles the response and
/// emits `Sync`.
pub(crate) async fn dispatch(
    source: &Source,
    store: &Store,
    request: Request,
    options: &SetOptions,
) -> Result<Response> {
    let transport = store.transport().ok_or(Error::NoTransport)?;
    let operation = request.operation;

    tracing::debug!(%operation, url = %request.url, "dispatching request");
    source.set_status(Status::begin(operation));
    source.channel().emit(crate::Event {
        source: source.clone(),
        kind: EventKind::Request(operation),
        options: options.clone(),
    });

    let result = transport.sync(request).await;
    source.set_status(Status::default());

    result.map_err(|err| {
        tracing::warn!(%operation, status = ?err.status, error = %err, "request failed");
        source.channel().emit(crate::Event {
            source: source.clone(),
            kind: EventKind::Error(err.clone()),
            options: options.clone(),
        });
        Error::Transport(err)
    })
}
