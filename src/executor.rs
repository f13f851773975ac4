//! Single-request GraphQL execution with response validation.
//!
//! A [`QueryExecutor`] sends one document through a [`Transport`], hands the
//! raw response to a [`ResponseSink`] for offline inspection and turns
//! API-reported failures into [`DigestError`]s.

use std::{
    path::PathBuf,
    sync::atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::{
    error::{DigestError, Location},
    graphql::operation_line,
};

/// Variables for one GraphQL request.
pub type Variables = serde_json::Map<String, Value>;

/// The HTTP/auth layer: posts one document and returns the decoded body.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, query: &str, variables: &Variables) -> Result<Value, DigestError>;
}

/// Receives every raw response, numbered in call order.
#[async_trait]
pub trait ResponseSink: Send + Sync {
    async fn record(&self, sequence: usize, response: &Value) -> Result<(), DigestError>;
}

/// Sink that keeps nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct Discard;

#[async_trait]
impl ResponseSink for Discard {
    async fn record(&self, _sequence: usize, _response: &Value) -> Result<(), DigestError> {
        Ok(())
    }
}

/// Writes each response to `<dir>/out_NN.json`.
#[derive(Debug, Clone)]
pub struct JsonDumpDir {
    dir: PathBuf,
}

impl JsonDumpDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn file_name(sequence: usize) -> String {
        format!("out_{sequence:02}.json")
    }
}

#[async_trait]
impl ResponseSink for JsonDumpDir {
    async fn record(&self, sequence: usize, response: &Value) -> Result<(), DigestError> {
        let path = self.dir.join(Self::file_name(sequence));
        let text = serde_json::to_string_pretty(response).map_err(|e| DigestError::Io {
            path: path.clone(),
            source: e.into(),
        })?;
        tokio::fs::write(&path, text)
            .await
            .map_err(|source| DigestError::Io { path, source })
    }
}

/// Runs GraphQL documents and validates what comes back.
pub struct QueryExecutor<T> {
    transport: T,
    sink: Box<dyn ResponseSink>,
    sequence: AtomicUsize,
}

impl<T: Transport> QueryExecutor<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            sink: Box::new(Discard),
            sequence: AtomicUsize::new(0),
        }
    }

    pub fn with_sink(mut self, sink: impl ResponseSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Number of requests issued so far.
    pub fn requests_issued(&self) -> usize {
        self.sequence.load(Ordering::SeqCst)
    }

    /// Executes one query. The response is recorded before it is checked, so
    /// failing responses are kept too.
    pub async fn execute(&self, query: &str, variables: &Variables) -> Result<Value, DigestError> {
        let logged_variables = Value::Object(variables.clone());
        debug!(
            operation = operation_line(query),
            variables = %logged_variables,
            "Executing GraphQL query"
        );

        let response = self.transport.execute(query, variables).await?;
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        self.sink.record(sequence, &response).await?;

        check_response(response)
    }
}

/// Rejects responses that report a failure, in the order the API can
/// produce them: transport message, query errors, null data.
pub fn check_response(response: Value) -> Result<Value, DigestError> {
    if let Some(message) = response.get("message") {
        let message = message
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| message.to_string());
        return Err(DigestError::Transport(message));
    }

    if let Some(first) = response
        .get("errors")
        .and_then(Value::as_array)
        .and_then(|errors| errors.first())
    {
        return Err(query_error(first));
    }

    if response.get("data").is_some_and(Value::is_null) {
        return Err(DigestError::EmptyResult);
    }

    Ok(response)
}

fn query_error(error: &Value) -> DigestError {
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("unknown error")
        .to_string();

    let path = error.get("path").and_then(Value::as_array).map(|segments| {
        segments
            .iter()
            .map(|segment| match segment {
                Value::String(field) => field.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(".")
    });

    let location = error
        .get("locations")
        .and_then(Value::as_array)
        .and_then(|locations| locations.first())
        .and_then(|loc| {
            Some(Location {
                line: loc.get("line")?.as_u64()?,
                column: loc.get("column")?.as_u64()?,
            })
        });

    DigestError::Query {
        message,
        path,
        location,
    }
}
