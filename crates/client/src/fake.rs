//! In-memory transport for tests.

use crate::error::{ClientError, ClientResult};
use crate::transport::OpenmrsTransport;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Clone, Debug, PartialEq)]
pub struct Call {
    pub method: &'static str,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

/// Answers each path with a canned JSON value or an HTTP status, and records every call.
#[derive(Default)]
pub struct FakeTransport {
    responses: Mutex<HashMap<String, Result<Value, u16>>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, path: &str, value: Value) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(path.to_string(), Ok(value));
        self
    }

    pub fn fail(self, path: &str, status: u16) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(path.to_string(), Err(status));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn answer(&self, call: Call) -> ClientResult<Value> {
        let path = call.path.clone();
        self.calls.lock().unwrap().push(call);
        match self.responses.lock().unwrap().get(&path) {
            Some(Ok(value)) => Ok(value.clone()),
            Some(Err(status)) => Err(ClientError::Status {
                url: path,
                status: *status,
                body: String::new(),
            }),
            None => Ok(Value::Null),
        }
    }
}

#[async_trait]
impl OpenmrsTransport for FakeTransport {
    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> ClientResult<Value> {
        self.answer(Call {
            method: "GET",
            path: path.to_string(),
            query: query
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
            body: None,
        })
    }

    async fn post_json(&self, path: &str, body: &Value) -> ClientResult<Value> {
        self.answer(Call {
            method: "POST",
            path: path.to_string(),
            query: Vec::new(),
            body: Some(body.clone()),
        })
    }
}
