//! In-memory [`Transport`] for unit tests.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde_json::Value;

use crate::error::ClientError;
use crate::transport::{ApiRequest, Method, Transport};

type Responder = Arc<dyn Fn(&ApiRequest) -> Result<Value, ClientError> + Send + Sync>;

#[derive(Clone)]
struct Route {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    delay: Option<Duration>,
    responder: Responder,
}

impl Route {
    fn matches(&self, request: &ApiRequest) -> bool {
        self.method == request.method
            && self.path == request.path
            && self
                .query
                .iter()
                .all(|(k, v)| request.query_param(k) == Some(v.as_str()))
    }
}

/// Serves canned responses and records every request it receives.
///
/// Routes registered later take precedence over earlier ones. Unrouted
/// requests fail with [`ClientError::NotFound`].
#[derive(Default)]
pub struct FakeTransport {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn route(&self, method: Method, path: &str) -> RouteBuilder<'_> {
        RouteBuilder {
            transport: self,
            route: Route {
                method,
                path: path.to_string(),
                query: Vec::new(),
                delay: None,
                responder: Arc::new(|_| Ok(Value::Null)),
            },
        }
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of requests sent with `method` to `path`.
    pub fn count(&self, method: Method, path: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }

    pub fn total(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Transport for FakeTransport {
    async fn send(&self, request: ApiRequest) -> Result<Value, ClientError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        let route = self
            .routes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .rev()
            .find(|r| r.matches(&request))
            .cloned();

        let Some(route) = route else {
            return Err(ClientError::NotFound(format!(
                "{} {}",
                request.method, request.path
            )));
        };
        if let Some(delay) = route.delay {
            tokio::time::sleep(delay).await;
        }
        (route.responder)(&request)
    }
}

pub struct RouteBuilder<'a> {
    transport: &'a FakeTransport,
    route: Route,
}

impl RouteBuilder<'_> {
    /// Only match requests carrying this query parameter.
    pub fn query(mut self, key: &str, value: &str) -> Self {
        self.route.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.route.delay = Some(delay);
        self
    }

    pub fn respond(
        mut self,
        responder: impl Fn(&ApiRequest) -> Result<Value, ClientError> + Send + Sync + 'static,
    ) {
        self.route.responder = Arc::new(responder);
        self.transport
            .routes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(self.route);
    }

    pub fn json(self, body: Value) {
        self.respond(move |_| Ok(body.clone()));
    }

    pub fn fail(self, err: ClientError) {
        self.respond(move |_| Err(err.clone()));
    }
}
