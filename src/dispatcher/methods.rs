use super::core::Endpoint;
use crate::server::{HandlerRequest, HandlerResponse, ParamVec};
use http::Method;
use indexmap::IndexMap;
use std::sync::Arc;
use tracing::debug;

/// Several endpoints behind one route, chosen by request method.
#[derive(Debug, Default)]
pub struct MethodRouter {
    endpoints: IndexMap<Method, Arc<Endpoint>>,
}

impl MethodRouter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Route `method` to `endpoint`, replacing any earlier one.
    pub fn insert(&mut self, method: Method, endpoint: Arc<Endpoint>) {
        self.endpoints.insert(method, endpoint);
    }

    /// Registered methods, in registration order.
    pub fn allowed(&self) -> impl Iterator<Item = &Method> {
        self.endpoints.keys()
    }

    pub fn endpoints(&self) -> impl Iterator<Item = (&Method, &Arc<Endpoint>)> {
        self.endpoints.iter()
    }

    #[must_use]
    pub fn get(&self, method: &Method) -> Option<&Arc<Endpoint>> {
        self.endpoints.get(method)
    }

    /// Dispatch by method; an unregistered method gets a 405 listing the rest.
    pub fn call(&self, request: HandlerRequest, path_params: &ParamVec) -> anyhow::Result<HandlerResponse> {
        match self.endpoints.get(&request.method) {
            Some(endpoint) => endpoint.call(request, path_params),
            None => {
                debug!(
                    request_id = %request.request_id,
                    method = %request.method,
                    "No endpoint for method"
                );
                Ok(HandlerResponse::method_not_allowed(self.allowed()))
            }
        }
    }
}
