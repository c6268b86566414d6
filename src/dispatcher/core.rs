use super::bind::bind;
use super::methods::MethodRouter;
use super::output::convert_output;
use crate::config::BindConfig;
use crate::error::{ConfigError, HandlerError};
use crate::security::{
    authenticate_request, check_permissions, require_authentication, AuthBackend, AuthFailure,
    AuthMode, BackendRegistry, InMemoryTokenStore, TokenStore,
};
use crate::server::{extract, HandlerRequest, HandlerResponse, HeaderVec, ParamVec, Reply};
use crate::signature::{compile, CompiledHandlerSchema, Describe, HandlerSignature, ParamDecl};
use crate::schema::TypeDesc;
use crate::typed::{Arguments, Handler};
use http::Method;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Declaration of one endpoint, compiled by [`EndpointBuilder::build`].
pub struct EndpointBuilder {
    signature: HandlerSignature,
    method: Option<Method>,
    auth: AuthMode,
    permissions: Vec<String>,
    validate_output: Option<bool>,
    handler: Arc<dyn Handler>,
}

impl EndpointBuilder {
    /// Endpoint accepting any method.
    #[must_use]
    pub fn new(name: impl Into<String>, handler: impl Handler) -> Self {
        Self {
            signature: HandlerSignature::new(name),
            method: None,
            auth: AuthMode::Disabled,
            permissions: Vec::new(),
            validate_output: None,
            handler: Arc::new(handler),
        }
    }

    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    #[must_use]
    pub fn param(mut self, param: ParamDecl) -> Self {
        self.signature.params.push(param);
        self
    }

    /// Declare the return type from a Rust type.
    #[must_use]
    pub fn returns<T: Describe>(self) -> Self {
        self.returns_type(T::type_desc())
    }

    #[must_use]
    pub fn returns_type(mut self, ty: TypeDesc) -> Self {
        self.signature.returns = Some(ty);
        self
    }

    /// Require an authenticated user, found by the default backends.
    #[must_use]
    pub fn auth(mut self, required: bool) -> Self {
        self.auth = if required {
            AuthMode::Default
        } else {
            AuthMode::Disabled
        };
        self
    }

    /// Require an authenticated user, found by these backends in this order.
    #[must_use]
    pub fn auth_backends<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.auth = AuthMode::Backends(names.into_iter().map(Into::into).collect());
        self
    }

    /// Permissions the user must all hold.
    #[must_use]
    pub fn permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions = permissions.into_iter().map(Into::into).collect();
        self
    }

    /// Override the configured output validation for this endpoint.
    #[must_use]
    pub fn validate_output(mut self, validate: bool) -> Self {
        self.validate_output = Some(validate);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.signature.name
    }

    /// Compile the signature and resolve authentication backends.
    pub fn build(self, registry: &BackendRegistry, config: &BindConfig) -> Result<Endpoint, ConfigError> {
        let schema = compile(&self.signature, self.method)?;
        let backends = if self.auth.is_required() || !self.permissions.is_empty() {
            registry.resolve(&self.auth)?
        } else {
            Vec::new()
        };
        let validate_output = self.validate_output.unwrap_or(config.validate_output);

        info!(
            handler_name = %schema.handler_name(),
            method = ?schema.http_method(),
            params = schema.params().len(),
            file_params = schema.file_parameters().len(),
            auth = ?self.auth,
            permissions = ?self.permissions,
            validate_output,
            "Endpoint compiled"
        );
        for (name, sources) in schema.parameter_sources() {
            debug!(
                handler_name = %schema.handler_name(),
                param = name,
                sources = ?sources.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
                "Parameter sources"
            );
        }

        Ok(Endpoint {
            schema,
            handler: self.handler,
            auth: self.auth,
            backends,
            permissions: self.permissions,
            validate_output,
            square_brackets: config.square_brackets,
        })
    }
}

/// A compiled endpoint: schema, handler and security settings. Immutable.
pub struct Endpoint {
    schema: CompiledHandlerSchema,
    handler: Arc<dyn Handler>,
    auth: AuthMode,
    backends: Vec<Arc<dyn AuthBackend>>,
    permissions: Vec<String>,
    validate_output: bool,
    square_brackets: bool,
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("schema", &self.schema)
            .field("auth", &self.auth)
            .field("backends", &self.backends.iter().map(|b| b.name()).collect::<Vec<_>>())
            .field("permissions", &self.permissions)
            .field("validate_output", &self.validate_output)
            .finish_non_exhaustive()
    }
}

fn auth_response(failure: AuthFailure) -> HandlerResponse {
    HandlerResponse::error(failure.status(), failure.as_str())
}

fn reply_response(status: u16, reply_headers: HeaderVec, body: Value) -> HandlerResponse {
    let mut response = HandlerResponse::json(status, body);
    for (name, value) in reply_headers {
        response.set_header(&name, value);
    }
    response
}

impl Endpoint {
    /// Builder for an endpoint accepting any method.
    #[must_use]
    pub fn builder(name: impl Into<String>, handler: impl Handler) -> EndpointBuilder {
        EndpointBuilder::new(name, handler)
    }

    #[must_use]
    pub fn get(name: impl Into<String>, handler: impl Handler) -> EndpointBuilder {
        EndpointBuilder::new(name, handler).method(Method::GET)
    }

    #[must_use]
    pub fn post(name: impl Into<String>, handler: impl Handler) -> EndpointBuilder {
        EndpointBuilder::new(name, handler).method(Method::POST)
    }

    #[must_use]
    pub fn put(name: impl Into<String>, handler: impl Handler) -> EndpointBuilder {
        EndpointBuilder::new(name, handler).method(Method::PUT)
    }

    #[must_use]
    pub fn patch(name: impl Into<String>, handler: impl Handler) -> EndpointBuilder {
        EndpointBuilder::new(name, handler).method(Method::PATCH)
    }

    #[must_use]
    pub fn delete(name: impl Into<String>, handler: impl Handler) -> EndpointBuilder {
        EndpointBuilder::new(name, handler).method(Method::DELETE)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.schema.handler_name()
    }

    #[must_use]
    pub fn schema(&self) -> &CompiledHandlerSchema {
        &self.schema
    }

    #[must_use]
    pub fn validates_output(&self) -> bool {
        self.validate_output
    }

    /// Serve one request.
    ///
    /// `Ok` carries every response the binding layer decides on, error
    /// responses included. `Err` means the handler failed in an undeclared way
    /// or broke its output contract; the surrounding framework owns those.
    pub fn call(&self, mut request: HandlerRequest, path_params: &ParamVec) -> anyhow::Result<HandlerResponse> {
        let start = Instant::now();
        let handler_name = self.schema.handler_name();
        let request_id = request.request_id;

        info!(
            request_id = %request_id,
            handler_name = %handler_name,
            method = %request.method,
            path = %request.path,
            "Request received"
        );

        let result = self.serve(&mut request, path_params);
        let execution_time_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(response) => info!(
                request_id = %request_id,
                handler_name = %handler_name,
                method = %request.method,
                status = response.status,
                execution_time_ms,
                "Request finalized"
            ),
            Err(e) => error!(
                request_id = %request_id,
                handler_name = %handler_name,
                method = %request.method,
                error = %e,
                execution_time_ms,
                "Request failed"
            ),
        }
        result
    }

    fn serve(&self, request: &mut HandlerRequest, path_params: &ParamVec) -> anyhow::Result<HandlerResponse> {
        let handler_name = self.schema.handler_name();

        if let Some(method) = self.schema.http_method() {
            if request.method != *method {
                debug!(
                    request_id = %request.request_id,
                    handler_name = %handler_name,
                    method = %request.method,
                    allowed = %method,
                    "Method not allowed"
                );
                return Ok(HandlerResponse::method_not_allowed([method]));
            }
        }

        if self.auth.is_required() || !self.permissions.is_empty() {
            if let Some(response) = self.authenticate(request) {
                return Ok(response);
            }
        }

        let args = if self.schema.needs_extraction() {
            debug!(
                request_id = %request.request_id,
                handler_name = %handler_name,
                method = %request.method,
                "Extracting request values"
            );
            let values = match extract(request, path_params, self.square_brackets) {
                Ok(values) => values,
                Err(detail) => {
                    info!(
                        request_id = %request.request_id,
                        handler_name = %handler_name,
                        error = %detail.msg,
                        "Request body rejected"
                    );
                    return Ok(HandlerResponse::invalid_input(&[detail]));
                }
            };

            debug!(
                request_id = %request.request_id,
                handler_name = %handler_name,
                method = %request.method,
                "Binding and validating arguments"
            );
            match bind(&self.schema, &values) {
                Ok(args) => args,
                Err(failure) => {
                    info!(
                        request_id = %request.request_id,
                        handler_name = %handler_name,
                        failure = ?failure,
                        "Input validation failed"
                    );
                    return Ok(failure.into_response());
                }
            }
        } else {
            Arguments::default()
        };

        debug!(
            request_id = %request.request_id,
            handler_name = %handler_name,
            method = %request.method,
            args = args.names().count(),
            "Dispatching to handler"
        );
        let reply = match self.handler.handle(request, args) {
            Ok(reply) => reply,
            Err(HandlerError::Api(api)) => {
                debug!(
                    request_id = %request.request_id,
                    handler_name = %handler_name,
                    status = api.status,
                    error = %api.error,
                    "Handler returned api error"
                );
                return Ok(HandlerResponse::error(api.status, &api.error));
            }
            Err(HandlerError::MissingArgument(name)) => {
                info!(
                    request_id = %request.request_id,
                    handler_name = %handler_name,
                    param = %name,
                    "Required argument missing"
                );
                return Ok(HandlerResponse::error(400, "invalid_input"));
            }
            Err(e @ HandlerError::InvalidArgument { .. }) => return Err(e.into()),
            Err(HandlerError::Other(e)) => return Err(e),
        };

        debug!(
            request_id = %request.request_id,
            handler_name = %handler_name,
            method = %request.method,
            status = reply.status,
            "Converting output"
        );
        let Reply {
            payload,
            status,
            headers,
        } = reply;
        let body = convert_output(&self.schema, payload, self.validate_output)?;
        Ok(reply_response(status, headers, body))
    }

    /// Attach the user and enforce `auth`/`permissions`. `Some` is the
    /// rejection to send.
    fn authenticate(&self, request: &mut HandlerRequest) -> Option<HandlerResponse> {
        debug!(
            request_id = %request.request_id,
            handler_name = %self.schema.handler_name(),
            method = %request.method,
            backends = self.backends.len(),
            "Authenticating"
        );
        if let Some((user, backend)) = authenticate_request(request, &self.backends) {
            debug!(
                request_id = %request.request_id,
                user = user.identifier(),
                backend = %backend,
                "User authenticated"
            );
            request.user = Some(user);
        }

        let outcome = if self.auth.is_required() {
            require_authentication(request.user.as_ref())
        } else {
            Ok(())
        }
        .and_then(|()| {
            if self.permissions.is_empty() {
                Ok(())
            } else {
                check_permissions(request.user.as_ref(), &self.permissions)
            }
        });

        match outcome {
            Ok(()) => None,
            Err(failure) => {
                warn!(
                    request_id = %request.request_id,
                    handler_name = %self.schema.handler_name(),
                    failure = %failure,
                    "Request rejected"
                );
                Some(auth_response(failure))
            }
        }
    }
}

enum Route {
    Endpoint(Arc<Endpoint>),
    Methods(MethodRouter),
}

impl Route {
    fn call(&self, request: HandlerRequest, path_params: &ParamVec) -> anyhow::Result<HandlerResponse> {
        match self {
            Route::Endpoint(endpoint) => endpoint.call(request, path_params),
            Route::Methods(router) => router.call(request, path_params),
        }
    }

    fn endpoints(&self) -> Vec<&Arc<Endpoint>> {
        match self {
            Route::Endpoint(endpoint) => vec![endpoint],
            Route::Methods(router) => router.endpoints().map(|(_, e)| e).collect(),
        }
    }
}

/// Collects endpoints, then freezes them into a [`Dispatcher`].
pub struct DispatcherBuilder {
    config: BindConfig,
    backends: BackendRegistry,
    token_store: Arc<InMemoryTokenStore>,
    routes: HashMap<String, Route>,
}

impl fmt::Debug for DispatcherBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.routes.keys().collect();
        names.sort();
        f.debug_struct("DispatcherBuilder")
            .field("config", &self.config)
            .field("handlers", &names)
            .field("backends", &self.backends)
            .finish_non_exhaustive()
    }
}

impl DispatcherBuilder {
    /// Builder with the session and token backends registered.
    #[must_use]
    pub fn new(config: BindConfig) -> Self {
        let token_store = Arc::new(InMemoryTokenStore::with_validity(config.token_validity_days));
        let backends = BackendRegistry::with_builtin(
            config.auth_backends.clone(),
            Arc::clone(&token_store) as Arc<dyn TokenStore>,
        );
        Self {
            config,
            backends,
            token_store,
            routes: HashMap::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &BindConfig {
        &self.config
    }

    /// The store behind the built-in `token` backend.
    #[must_use]
    pub fn token_store(&self) -> Arc<InMemoryTokenStore> {
        Arc::clone(&self.token_store)
    }

    /// Register an authentication backend endpoints can name.
    pub fn backend(&mut self, backend: Arc<dyn AuthBackend>) -> &mut Self {
        self.backends.register(backend);
        self
    }

    fn insert(&mut self, name: String, route: Route) -> Result<(), ConfigError> {
        if self.routes.contains_key(&name) {
            return Err(ConfigError::DuplicateHandler(name));
        }
        self.routes.insert(name, route);
        Ok(())
    }

    /// Compile and register an endpoint under its handler name.
    pub fn register(&mut self, endpoint: EndpointBuilder) -> Result<&mut Self, ConfigError> {
        let name = endpoint.name().to_string();
        if self.routes.contains_key(&name) {
            return Err(ConfigError::DuplicateHandler(name));
        }
        let endpoint = endpoint.build(&self.backends, &self.config)?;
        self.insert(name, Route::Endpoint(Arc::new(endpoint)))?;
        Ok(self)
    }

    /// Register several endpoints under one name, chosen by request method.
    pub fn register_methods<I>(&mut self, name: impl Into<String>, endpoints: I) -> Result<&mut Self, ConfigError>
    where
        I: IntoIterator<Item = (Method, EndpointBuilder)>,
    {
        let name = name.into();
        let mut router = MethodRouter::new();
        for (method, mut endpoint) in endpoints {
            let declared = endpoint.method.get_or_insert_with(|| method.clone());
            if *declared != method {
                return Err(ConfigError::MethodMismatch {
                    handler: endpoint.signature.name.clone(),
                    declared: declared.to_string(),
                    registered: method.to_string(),
                });
            }
            let endpoint = endpoint.build(&self.backends, &self.config)?;
            router.insert(method, Arc::new(endpoint));
        }
        info!(
            handler_name = %name,
            methods = ?router.allowed().map(Method::as_str).collect::<Vec<_>>(),
            "Method router registered"
        );
        self.insert(name, Route::Methods(router))?;
        Ok(self)
    }

    #[must_use]
    pub fn build(self) -> Dispatcher {
        info!(handlers = self.routes.len(), "Dispatcher ready");
        Dispatcher {
            backends: self.backends,
            token_store: self.token_store,
            routes: self.routes,
        }
    }
}

/// Read-only registry of compiled endpoints, shareable across threads.
pub struct Dispatcher {
    backends: BackendRegistry,
    token_store: Arc<InMemoryTokenStore>,
    routes: HashMap<String, Route>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.routes.keys().collect();
        names.sort();
        f.debug_struct("Dispatcher")
            .field("handlers", &names)
            .field("backends", &self.backends)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    #[must_use]
    pub fn builder(config: BindConfig) -> DispatcherBuilder {
        DispatcherBuilder::new(config)
    }

    /// Serve `request` with the endpoint registered as `handler_name`.
    pub fn dispatch(
        &self,
        handler_name: &str,
        request: HandlerRequest,
        path_params: &ParamVec,
    ) -> anyhow::Result<HandlerResponse> {
        match self.routes.get(handler_name) {
            Some(route) => route.call(request, path_params),
            None => {
                let mut available: Vec<&String> = self.routes.keys().collect();
                available.sort();
                error!(
                    request_id = %request.request_id,
                    handler_name = %handler_name,
                    available_handlers = ?available,
                    "Handler not found"
                );
                Ok(HandlerResponse::error(404, "handler_not_found"))
            }
        }
    }

    #[must_use]
    pub fn contains(&self, handler_name: &str) -> bool {
        self.routes.contains_key(handler_name)
    }

    /// Registered handler names, sorted.
    #[must_use]
    pub fn handler_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.routes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Every compiled endpoint under `handler_name` (several for a method router).
    #[must_use]
    pub fn endpoints(&self, handler_name: &str) -> Vec<&Arc<Endpoint>> {
        self.routes
            .get(handler_name)
            .map(Route::endpoints)
            .unwrap_or_default()
    }

    /// The compiled schema of a single-endpoint handler.
    #[must_use]
    pub fn schema(&self, handler_name: &str) -> Option<&CompiledHandlerSchema> {
        match self.routes.get(handler_name)? {
            Route::Endpoint(endpoint) => Some(endpoint.schema()),
            Route::Methods(_) => None,
        }
    }

    #[must_use]
    pub fn token_store(&self) -> &Arc<InMemoryTokenStore> {
        &self.token_store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ApiError, HandlerResult};
    use crate::security::{SimpleUser, User};
    use crate::signature::{Path, Query};
    use serde_json::json;

    fn params(pairs: &[(&str, &str)]) -> ParamVec {
        pairs
            .iter()
            .map(|(k, v)| (Arc::from(*k), (*v).to_string()))
            .collect()
    }

    fn echo_limit(_req: &HandlerRequest, args: Arguments) -> HandlerResult<Reply> {
        let limit: i64 = args.get("limit")?;
        Ok(Reply::json(json!({ "limit": limit })))
    }

    fn dispatcher_with(endpoint: EndpointBuilder) -> Dispatcher {
        let mut builder = Dispatcher::builder(BindConfig::default());
        builder.register(endpoint).unwrap();
        builder.build()
    }

    #[test]
    fn test_method_checked_first() {
        let d = dispatcher_with(
            Endpoint::get("limits", echo_limit)
                .param(ParamDecl::of::<Query<i64>>("limit"))
                .auth(true),
        );
        let resp = d.dispatch("limits", HandlerRequest::post("/"), &ParamVec::new()).unwrap();
        assert_eq!(resp.status, 405);
        assert_eq!(resp.get_header("allow"), Some("GET"));
        assert!(resp.body.is_none());
    }

    #[test]
    fn test_unknown_handler() {
        let d = Dispatcher::builder(BindConfig::default()).build();
        let resp = d.dispatch("nope", HandlerRequest::get("/"), &ParamVec::new()).unwrap();
        assert_eq!(resp.status, 404);
        assert_eq!(resp.body, Some(json!({"error": "handler_not_found"})));
    }

    #[test]
    fn test_duplicate_handler_rejected() {
        let mut builder = Dispatcher::builder(BindConfig::default());
        builder.register(Endpoint::get("a", echo_limit)).unwrap();
        let err = builder.register(Endpoint::get("a", echo_limit)).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateHandler(name) if name == "a"));
    }

    #[test]
    fn test_api_error_short_circuits() {
        let d = dispatcher_with(
            Endpoint::get("find", |_req: &HandlerRequest, args: Arguments| -> HandlerResult<Reply> {
                let id: i64 = args.get("id")?;
                if id == 0 {
                    return Err(ApiError::not_found().into());
                }
                Ok(Reply::json(json!(id)))
            })
            .param(ParamDecl::of::<Path<i64>>("id")),
        );
        let resp = d
            .dispatch("find", HandlerRequest::get("/posts/0"), &params(&[("id", "0")]))
            .unwrap();
        assert_eq!(resp.status, 404);
        assert_eq!(resp.body, Some(json!({"error": "not_found"})));
    }

    #[test]
    fn test_auth_sets_user_and_checks_permissions() {
        let d = dispatcher_with(
            Endpoint::post("whoami", |req: &HandlerRequest, _args: Arguments| -> HandlerResult<Reply> {
                let id = req.user.as_ref().map(|u| u.identifier().to_string());
                Ok(Reply::json(json!({ "user": id })))
            })
            .permissions(["blog.add_post"]),
        );

        let resp = d.dispatch("whoami", HandlerRequest::post("/"), &ParamVec::new()).unwrap();
        assert_eq!(resp.status, 401);
        assert_eq!(resp.body, Some(json!({"error": "authentication_required"})));

        let plain: Arc<dyn User> = Arc::new(SimpleUser::new("bob"));
        let req = HandlerRequest::post("/").with_session_user(plain);
        let resp = d.dispatch("whoami", req, &ParamVec::new()).unwrap();
        assert_eq!(resp.status, 403);

        let editor: Arc<dyn User> = Arc::new(SimpleUser::new("ada").with_permission("blog.add_post"));
        let req = HandlerRequest::post("/").with_session_user(editor);
        let resp = d.dispatch("whoami", req, &ParamVec::new()).unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body, Some(json!({"user": "ada"})));
    }

    #[test]
    fn test_reply_status_and_headers_kept() {
        let d = dispatcher_with(Endpoint::post("make", |_req: &HandlerRequest, _args: Arguments| -> HandlerResult<Reply> {
            Ok(Reply::json(json!({"ok": true}))
                .with_status(201)
                .with_header("Location", "/posts/1"))
        }));
        let resp = d.dispatch("make", HandlerRequest::post("/"), &ParamVec::new()).unwrap();
        assert_eq!(resp.status, 201);
        assert_eq!(resp.get_header("location"), Some("/posts/1"));
        assert_eq!(resp.get_header("content-type"), Some("application/json"));
    }

    #[test]
    fn test_undeclared_failure_propagates() {
        let d = dispatcher_with(Endpoint::get("boom", |_req: &HandlerRequest, _args: Arguments| -> HandlerResult<Reply> {
            Err(anyhow::anyhow!("database down").into())
        }));
        let err = d.dispatch("boom", HandlerRequest::get("/"), &ParamVec::new()).unwrap_err();
        assert_eq!(err.to_string(), "database down");
    }

    #[test]
    fn test_unknown_backend_fails_registration() {
        let mut builder = Dispatcher::builder(BindConfig::default());
        let err = builder
            .register(Endpoint::get("a", echo_limit).auth_backends(["ldap"]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownAuthBackend(name) if name == "ldap"));
    }
}
