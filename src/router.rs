//! Radix-tree route table.
//!
//! One tree per method, O(path-length) lookup. Build it once at startup; after
//! that it is only read, so one `Arc<Router>` serves every concurrent dispatch
//! without locking.

use std::collections::HashMap;
use std::sync::Arc;

use matchit::Router as MatchitRouter;

use crate::handler::{BoxedLink, Chain, Handler};
use crate::method::Method;

/// The application router and dispatcher.
///
/// Each registration call returns `self` so registrations chain naturally.
/// Dispatch lives in [`Router::dispatch`].
pub struct Router {
    routes: HashMap<Method, MatchitRouter<Arc<[BoxedLink]>>>,
    layers: Vec<BoxedLink>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: HashMap::new(), layers: Vec::new() }
    }

    /// Register a single handler for a method + path pair.
    ///
    /// Path parameters use `{name}` syntax; `req.param("name")` retrieves them:
    ///
    /// ```rust
    /// # use gatekit::{Method, Request, Response, Router};
    /// # async fn get_item(_: Request) -> Response { Response::text("") }
    /// # async fn put_item(_: Request) -> Response { Response::text("") }
    /// Router::new()
    ///     .on(Method::Get, "/items/{id}", get_item)
    ///     .on(Method::Put, "/items/{id}", put_item);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid route pattern or conflicts with an
    /// already registered one.
    pub fn on<T>(self, method: Method, path: &str, handler: impl Handler<T>) -> Self {
        self.route(method, path, Chain::new().then(handler))
    }

    /// Register a whole chain for a method + path pair.
    ///
    /// # Panics
    ///
    /// Same as [`Router::on`].
    pub fn route(mut self, method: Method, path: &str, chain: Chain) -> Self {
        let links = chain.prepend(&self.layers).into_links();
        self.routes
            .entry(method)
            .or_default()
            .insert(path, links)
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }

    /// Add a layer run before the chain of every route registered *after*
    /// this call.
    pub fn with<T>(mut self, handler: impl Handler<T>) -> Self {
        self.layers.push(handler.into_link());
        self
    }

    pub(crate) fn lookup(
        &self,
        method: Method,
        path: &str,
    ) -> Option<(Arc<[BoxedLink]>, HashMap<String, String>)> {
        let tree = self.routes.get(&method)?;
        let matched = tree.at(path).ok()?;
        let links = Arc::clone(matched.value);
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((links, params))
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("methods", &self.routes.keys().collect::<Vec<_>>())
            .field("layers", &self.layers.len())
            .finish()
    }
}
