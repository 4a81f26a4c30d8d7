//! Request routing.
//!
//! Maps a method and request path onto a registered handler and the path
//! parameters captured along the way.

use crate::document::HttpMethod;
use crate::pattern::RoutePattern;
use std::collections::HashMap;
use tracing::warn;

/// Path parameters captured while matching.
pub type Params = HashMap<String, String>;

/// Routing capability used to register mock routes.
pub trait Routes {
    type Handler;

    /// Register `handler` for `method` and `pattern`.
    ///
    /// Returns `false` when the route was already taken and `handler` was
    /// dropped.
    fn register(&mut self, method: HttpMethod, pattern: RoutePattern, handler: Self::Handler)
        -> bool;

    /// Find the handler for a request, together with its captured parameters.
    fn resolve(&self, method: &str, path: &str) -> Option<(&Self::Handler, Params)>;
}

struct Route<H> {
    method: HttpMethod,
    pattern: RoutePattern,
    handler: H,
}

/// In-process route table.
///
/// When several patterns match, the one with the fewest captures wins, so
/// `/users/me` is preferred over `/users/{id}`. Remaining ties go to the route
/// registered first.
pub struct RouteTable<H> {
    routes: Vec<Route<H>>,
}

impl<H> RouteTable<H> {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Registered `(method, pattern)` pairs, in registration order.
    pub fn entries(&self) -> impl Iterator<Item = (HttpMethod, &RoutePattern)> {
        self.routes.iter().map(|route| (route.method, &route.pattern))
    }
}

impl<H> Default for RouteTable<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> Routes for RouteTable<H> {
    type Handler = H;

    fn register(&mut self, method: HttpMethod, pattern: RoutePattern, handler: H) -> bool {
        let duplicate = self
            .routes
            .iter()
            .any(|route| route.method == method && route.pattern == pattern);
        if duplicate {
            warn!(
                method = %method,
                pattern = %pattern,
                "Duplicate route ignored, keeping the first registration"
            );
            return false;
        }

        self.routes.push(Route {
            method,
            pattern,
            handler,
        });
        true
    }

    fn resolve(&self, method: &str, path: &str) -> Option<(&H, Params)> {
        let mut best: Option<(&Route<H>, Params)> = None;

        for route in &self.routes {
            if !route.method.as_str().eq_ignore_ascii_case(method) {
                continue;
            }
            let Some(params) = route.pattern.matches(path) else {
                continue;
            };

            let better = match &best {
                Some((current, _)) => params.len() < current.pattern.param_count(),
                None => true,
            };
            if better {
                best = Some((route, params));
            }
        }

        best.map(|(route, params)| (&route.handler, params))
    }
}
