//! Mocked HTTP endpoints.
//!
//! A [`Fixture`] intercepts requests, waits for its configured delay and
//! answers through the first route whose method and URL template match.
//! Routes can be taken out and put back, which lets a test trap one endpoint
//! for a while and then restore the normal service.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;
use std::time::Duration;

use serde_json::{Map, Value, json};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl FromStr for Method {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "get" => Ok(Method::Get),
            "post" => Ok(Method::Post),
            "put" => Ok(Method::Put),
            "delete" => Ok(Method::Delete),
            _ => anyhow::bail!("Unknown HTTP method: {}", s),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

/// What a route handler sees. `data` is the JSON body with the URL template
/// captures merged in as strings.
#[derive(Debug, Clone)]
pub struct FixtureRequest {
    pub method: Method,
    pub url: String,
    pub data: Value,
}

impl FixtureRequest {
    /// `data[key]` as a string, accepting numbers too.
    pub fn param(&self, key: &str) -> Option<String> {
        match self.data.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub enum FixtureError {
    NoRoute { method: Method, url: String },
    Handler { method: Method, url: String, source: anyhow::Error },
}

impl fmt::Display for FixtureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FixtureError::NoRoute { method, url } => write!(f, "no fixture for {method} {url}"),
            FixtureError::Handler { method, url, source } => {
                write!(f, "fixture for {method} {url} failed: {source}")
            }
        }
    }
}

impl std::error::Error for FixtureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FixtureError::Handler { source, .. } => Some(source.as_ref()),
            FixtureError::NoRoute { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// `/api/todos/{id}` style path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate {
    segments: Vec<Segment>,
}

impl UrlTemplate {
    pub fn parse(template: &str) -> Self {
        let segments = split_path(template)
            .map(|segment| match segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                Some(name) => Segment::Param(name.to_string()),
                None => Segment::Literal(segment.to_string()),
            })
            .collect();
        Self { segments }
    }

    /// Captured parameters when `url` matches. The query string is ignored.
    pub fn captures(&self, url: &str) -> Option<BTreeMap<String, String>> {
        let path = url.split(['?', '#']).next().unwrap_or_default();
        let parts: Vec<&str> = split_path(path).collect();
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut captures = BTreeMap::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(literal) if literal == part => {}
                Segment::Literal(_) => return None,
                Segment::Param(name) => {
                    captures.insert(name.clone(), part.to_string());
                }
            }
        }
        Some(captures)
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

pub type Handler = Rc<dyn Fn(&FixtureRequest) -> anyhow::Result<Value>>;

#[derive(Clone)]
pub struct Route {
    pub method: Method,
    pub template: UrlTemplate,
    handler: Handler,
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("template", &self.template)
            .finish_non_exhaustive()
    }
}

struct FixtureState {
    delay: Duration,
    routes: Vec<Route>,
}

/// Shared handle to the mocked service.
#[derive(Clone)]
pub struct Fixture {
    state: Rc<RefCell<FixtureState>>,
}

impl Fixture {
    pub fn new(delay: Duration) -> Self {
        Self {
            state: Rc::new(RefCell::new(FixtureState {
                delay,
                routes: Vec::new(),
            })),
        }
    }

    pub fn delay(&self) -> Duration {
        self.state.borrow().delay
    }

    pub fn set_delay(&self, delay: Duration) {
        log::debug!("fixture delay set to {:?}", delay);
        self.state.borrow_mut().delay = delay;
    }

    /// Install a route. Later routes only answer what earlier ones don't.
    pub fn on(
        &self,
        method: Method,
        template: &str,
        handler: impl Fn(&FixtureRequest) -> anyhow::Result<Value> + 'static,
    ) {
        self.state.borrow_mut().routes.push(Route {
            method,
            template: UrlTemplate::parse(template),
            handler: Rc::new(handler),
        });
    }

    /// Remove and return every route.
    pub fn take_routes(&self) -> Vec<Route> {
        std::mem::take(&mut self.state.borrow_mut().routes)
    }

    /// Replace every route with `routes`.
    pub fn restore_routes(&self, routes: Vec<Route>) {
        self.state.borrow_mut().routes = routes;
    }

    /// Send a request and wait for the mocked answer.
    ///
    /// The route is picked when the request is sent; the handler runs once the
    /// delay has elapsed, so it observes the state at response time.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        body: Value,
    ) -> Result<Value, FixtureError> {
        let (route, captures, delay) = {
            let state = self.state.borrow();
            let found = state.routes.iter().find_map(|route| {
                if route.method != method {
                    return None;
                }
                route.template.captures(url).map(|captures| (route.clone(), captures))
            });
            match found {
                Some((route, captures)) => (route, captures, state.delay),
                None => {
                    log::warn!("no fixture for {} {}", method, url);
                    return Err(FixtureError::NoRoute {
                        method,
                        url: url.to_string(),
                    });
                }
            }
        };

        log::debug!("{} {} (delay {:?})", method, url, delay);
        tokio::time::sleep(delay).await;

        let mut data = match body {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("body".to_string(), other);
                map
            }
        };
        for (name, value) in captures {
            data.insert(name, Value::String(value));
        }
        let request = FixtureRequest {
            method,
            url: url.to_string(),
            data: Value::Object(data),
        };

        (route.handler)(&request).map_err(|source| FixtureError::Handler {
            method,
            url: url.to_string(),
            source,
        })
    }
}

struct TodoStore {
    items: Vec<Value>,
    next_id: u64,
}

impl TodoStore {
    fn position(&self, id: &str) -> Option<usize> {
        self.items
            .iter()
            .position(|item| id_of(item).as_deref() == Some(id))
    }
}

fn id_of(item: &Value) -> Option<String> {
    match item.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Install an in-memory `/api/todos` REST service on `fixture`.
///
/// - `GET /api/todos` answers `{"data": [...]}`
/// - `POST /api/todos` stores the body under a fresh string id
/// - `GET`, `PUT`, `DELETE /api/todos/{id}` read, replace, remove one item
pub fn install_todos_store(fixture: &Fixture, seed: Vec<Value>) {
    let next_id = seed
        .iter()
        .filter_map(|item| id_of(item)?.parse::<u64>().ok())
        .max()
        .unwrap_or(0)
        + 1;
    let store = Rc::new(RefCell::new(TodoStore {
        items: seed,
        next_id,
    }));

    let s = store.clone();
    fixture.on(Method::Get, "/api/todos", move |_| {
        Ok(json!({ "data": s.borrow().items.clone() }))
    });

    let s = store.clone();
    fixture.on(Method::Get, "/api/todos/{id}", move |request| {
        let id = request.param("id").unwrap_or_default();
        let store = s.borrow();
        match store.position(&id) {
            Some(index) => Ok(store.items[index].clone()),
            None => anyhow::bail!("todo {} not found", id),
        }
    });

    let s = store.clone();
    fixture.on(Method::Post, "/api/todos", move |request| {
        let mut store = s.borrow_mut();
        let id = store.next_id.to_string();
        store.next_id += 1;
        let mut item = request.data.clone();
        if let Value::Object(map) = &mut item {
            map.insert("id".to_string(), Value::String(id));
        }
        store.items.push(item.clone());
        Ok(item)
    });

    let s = store.clone();
    fixture.on(Method::Put, "/api/todos/{id}", move |request| {
        let id = request.param("id").unwrap_or_default();
        let mut store = s.borrow_mut();
        match store.position(&id) {
            Some(index) => {
                store.items[index] = request.data.clone();
                Ok(request.data.clone())
            }
            None => anyhow::bail!("todo {} not found", id),
        }
    });

    let s = store;
    fixture.on(Method::Delete, "/api/todos/{id}", move |request| {
        let id = request.param("id").unwrap_or_default();
        let mut store = s.borrow_mut();
        match store.position(&id) {
            Some(index) => Ok(store.items.remove(index)),
            None => anyhow::bail!("todo {} not found", id),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    fn seeded() -> Fixture {
        let fixture = Fixture::new(Duration::from_millis(10));
        install_todos_store(
            &fixture,
            vec![
                json!({"id": "1", "name": "mow lawn", "complete": false}),
                json!({"id": "2", "name": "dishes", "complete": true}),
            ],
        );
        fixture
    }

    #[test]
    fn templates_capture_params() {
        let template = UrlTemplate::parse("/api/todos/{id}");
        let captures = template.captures("/api/todos/7?x=1").unwrap();
        assert_eq!(captures.get("id").map(String::as_str), Some("7"));
        assert!(template.captures("/api/todos").is_none());
        assert!(template.captures("/api/users/7").is_none());
        assert!(UrlTemplate::parse("/api/todos").captures("/api/todos/").is_some());
    }

    #[test]
    fn methods_parse_case_insensitively() {
        assert_eq!("put".parse::<Method>().unwrap(), Method::Put);
        assert_eq!("DELETE".parse::<Method>().unwrap(), Method::Delete);
        assert!("patch".parse::<Method>().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn responses_wait_for_the_delay() {
        let fixture = seeded();
        let start = Instant::now();
        let response = fixture
            .request(Method::Get, "/api/todos", Value::Null)
            .await
            .unwrap();
        assert_eq!(start.elapsed(), Duration::from_millis(10));
        assert_eq!(response["data"].as_array().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn crud_round() {
        let fixture = seeded();

        let created = fixture
            .request(Method::Post, "/api/todos", json!({"name": "make a fixture", "complete": true}))
            .await
            .unwrap();
        assert_eq!(created["id"], "3");

        let updated = fixture
            .request(Method::Put, "/api/todos/3", json!({"name": "make a fixture", "complete": false}))
            .await
            .unwrap();
        assert_eq!(updated, json!({"name": "make a fixture", "complete": false, "id": "3"}));

        let fetched = fixture.request(Method::Get, "/api/todos/3", Value::Null).await.unwrap();
        assert_eq!(fetched["complete"], false);

        fixture.request(Method::Delete, "/api/todos/3", Value::Null).await.unwrap();
        let err = fixture
            .request(Method::Get, "/api/todos/3", Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, FixtureError::Handler { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_routes_fail_without_delay() {
        let fixture = seeded();
        let start = Instant::now();
        let err = fixture
            .request(Method::Get, "/api/users", Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, FixtureError::NoRoute { method: Method::Get, .. }));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn trapped_route_then_restore() {
        let fixture = seeded();
        let originals = fixture.take_routes();
        assert_eq!(originals.len(), 5);

        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = seen.clone();
        fixture.on(Method::Put, "/api/todos/{id}", move |request| {
            log.borrow_mut().push(request.data.clone());
            Ok(request.data.clone())
        });

        fixture
            .request(Method::Put, "/api/todos/1", json!({"complete": true}))
            .await
            .unwrap();
        assert_eq!(*seen.borrow(), vec![json!({"complete": true, "id": "1"})]);
        assert!(fixture.request(Method::Get, "/api/todos", Value::Null).await.is_err());

        fixture.restore_routes(originals);
        let list = fixture.request(Method::Get, "/api/todos", Value::Null).await.unwrap();
        // The trapped PUT never reached the store.
        assert_eq!(list["data"][0]["complete"], false);
    }
}
