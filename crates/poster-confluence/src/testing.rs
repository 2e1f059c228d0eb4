//! In-memory Confluence for tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use serde_json::{Value, json};

use crate::transport::{ApiRequest, ApiResponse, Method, Transport, TransportError};

/// A failure injected ahead of normal handling.
#[derive(Clone, Debug)]
pub(crate) enum Scripted {
    Transient(String),
    Fatal(String),
    Status(u16),
}

/// A request as seen by the fake.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Call {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct FakePage {
    pub id: String,
    pub title: String,
    pub space_key: String,
    pub body: String,
    pub version: u32,
    pub ancestor_id: Option<String>,
}

impl FakePage {
    fn to_json(&self) -> Value {
        let ancestors: Vec<Value> = self
            .ancestor_id
            .iter()
            .map(|id| json!({"id": id}))
            .collect();
        json!({
            "id": self.id,
            "type": "page",
            "status": "current",
            "title": self.title,
            "space": {"key": self.space_key},
            "version": {"number": self.version},
            "ancestors": ancestors,
        })
    }
}

#[derive(Default)]
struct State {
    pages: Vec<FakePage>,
    next_id: u64,
    calls: Vec<Call>,
    failures: VecDeque<Scripted>,
    conflicting_puts: usize,
}

/// Minimal `/rest/api/content` server with Confluence's versioning rules.
#[derive(Default)]
pub(crate) struct FakeConfluence {
    state: Mutex<State>,
}

impl FakeConfluence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a root page at version 1 and return its id.
    pub fn with_page(&self, space_key: &str, title: &str) -> String {
        let mut state = self.state.lock().unwrap();
        let id = state.allocate_id();
        state.pages.push(FakePage {
            id: id.clone(),
            title: title.to_owned(),
            space_key: space_key.to_owned(),
            body: String::new(),
            version: 1,
            ancestor_id: None,
        });
        id
    }

    /// Make the next request fail this way. Queued failures apply in order.
    pub fn fail_next(&self, failure: Scripted) {
        self.state.lock().unwrap().failures.push_back(failure);
    }

    /// Simulate someone else editing the page during the next `count` PUTs:
    /// the stored version is bumped and the PUT answered with 409.
    pub fn conflict_next_puts(&self, count: usize) {
        self.state.lock().unwrap().conflicting_puts = count;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count_calls(&self, method: Method) -> usize {
        self.calls().iter().filter(|c| c.method == method).count()
    }

    pub fn page(&self, id: &str) -> Option<FakePage> {
        self.state
            .lock()
            .unwrap()
            .pages
            .iter()
            .find(|p| p.id == id)
            .cloned()
    }

    pub fn pages_titled(&self, title: &str) -> Vec<FakePage> {
        self.state
            .lock()
            .unwrap()
            .pages
            .iter()
            .filter(|p| p.title == title)
            .cloned()
            .collect()
    }
}

impl State {
    fn allocate_id(&mut self) -> String {
        self.next_id += 1;
        (1000 + self.next_id).to_string()
    }

    fn handle(&mut self, request: &ApiRequest<'_>) -> ApiResponse {
        let id = request.path.strip_prefix("/content/");
        match (request.method, id) {
            (Method::Get, None) => self.search(request.query),
            (Method::Get, Some(id)) => match self.pages.iter().find(|p| p.id == id) {
                Some(page) => ok(&page.to_json()),
                None => status(404, "page not found"),
            },
            (Method::Post, None) => self.create(body_json(request)),
            (Method::Put, Some(id)) => self.update(id, body_json(request)),
            _ => status(405, "method not allowed"),
        }
    }

    fn search(&self, query: &[(&str, &str)]) -> ApiResponse {
        let param = |name: &str| query.iter().find(|(k, _)| *k == name).map(|(_, v)| *v);
        let results: Vec<Value> = self
            .pages
            .iter()
            .filter(|p| param("spaceKey").is_none_or(|key| p.space_key == key))
            .filter(|p| param("title").is_none_or(|title| p.title == title))
            .map(FakePage::to_json)
            .collect();
        ok(&json!({"results": results, "size": results.len()}))
    }

    fn create(&mut self, payload: Value) -> ApiResponse {
        let space_key = payload["space"]["key"].as_str().unwrap_or_default().to_owned();
        let title = payload["title"].as_str().unwrap_or_default().to_owned();
        if self
            .pages
            .iter()
            .any(|p| p.space_key == space_key && p.title == title)
        {
            return status(400, "A page with this title already exists");
        }
        let id = self.allocate_id();
        let page = FakePage {
            id,
            title,
            space_key,
            body: payload["body"]["storage"]["value"]
                .as_str()
                .unwrap_or_default()
                .to_owned(),
            version: 1,
            ancestor_id: payload["ancestors"][0]["id"].as_str().map(str::to_owned),
        };
        let response = ok(&page.to_json());
        self.pages.push(page);
        response
    }

    fn update(&mut self, id: &str, payload: Value) -> ApiResponse {
        let bump_first = self.conflicting_puts > 0;
        if bump_first {
            self.conflicting_puts -= 1;
        }
        let Some(page) = self.pages.iter_mut().find(|p| p.id == id) else {
            return status(404, "page not found");
        };
        if bump_first {
            page.version += 1;
            return status(409, "Version must be incremented on update");
        }
        let requested = payload["version"]["number"].as_u64().unwrap_or_default();
        if requested != u64::from(page.version) + 1 {
            return status(409, "Version must be incremented on update");
        }
        page.version += 1;
        page.title = payload["title"].as_str().unwrap_or_default().to_owned();
        page.body = payload["body"]["storage"]["value"]
            .as_str()
            .unwrap_or_default()
            .to_owned();
        page.ancestor_id = payload["ancestors"][0]["id"].as_str().map(str::to_owned);
        ok(&page.to_json())
    }
}

fn body_json(request: &ApiRequest<'_>) -> Value {
    serde_json::from_slice(request.body.unwrap_or_default()).unwrap()
}

fn ok(value: &Value) -> ApiResponse {
    ApiResponse {
        status: 200,
        body: value.to_string(),
    }
}

fn status(status: u16, message: &str) -> ApiResponse {
    ApiResponse {
        status,
        body: json!({"statusCode": status, "message": message}).to_string(),
    }
}

impl Transport for FakeConfluence {
    fn send(&self, request: &ApiRequest<'_>) -> Result<ApiResponse, TransportError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call {
            method: request.method,
            path: request.path.to_owned(),
            query: request
                .query
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect(),
        });
        match state.failures.pop_front() {
            Some(Scripted::Transient(message)) => Err(TransportError::Transient(message)),
            Some(Scripted::Fatal(message)) => Err(TransportError::Fatal(message)),
            Some(Scripted::Status(code)) => Ok(status(code, "scripted failure")),
            None => Ok(state.handle(request)),
        }
    }
}
