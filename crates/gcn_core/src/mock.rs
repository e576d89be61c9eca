//! In-memory CMS backend for tests and examples.
//!
//! Implements [`Transport`] by answering the REST endpoints the client uses
//! from an in-memory object store. Objects live in a master node and are
//! inherited into every other node unless a channel-local copy exists there.

use crate::context::Gcn;
use crate::error::{GcnError, Result};
use crate::transport::{HttpRequest, HttpResponse, Method, Transport};
use crate::types::{ObjectKind, User};
use serde_json::{json, Map, Value};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};

/// Node every fixture object lives in.
pub const MASTER_NODE: u32 = 1;
/// Channel inheriting from [`MASTER_NODE`].
pub const CHANNEL_NODE: u32 = 2;
/// Secret appended to the sid in the server execution context.
pub const SESSION_SECRET: &str = "s3cr3t";

/// How the single sign-on endpoint answers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SsoMode {
    /// Empty body: nothing configured.
    Disabled,
    /// `NOTFOUND`
    NotFound,
    /// `FAILURE`
    Failure,
    /// Log in the user with this login.
    User(String),
}

struct Account {
    password: String,
    user: User,
}

struct Record {
    node: u32,
    master: Option<u64>,
    data: Map<String, Value>,
}

struct MockState {
    rest_path: String,
    accounts: HashMap<String, Account>,
    sessions: HashMap<String, u64>,
    next_sid: u64,
    records: BTreeMap<(ObjectKind, u64), Record>,
    next_id: u64,
    sso: SsoMode,
    offline: bool,
    log: Vec<HttpRequest>,
}

/// An in-memory CMS.
pub struct MockBackend {
    state: RefCell<MockState>,
}

fn envelope(code: &str, message: &str) -> Value {
    json!({ "responseInfo": { "responseCode": code, "responseMessage": message } })
}

fn ok(mut payload: Value) -> HttpResponse {
    if let Value::Object(map) = &mut payload {
        map.insert("responseInfo".into(), envelope("OK", "")["responseInfo"].clone());
    }
    HttpResponse::json(200, &payload)
}

fn failure(status: u16, code: &str, message: impl Into<String>) -> HttpResponse {
    HttpResponse::json(status, &envelope(code, &message.into()))
}

fn not_found(what: impl std::fmt::Display) -> HttpResponse {
    failure(404, "NOTFOUND", format!("{} not found", what))
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// An empty backend with no users and no objects.
    pub fn new() -> Self {
        Self {
            state: RefCell::new(MockState {
                rest_path: "/rest".into(),
                accounts: HashMap::new(),
                sessions: HashMap::new(),
                next_sid: 1000,
                records: BTreeMap::new(),
                next_id: 1000,
                sso: SsoMode::Disabled,
                offline: false,
                log: Vec::new(),
            }),
        }
    }

    /// A backend with user `node`/`node`, a master node and a channel, two
    /// folders, two pages, a template, a file and an image.
    pub fn with_fixture() -> Self {
        let backend = Self::new();
        backend.add_user(
            "node",
            "node",
            User {
                id: 3,
                login: "node".into(),
                first_name: "Node".into(),
                last_name: "Admin".into(),
                email: "node@example.com".into(),
            },
        );
        backend.insert(ObjectKind::Node, 1, json!({"name": "Master Node", "folderId": 10}));
        backend.insert(ObjectKind::Node, 2, json!({"name": "Channel", "folderId": 10}));
        backend.insert(ObjectKind::Folder, 10, json!({"name": "Root", "motherId": null}));
        backend.insert(ObjectKind::Folder, 11, json!({"name": "News", "motherId": 10}));
        backend.insert(ObjectKind::Template, 50, json!({"name": "Standard", "folderId": 10}));
        backend.insert(
            ObjectKind::Page,
            100,
            json!({
                "name": "Home",
                "folderId": 10,
                "templateId": 50,
                "online": false,
                "locked": false,
                "tags": {
                    "content": {
                        "id": 1001,
                        "name": "content",
                        "constructId": 5,
                        "active": true,
                        "properties": {"text": {"type": "STRING", "stringValue": "Hello"}}
                    },
                    "teaser": {
                        "id": 1002,
                        "name": "teaser",
                        "constructId": 5,
                        "active": true,
                        "properties": {"text": {"type": "STRING", "stringValue": "Welcome"}}
                    }
                }
            }),
        );
        backend.insert(
            ObjectKind::Page,
            101,
            json!({"name": "About", "folderId": 11, "templateId": 50, "online": true, "tags": {}}),
        );
        backend.insert(ObjectKind::File, 200, json!({"name": "manual.pdf", "folderId": 10}));
        backend.insert(ObjectKind::Image, 201, json!({"name": "logo.png", "folderId": 10}));
        backend
    }

    /// Adds an account.
    pub fn add_user(&self, login: &str, password: &str, user: User) {
        self.state.borrow_mut().accounts.insert(
            login.to_string(),
            Account {
                password: password.to_string(),
                user,
            },
        );
    }

    /// Stores an object in the master node.
    pub fn insert(&self, kind: ObjectKind, id: u64, data: Value) {
        let mut data = object(data);
        data.insert("id".into(), json!(id));
        let node = if kind == ObjectKind::Node { id as u32 } else { MASTER_NODE };
        self.state.borrow_mut().records.insert(
            (kind, id),
            Record {
                node,
                master: None,
                data,
            },
        );
    }

    /// Changes the path prefix the backend answers under.
    pub fn set_rest_path(&self, rest_path: &str) {
        self.state.borrow_mut().rest_path = rest_path.to_string();
    }

    /// Chooses how single sign-on answers.
    pub fn set_sso(&self, mode: SsoMode) {
        self.state.borrow_mut().sso = mode;
    }

    /// Makes every request fail at the transport level.
    pub fn set_offline(&self, offline: bool) {
        self.state.borrow_mut().offline = offline;
    }

    /// Invalidates every session; further requests answer `AUTHREQUIRED`.
    pub fn expire_sessions(&self) {
        self.state.borrow_mut().sessions.clear();
    }

    /// Creates a session for `node` without a request and hands it to `gcn`.
    pub fn login_direct(&self, gcn: &Gcn) -> Result<String> {
        let sid = self.open_session("node").ok_or_else(|| GcnError::AuthenticationFailed {
            message: "fixture user 'node' is missing".into(),
        })?;
        gcn.session().set_sid(sid.clone())?;
        Ok(sid)
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.state.borrow().log.clone()
    }

    /// Number of requests received so far.
    pub fn request_count(&self) -> usize {
        self.state.borrow().log.len()
    }

    /// Number of requests whose path ends with `suffix`.
    pub fn requests_to(&self, suffix: &str) -> usize {
        self.state
            .borrow()
            .log
            .iter()
            .filter(|r| r.path.ends_with(suffix))
            .count()
    }

    /// Stored data of an object, as the master node sees it.
    pub fn record(&self, kind: ObjectKind, id: u64) -> Option<Value> {
        self.state
            .borrow()
            .records
            .get(&(kind, id))
            .map(|r| Value::Object(r.data.clone()))
    }

    /// Localizes `master` into `node` without a request, as another editor
    /// would. Returns the id of the new local copy.
    pub fn localize_direct(&self, kind: ObjectKind, master: u64, node: u32) -> Result<u64> {
        let mut state = self.state.borrow_mut();
        let response = state.localize(kind, master, node);
        let refused = || GcnError::Server {
            code: "FAILURE".into(),
            message: format!("{} {} cannot be localized in {}", kind, master, node),
            data: serde_json::from_str(&response.body).ok(),
        };
        if !response.is_success() {
            return Err(refused());
        }
        state.local_copy(kind, master, node).ok_or_else(refused)
    }

    /// Id of the local copy of `master` in `node`, if one exists.
    pub fn local_copy(&self, kind: ObjectKind, master: u64, node: u32) -> Option<u64> {
        self.state.borrow().local_copy(kind, master, node)
    }

    fn open_session(&self, login: &str) -> Option<String> {
        let mut state = self.state.borrow_mut();
        let user_id = state.accounts.get(login)?.user.id;
        state.next_sid += 1;
        let sid = state.next_sid.to_string();
        state.sessions.insert(sid.clone(), user_id);
        Some(sid)
    }

    fn route(&self, request: &HttpRequest) -> HttpResponse {
        let path = {
            let state = self.state.borrow();
            match request.path.strip_prefix(state.rest_path.as_str()) {
                Some(path) => path.to_string(),
                None => return not_found(format!("path {}", request.path)),
            }
        };
        let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
        let body = request.body.clone().unwrap_or(Value::Null);

        match (request.method, segments.as_slice()) {
            (Method::Post, ["auth", "login.json"]) => return self.login(&body),
            (Method::Get, ["auth", "ssologin"]) => return self.sso(),
            _ => {}
        }

        let Some(user) = self.session_user(request.query_value("sid")) else {
            return failure(401, "AUTHREQUIRED", "session is missing or expired");
        };
        let node = request
            .query_value("nodeId")
            .and_then(|n| n.parse::<u32>().ok())
            .unwrap_or(0);

        match (request.method, segments.as_slice()) {
            (Method::Post, ["auth", "logout", sid]) => {
                self.state.borrow_mut().sessions.remove(*sid);
                ok(json!({}))
            }
            (Method::Get, ["user", "me"]) => ok(json!({ "user": user })),
            (Method::Get, ["folder", "getPages", id]) => {
                self.listing(ObjectKind::Page, "folderId", id, node, "pages")
            }
            (Method::Get, ["folder", "getFolders", id]) => {
                self.listing(ObjectKind::Folder, "motherId", id, node, "folders")
            }
            (Method::Post, ["page", "create"]) => self.create_page(&body),
            (Method::Get, ["page", "renderTag", name]) => self.render_tag(request, name, node),
            (Method::Post, ["preview", "page"]) => self.preview(&body),
            (method, [kind, action, id]) => {
                let Some(kind) = ObjectKind::parse(kind) else {
                    return not_found(format!("type {}", kind));
                };
                let Ok(id) = id.parse::<u64>() else {
                    return not_found(format!("{} {}", kind, id));
                };
                self.object_action(method, kind, action, id, node, &body)
            }
            _ => not_found(format!("endpoint {}", path)),
        }
    }

    fn session_user(&self, sid: Option<&str>) -> Option<User> {
        let state = self.state.borrow();
        let sid = sid?;
        let sid = sid.strip_suffix(SESSION_SECRET).unwrap_or(sid);
        let user_id = *state.sessions.get(sid)?;
        state
            .accounts
            .values()
            .find(|a| a.user.id == user_id)
            .map(|a| a.user.clone())
    }

    fn login(&self, body: &Value) -> HttpResponse {
        let login = body.get("login").and_then(Value::as_str).unwrap_or_default();
        let password = body.get("password").and_then(Value::as_str).unwrap_or_default();
        let user = {
            let state = self.state.borrow();
            match state.accounts.get(login) {
                Some(account) if account.password == password => account.user.clone(),
                _ => return failure(200, "FAILURE", "invalid user data"),
            }
        };
        match self.open_session(login) {
            Some(sid) => ok(json!({ "sid": sid, "user": user }))
                .with_header(
                    "Set-Cookie",
                    format!("GCN_SESSION_SECRET={}; Path=/; HttpOnly", SESSION_SECRET),
                ),
            None => failure(200, "FAILURE", "invalid user data"),
        }
    }

    fn sso(&self) -> HttpResponse {
        let mode = self.state.borrow().sso.clone();
        match mode {
            SsoMode::Disabled => HttpResponse::text(200, ""),
            SsoMode::NotFound => HttpResponse::text(200, "NOTFOUND"),
            SsoMode::Failure => HttpResponse::text(200, "FAILURE"),
            SsoMode::User(login) => match self.open_session(&login) {
                Some(sid) => HttpResponse::text(200, sid),
                None => HttpResponse::text(200, "FAILURE"),
            },
        }
    }

    fn listing(
        &self,
        kind: ObjectKind,
        parent_field: &str,
        id: &str,
        node: u32,
        field: &str,
    ) -> HttpResponse {
        let Ok(parent) = id.parse::<u64>() else {
            return not_found(format!("folder {}", id));
        };
        let state = self.state.borrow();
        let entries: Vec<Value> = state
            .records
            .iter()
            .filter(|((k, _), record)| {
                *k == kind
                    && record.master.is_none()
                    && record.data.get(parent_field).and_then(Value::as_u64) == Some(parent)
            })
            .filter_map(|((_, id), _)| state.resolve(kind, *id, node))
            .map(Value::Object)
            .collect();
        ok(json!({ field: entries }))
    }

    fn create_page(&self, body: &Value) -> HttpResponse {
        let Some(folder) = body.get("folderId").and_then(Value::as_u64) else {
            return failure(400, "INVALIDDATA", "folderId is required");
        };
        let template = body.get("templateId").and_then(Value::as_u64);
        let node = body
            .get("nodeId")
            .and_then(Value::as_u64)
            .map(|n| n as u32)
            .unwrap_or(MASTER_NODE);
        let mut state = self.state.borrow_mut();
        if !state.records.contains_key(&(ObjectKind::Folder, folder)) {
            return not_found(format!("folder {}", folder));
        }
        state.next_id += 1;
        let id = state.next_id;
        let data = object(json!({
            "id": id,
            "name": format!("page-{}", id),
            "folderId": folder,
            "templateId": template,
            "online": false,
            "tags": {}
        }));
        state.records.insert(
            (ObjectKind::Page, id),
            Record {
                node,
                master: None,
                data,
            },
        );
        match state.resolve(ObjectKind::Page, id, node) {
            Some(data) => ok(json!({ "page": data })),
            None => not_found(format!("page {}", id)),
        }
    }

    fn render_tag(&self, request: &HttpRequest, name: &str, node: u32) -> HttpResponse {
        let Some(page) = request.query_value("pageId").and_then(|p| p.parse::<u64>().ok()) else {
            return failure(400, "INVALIDDATA", "pageId is required");
        };
        let state = self.state.borrow();
        let Some(data) = state.resolve(ObjectKind::Page, page, node) else {
            return not_found(format!("page {}", page));
        };
        let Some(tag) = data.get("tags").and_then(|t| t.get(name)) else {
            return not_found(format!("tag {}", name));
        };
        let text = tag
            .pointer("/properties/text/stringValue")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let content = if request.query_value("edit") == Some("true") {
            format!("<div contenteditable=\"true\" data-gcn-tag=\"{}\">{}</div>", name, text)
        } else {
            format!("<div data-gcn-tag=\"{}\">{}</div>", name, text)
        };
        ok(json!({ "content": content }))
    }

    fn preview(&self, body: &Value) -> HttpResponse {
        let Some(page) = body.get("page") else {
            return failure(400, "INVALIDDATA", "page is required");
        };
        let name = page.get("name").and_then(Value::as_str).unwrap_or_default();
        let html = format!(
            "<html><head><title>{}</title></head><body></body></html>",
            name
        );
        ok(json!({ "preview": html }))
    }

    fn object_action(
        &self,
        method: Method,
        kind: ObjectKind,
        action: &str,
        id: u64,
        node: u32,
        body: &Value,
    ) -> HttpResponse {
        let mut state = self.state.borrow_mut();
        match (method, action) {
            (Method::Get, "load") => match state.resolve(kind, id, node) {
                Some(data) => ok(json!({ kind.rest_name(): data })),
                None => not_found(format!("{} {}", kind, id)),
            },
            (Method::Post, "save") => state.save(kind, id, body),
            (Method::Post, "delete") => {
                if state.records.remove(&(kind, id)).is_none() {
                    return not_found(format!("{} {}", kind, id));
                }
                state.records.retain(|(k, _), r| !(*k == kind && r.master == Some(id)));
                ok(json!({}))
            }
            (Method::Post, "publish") => state.set_flag(kind, id, "online", true),
            (Method::Post, "takeOffline") => state.set_flag(kind, id, "online", false),
            (Method::Post, "cancel") => state.set_flag(kind, id, "locked", false),
            (Method::Post, "localize") => {
                let channel = body.get("channelId").and_then(Value::as_u64).unwrap_or(0) as u32;
                state.localize(kind, id, channel)
            }
            (Method::Post, "unlocalize") => {
                let channel = body.get("channelId").and_then(Value::as_u64).unwrap_or(0) as u32;
                state.unlocalize(kind, id, channel)
            }
            _ => not_found(format!("action {} on {}", action, kind)),
        }
    }
}

impl MockState {
    fn local_copy(&self, kind: ObjectKind, master: u64, node: u32) -> Option<u64> {
        self.records
            .iter()
            .find(|((k, _), r)| *k == kind && r.master == Some(master) && r.node == node)
            .map(|((_, id), _)| *id)
    }

    /// What `nodeId = node` sees when asking for `(kind, id)`.
    fn resolve(&self, kind: ObjectKind, id: u64, node: u32) -> Option<Map<String, Value>> {
        let record = self.records.get(&(kind, id))?;
        if kind == ObjectKind::Node {
            return Some(record.data.clone());
        }
        let mut data = if node == 0 || node == record.node {
            record.data.clone()
        } else if record.master.is_some() {
            return None;
        } else if let Some(local) = self.local_copy(kind, id, node) {
            return self.resolve(kind, local, node);
        } else {
            let mut data = record.data.clone();
            data.insert("inherited".into(), json!(true));
            data.insert("inheritedFrom".into(), json!(record.node));
            return Some(data);
        };
        data.insert("inherited".into(), json!(false));
        if let Some(master) = record.master {
            data.insert("masterId".into(), json!(master));
        }
        Some(data)
    }

    fn save(&mut self, kind: ObjectKind, id: u64, body: &Value) -> HttpResponse {
        let Some(record) = self.records.get_mut(&(kind, id)) else {
            return not_found(format!("{} {}", kind, id));
        };
        if let Some(Value::Object(fields)) = body.get(kind.rest_name()) {
            for (key, value) in fields {
                match (key.as_str(), value) {
                    ("id", _) => {}
                    ("tags", Value::Object(tags)) => {
                        let existing = record
                            .data
                            .entry("tags")
                            .or_insert_with(|| json!({}));
                        if let Value::Object(existing) = existing {
                            for (name, tag) in tags {
                                existing.insert(name.clone(), tag.clone());
                            }
                        }
                    }
                    _ => {
                        record.data.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        if let Some(Value::Array(names)) = body.get("delete") {
            if let Some(Value::Object(tags)) = record.data.get_mut("tags") {
                for name in names.iter().filter_map(Value::as_str) {
                    tags.remove(name);
                }
            }
        }
        ok(json!({}))
    }

    fn set_flag(&mut self, kind: ObjectKind, id: u64, flag: &str, value: bool) -> HttpResponse {
        match self.records.get_mut(&(kind, id)) {
            Some(record) => {
                record.data.insert(flag.to_string(), json!(value));
                ok(json!({}))
            }
            None => not_found(format!("{} {}", kind, id)),
        }
    }

    fn localize(&mut self, kind: ObjectKind, id: u64, channel: u32) -> HttpResponse {
        let Some(record) = self.records.get(&(kind, id)) else {
            return not_found(format!("{} {}", kind, id));
        };
        if record.master.is_some() || channel == 0 || channel == record.node {
            return failure(
                400,
                "FAILURE",
                format!("{} {} cannot be localized in {}", kind, id, channel),
            );
        }
        if self.local_copy(kind, id, channel).is_some() {
            return failure(
                400,
                "FAILURE",
                format!("{} {} is already localized in {}", kind, id, channel),
            );
        }
        let mut data = record.data.clone();
        self.next_id += 1;
        let local = self.next_id;
        data.insert("id".into(), json!(local));
        self.records.insert(
            (kind, local),
            Record {
                node: channel,
                master: Some(id),
                data,
            },
        );
        ok(json!({}))
    }

    fn unlocalize(&mut self, kind: ObjectKind, id: u64, channel: u32) -> HttpResponse {
        match self.records.get(&(kind, id)) {
            Some(record) if record.master.is_some() && record.node == channel => {
                self.records.remove(&(kind, id));
                ok(json!({}))
            }
            Some(_) => failure(
                400,
                "FAILURE",
                format!("{} {} is not a local copy in {}", kind, id, channel),
            ),
            None => not_found(format!("{} {}", kind, id)),
        }
    }
}

impl Transport for MockBackend {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let offline = {
            let mut state = self.state.borrow_mut();
            state.log.push(request.clone());
            state.offline
        };
        if offline {
            return Err(GcnError::Http {
                message: "connection refused".into(),
                status: None,
            });
        }
        Ok(self.route(request))
    }
}
