//! Cache-backed content object handles.
//!
//! A [`Handle`] is the single live instance for one cache slot. It starts as
//! a placeholder holding only its id, becomes fetched when the backend
//! answers, and can be cleared back to the placeholder state at any time.

use crate::cache_key::{key_variations, CacheKey};
use crate::callback::Callbacks;
use crate::context::{Gcn, GcnInner};
use crate::error::{ErrorFlow, GcnError, Result};
use crate::transport::HttpRequest;
use crate::types::{ChannelId, ObjectId, ObjectKind};
use serde_json::{json, Map, Value};
use std::cell::RefCell;
use std::fmt;
use std::mem;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

static NEXT_SERIAL: AtomicU64 = AtomicU64::new(1);

/// Where an object stands in the multichannelling workflow.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LocalizationState {
    /// Only the inherited master exists in this channel.
    Inherited,
    /// A localize call is in flight.
    Localizing,
    /// A channel-local copy exists.
    Localized,
    /// An unlocalize call is in flight.
    Unlocalizing,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Transition {
    Localizing,
    Unlocalizing,
}

pub(crate) struct ObjectState {
    serial: u64,
    kind: ObjectKind,
    id: ObjectId,
    requested_id: ObjectId,
    channel: ChannelId,
    data: Map<String, Value>,
    changes: Map<String, Value>,
    fetched: bool,
    stale: bool,
    in_flight: bool,
    hash: CacheKey,
    requested_key: CacheKey,
    chain_parent: Option<CacheKey>,
    transition: Option<Transition>,
    waiters: Vec<Callbacks<Handle>>,
}

/// Shared handle to one content object.
///
/// Clones refer to the same instance; use [`ptr_eq`](Self::ptr_eq) to test
/// identity.
#[derive(Clone)]
pub struct Handle {
    state: Rc<RefCell<ObjectState>>,
    ctx: Weak<GcnInner>,
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.state.borrow();
        f.debug_struct("Handle")
            .field("hash", &s.hash.to_string())
            .field("fetched", &s.fetched)
            .field("stale", &s.stale)
            .finish()
    }
}

fn id_only(id: &ObjectId) -> Map<String, Value> {
    let mut data = Map::new();
    data.insert("id".into(), id.to_value());
    data
}

/// Pulls the `<type>` object out of a load response.
pub(crate) fn extract_object(kind: ObjectKind, body: &Value) -> Result<Map<String, Value>> {
    body.get(kind.rest_name())
        .and_then(Value::as_object)
        .cloned()
        .ok_or_else(|| {
            GcnError::Serialization(format!("response has no '{}' object", kind.rest_name()))
        })
}

/// GET request loading one object, scoped to a channel when one is in effect.
pub(crate) fn load_request(kind: ObjectKind, id: &ObjectId, channel: ChannelId) -> HttpRequest {
    HttpRequest::get(format!("/{}/load/{}", kind.rest_name(), id))
        .with_query_opt("nodeId", channel.as_query())
}

impl Handle {
    pub(crate) fn new(ctx: Weak<GcnInner>, key: CacheKey, chain_parent: Option<CacheKey>) -> Self {
        let id = key.id().clone();
        let state = ObjectState {
            serial: NEXT_SERIAL.fetch_add(1, Ordering::Relaxed),
            kind: key.kind(),
            requested_id: id.clone(),
            channel: key.channel(),
            data: id_only(&id),
            id,
            changes: Map::new(),
            fetched: false,
            stale: false,
            in_flight: false,
            requested_key: key.clone(),
            hash: key,
            chain_parent,
            transition: None,
            waiters: Vec::new(),
        };
        Self {
            state: Rc::new(RefCell::new(state)),
            ctx,
        }
    }

    /// A handle not attached to any client context. Loading it fails.
    pub fn detached(kind: ObjectKind, id: ObjectId, channel: ChannelId) -> Self {
        Self::new(Weak::new(), CacheKey::derive(kind, channel, id, None), None)
    }

    pub(crate) fn context(&self) -> Result<Gcn> {
        Gcn::from_weak(&self.ctx)
    }

    /// Object type.
    pub fn kind(&self) -> ObjectKind {
        self.state.borrow().kind
    }

    /// Current server id. Differs from the requested id once a local copy was substituted.
    pub fn id(&self) -> ObjectId {
        self.state.borrow().id.clone()
    }

    /// The id this handle was first requested under.
    pub fn requested_id(&self) -> ObjectId {
        self.state.borrow().requested_id.clone()
    }

    /// Channel scope.
    pub fn channel(&self) -> ChannelId {
        self.state.borrow().channel
    }

    /// Cache key currently indexing this instance.
    pub fn hash(&self) -> CacheKey {
        self.state.borrow().hash.clone()
    }

    /// The key this handle was created under. Unlike [`hash`](Self::hash) it
    /// survives substitution of a channel-local copy, so chained objects key
    /// off it.
    pub fn requested_key(&self) -> CacheKey {
        self.state.borrow().requested_key.clone()
    }

    /// Key of the object this one was chained from.
    pub fn chain_parent(&self) -> Option<CacheKey> {
        self.state.borrow().chain_parent.clone()
    }

    /// Process-unique instance number.
    pub fn serial(&self) -> u64 {
        self.state.borrow().serial
    }

    /// Whether `data` holds full server state.
    pub fn is_fetched(&self) -> bool {
        self.state.borrow().fetched
    }

    /// Whether this instance was superseded (e.g. by a channel-local copy).
    pub fn is_stale(&self) -> bool {
        self.state.borrow().stale
    }

    /// Whether a fetch for this instance is outstanding.
    pub fn is_in_flight(&self) -> bool {
        self.state.borrow().in_flight
    }

    /// Reference identity.
    pub fn ptr_eq(&self, other: &Handle) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }

    /// Snapshot of the shadowed server fields.
    pub fn data(&self) -> Value {
        Value::Object(self.state.borrow().data.clone())
    }

    /// Fields changed locally since the last save.
    pub fn changes(&self) -> Map<String, Value> {
        self.state.borrow().changes.clone()
    }

    pub(crate) fn raw_prop(&self, name: &str) -> Option<Value> {
        self.state.borrow().data.get(name).cloned()
    }

    /// Reads a field. On an unfetched handle this schedules the lazy refetch
    /// and returns what the placeholder holds.
    pub fn prop(&self, name: &str) -> Option<Value> {
        let (fetched, in_flight, stale) = {
            let s = self.state.borrow();
            (s.fetched, s.in_flight, s.stale)
        };
        if !fetched && !in_flight && !stale && self.context().is_ok() {
            self.load(Callbacks::new());
        }
        self.raw_prop(name)
    }

    /// Writes a field into the shadow and records it for the next save.
    ///
    /// # Errors
    ///
    /// `READONLY_ATTRIBUTE` for backend-owned fields.
    pub fn set_prop(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        let kind = self.kind();
        if kind.readonly_attributes().contains(&name) {
            return Err(GcnError::ReadonlyAttribute {
                kind: kind.name().to_string(),
                attribute: name.to_string(),
            });
        }
        let value = value.into();
        let mut s = self.state.borrow_mut();
        s.data.insert(name.to_string(), value.clone());
        s.changes.insert(name.to_string(), value);
        Ok(())
    }

    /// The `inherited` flag, once fetched.
    pub fn is_inherited(&self) -> Option<bool> {
        let s = self.state.borrow();
        if !s.fetched {
            return None;
        }
        s.data.get("inherited").and_then(Value::as_bool)
    }

    /// Multichannelling state; `None` outside a channel or before the first fetch.
    pub fn localization_state(&self) -> Option<LocalizationState> {
        let s = self.state.borrow();
        match s.transition {
            Some(Transition::Localizing) => return Some(LocalizationState::Localizing),
            Some(Transition::Unlocalizing) => return Some(LocalizationState::Unlocalizing),
            None => {}
        }
        if s.channel.is_none() || !s.fetched {
            return None;
        }
        match s.data.get("inherited").and_then(Value::as_bool) {
            Some(true) => Some(LocalizationState::Inherited),
            _ => Some(LocalizationState::Localized),
        }
    }

    /// Drops everything but the id. The handle stays cached and refetches on next use.
    pub fn clear(&self) {
        let mut s = self.state.borrow_mut();
        s.data = id_only(&s.id);
        s.changes.clear();
        s.fetched = false;
    }

    /// Removes this handle from under its own cache key.
    pub fn decache(&self) -> bool {
        match self.context() {
            Ok(gcn) => gcn.cache().decache(self),
            Err(_) => false,
        }
    }

    /// Ensures the handle is fetched, then calls back (always asynchronously).
    ///
    /// A superseded handle forwards to whatever now occupies its slot.
    pub fn load(&self, callbacks: Callbacks<Handle>) {
        let gcn = match self.context() {
            Ok(gcn) => gcn,
            Err(e) => {
                callbacks.reject(&e);
                return;
            }
        };

        let (fetched, in_flight, stale) = {
            let s = self.state.borrow();
            (s.fetched, s.in_flight, s.stale)
        };

        if stale {
            debug!(key = %self.hash(), "stale handle; resolving through cache");
            gcn.request(self.kind(), self.requested_id(), self.channel(), callbacks);
            return;
        }

        if fetched {
            let handle = self.clone();
            gcn.defer(Box::new(move || {
                callbacks.succeed(handle);
                Ok(())
            }));
            return;
        }

        self.state.borrow_mut().waiters.push(callbacks);
        if in_flight && gcn.settings().cache.dedupe_in_flight {
            debug!(key = %self.hash(), "joining in-flight fetch");
            return;
        }
        self.fetch(&gcn);
    }

    fn fetch(&self, gcn: &Gcn) {
        self.state.borrow_mut().in_flight = true;
        if self.kind().needs_chained_hash() {
            self.fetch_chained(gcn);
            return;
        }

        let request = load_request(self.kind(), &self.id(), self.channel());
        debug!(key = %self.hash(), "fetching");
        let handle = self.clone();
        let g = gcn.clone();
        gcn.rest().call(
            request,
            Box::new(move |result| {
                match result.and_then(|body| extract_object(handle.kind(), &body)) {
                    Ok(data) => {
                        handle.apply_response(&g, data);
                        handle.succeed_waiters();
                        Ok(())
                    }
                    Err(err) => handle.fail_fetch(&g, err),
                }
            }),
        );
    }

    /// Chained objects are fetched through their parent's representation.
    fn fetch_chained(&self, gcn: &Gcn) {
        let parent = self.chain_parent().and_then(|key| gcn.cache().get(&key));
        let Some(parent) = parent else {
            let err = GcnError::Server {
                code: "NOTFOUND".into(),
                message: format!("parent of {} is no longer cached", self.hash()),
                data: None,
            };
            let handle = self.clone();
            let g = gcn.clone();
            gcn.defer(Box::new(move || handle.fail_fetch(&g, err)));
            return;
        };

        let on_loaded = self.clone();
        let on_failed = self.clone();
        let g = gcn.clone();
        let g_err = gcn.clone();
        parent.load(
            Callbacks::new()
                .on_success(move |parent: Handle| {
                    let g2 = g.clone();
                    g.defer(Box::new(move || on_loaded.complete_chained(&g2, &parent)));
                })
                .on_error(move |err| on_failed.fail_waiters(&g_err, err)),
        );
    }

    fn complete_chained(&self, gcn: &Gcn, parent: &Handle) -> Result<()> {
        let name = self.id().to_string();
        let data = parent
            .raw_prop("tags")
            .and_then(|tags| tags.get(&name).and_then(Value::as_object).cloned());
        match data {
            Some(data) => {
                {
                    let mut s = self.state.borrow_mut();
                    s.data = data;
                    s.changes.clear();
                    s.fetched = true;
                    s.in_flight = false;
                }
                gcn.cache().set(self.hash(), self);
                self.succeed_waiters();
                Ok(())
            }
            None => {
                let err = GcnError::Server {
                    code: "NOTFOUND".into(),
                    message: format!("tag '{}' not found in {}", name, parent.hash()),
                    data: None,
                };
                self.fail_fetch(gcn, err)
            }
        }
    }

    /// Stores a server representation and registers every key it is reachable under.
    pub(crate) fn apply_response(&self, gcn: &Gcn, data: Map<String, Value>) {
        let requested_key = self.hash();
        let response_id = data
            .get("id")
            .and_then(ObjectId::from_value)
            .unwrap_or_else(|| self.id());
        let keys = key_variations(&requested_key, &response_id);
        let localized = keys.len() > 1;
        {
            let mut s = self.state.borrow_mut();
            s.id = response_id.clone();
            s.data = data;
            s.changes.clear();
            s.fetched = true;
            s.in_flight = false;
            s.stale = false;
            if localized {
                s.hash = requested_key.with_id(response_id.clone());
            }
        }
        if localized {
            info!(
                requested = %requested_key,
                local = %response_id,
                "channel-local copy substituted"
            );
        }
        gcn.cache().add_references(&keys, self);
    }

    fn succeed_waiters(&self) {
        let waiters = mem::take(&mut self.state.borrow_mut().waiters);
        for waiter in waiters {
            waiter.succeed(self.clone());
        }
    }

    /// Rejects every waiter; `Propagate` if any of them wants the error published.
    fn fail_waiters(&self, gcn: &Gcn, err: &GcnError) -> ErrorFlow {
        let (waiters, fetched) = {
            let mut s = self.state.borrow_mut();
            s.in_flight = false;
            (mem::take(&mut s.waiters), s.fetched)
        };
        if !fetched {
            gcn.cache().decache(self);
        }
        debug!(key = %self.hash(), error = %err, "fetch failed");
        let mut flow = if waiters.is_empty() {
            ErrorFlow::Propagate
        } else {
            ErrorFlow::Handled
        };
        for waiter in waiters {
            if waiter.reject(err) == ErrorFlow::Propagate {
                flow = ErrorFlow::Propagate;
            }
        }
        flow
    }

    fn fail_fetch(&self, gcn: &Gcn, err: GcnError) -> Result<()> {
        match self.fail_waiters(gcn, &err) {
            ErrorFlow::Handled => Ok(()),
            ErrorFlow::Propagate => gcn.events().publish_error(err),
        }
    }

    pub(crate) fn mark_stale(&self) {
        let mut s = self.state.borrow_mut();
        s.stale = true;
        s.transition = None;
    }

    pub(crate) fn set_transition(&self, transition: Option<Transition>) {
        self.state.borrow_mut().transition = transition;
    }

    #[cfg(test)]
    pub(crate) fn replace_data(&self, data: Map<String, Value>) {
        let mut s = self.state.borrow_mut();
        s.data = data;
        s.fetched = true;
    }

    /// Edits the shadowed data in place without recording changes.
    pub(crate) fn update_data(&self, f: impl FnOnce(&mut Map<String, Value>)) {
        f(&mut self.state.borrow_mut().data);
    }

    pub(crate) fn clear_changes(&self) {
        self.state.borrow_mut().changes.clear();
    }

    /// `/<type>/<action>/<id>`
    pub(crate) fn action_path(&self, action: &str) -> String {
        format!("/{}/{}/{}", self.kind().rest_name(), action, self.id())
    }

    /// POSTs `/<type>/<action>/<id>` in this handle's channel and hands back the body.
    pub(crate) fn post_action(&self, action: &str, body: Value, callbacks: Callbacks<Value>) {
        let gcn = match self.context() {
            Ok(gcn) => gcn,
            Err(e) => {
                callbacks.reject(&e);
                return;
            }
        };
        let request = HttpRequest::post(self.action_path(action), body)
            .with_query_opt("nodeId", self.channel().as_query());
        let g = gcn.clone();
        gcn.rest().call(
            request,
            Box::new(move |result| match result {
                Ok(body) => {
                    callbacks.succeed(body);
                    Ok(())
                }
                Err(err) => g.fail(err, callbacks),
            }),
        );
    }

    /// Sends locally changed fields to the backend.
    pub(crate) fn save(&self, callbacks: Callbacks<Handle>) {
        let mut payload = self.changes();
        payload.insert("id".into(), self.id().to_value());
        let body = json!({ self.kind().rest_name(): payload });
        let handle = self.clone();
        self.post_action(
            "save",
            body,
            callbacks.map(move |_body: Value| {
                handle.clear_changes();
                handle
            }),
        );
    }

    /// Deletes the object and drops it from every cache key.
    pub(crate) fn remove(&self, callbacks: Callbacks<()>) {
        let handle = self.clone();
        self.post_action(
            "delete",
            json!({}),
            callbacks.map(move |_body: Value| {
                if let Ok(gcn) = handle.context() {
                    gcn.cache().remove_all(&handle);
                }
                handle.clear();
                handle.mark_stale();
            }),
        );
    }

    /// Loads this handle, then continues with `then` as a separate task.
    pub(crate) fn with_loaded<T: 'static>(
        &self,
        callbacks: Callbacks<T>,
        then: impl FnOnce(Gcn, Handle, Callbacks<T>) -> Result<()> + 'static,
    ) {
        let gcn = match self.context() {
            Ok(gcn) => gcn,
            Err(e) => {
                callbacks.reject(&e);
                return;
            }
        };
        let slot = Rc::new(RefCell::new(Some(callbacks)));
        let error_slot = slot.clone();
        self.load(
            Callbacks::new()
                .on_success(move |handle: Handle| {
                    let taken = slot.borrow_mut().take();
                    if let Some(callbacks) = taken {
                        let g = gcn.clone();
                        gcn.defer(Box::new(move || then(g, handle, callbacks)));
                    }
                })
                .on_error(move |err| {
                    let taken = error_slot.borrow_mut().take();
                    match taken {
                        Some(callbacks) => callbacks.reject(err),
                        None => ErrorFlow::Propagate,
                    }
                }),
        );
    }
}
