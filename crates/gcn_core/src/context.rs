//! The application context every component hangs off.

use crate::args::{resolve_args, Arg};
use crate::cache::CacheRegistry;
use crate::cache_key::CacheKey;
use crate::callback::Callbacks;
use crate::config::Settings;
use crate::error::{ErrorFlow, GcnError, Result};
use crate::event_loop::{EventLoop, Task};
use crate::object::Handle;
use crate::pubsub::EventBus;
use crate::rest::RestClient;
use crate::session::{SessionManager, SessionState};
use crate::transport::Transport;
use crate::types::{ChannelId, ObjectId, ObjectKind};
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use tracing::{debug, warn};

pub(crate) struct GcnInner {
    pub(crate) settings: Settings,
    pub(crate) transport: Rc<dyn Transport>,
    pub(crate) events: EventBus,
    pub(crate) cache: CacheRegistry,
    pub(crate) tasks: EventLoop,
    pub(crate) session: RefCell<SessionState>,
}

/// A CMS client context: settings, transport, event bus, session and caches.
///
/// Cheap to clone; clones share all state. Construct one at startup and pass
/// it to whatever needs CMS objects.
///
/// # Examples
///
/// ```
/// use gcn_core::{Callbacks, ChannelId, ContentObject, Gcn, Settings};
/// use gcn_core::mock::MockBackend;
/// use std::rc::Rc;
///
/// let backend = Rc::new(MockBackend::with_fixture());
/// let gcn = Gcn::new(Settings::default(), backend.clone());
/// gcn.events().subscribe("error-encountered", |_| Ok(())).unwrap();
/// backend.login_direct(&gcn).unwrap();
///
/// let page = gcn.page(100u64, ChannelId::NONE, Callbacks::new());
/// assert!(!page.is_fetched());
/// gcn.run_until_idle().unwrap();
/// assert!(page.is_fetched());
/// ```
#[derive(Clone)]
pub struct Gcn {
    inner: Rc<GcnInner>,
}

impl Gcn {
    /// Creates a context talking to the backend through `transport`.
    pub fn new(settings: Settings, transport: Rc<dyn Transport>) -> Self {
        Self {
            inner: Rc::new(GcnInner {
                settings,
                transport,
                events: EventBus::new(),
                cache: CacheRegistry::new(),
                tasks: EventLoop::new(),
                session: RefCell::new(SessionState::default()),
            }),
        }
    }

    pub(crate) fn from_weak(weak: &Weak<GcnInner>) -> Result<Self> {
        weak.upgrade()
            .map(|inner| Self { inner })
            .ok_or(GcnError::ContextDropped)
    }

    pub(crate) fn downgrade(&self) -> Weak<GcnInner> {
        Rc::downgrade(&self.inner)
    }

    pub(crate) fn inner(&self) -> &GcnInner {
        &self.inner
    }

    /// Configuration this context was built with.
    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    /// The event bus.
    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// The per-type cache tables.
    pub fn cache(&self) -> &CacheRegistry {
        &self.inner.cache
    }

    /// The task queue.
    pub fn event_loop(&self) -> &EventLoop {
        &self.inner.tasks
    }

    /// Session operations.
    pub fn session(&self) -> SessionManager<'_> {
        SessionManager::new(self)
    }

    /// Current session id.
    pub fn sid(&self) -> Option<String> {
        self.inner.session.borrow().sid.clone()
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.inner.transport.as_ref()
    }

    pub(crate) fn rest(&self) -> RestClient<'_> {
        RestClient::new(self)
    }

    pub(crate) fn defer(&self, task: Task) {
        self.inner.tasks.defer(task);
    }

    /// Runs queued work until nothing is left.
    ///
    /// # Errors
    ///
    /// The first error nobody handled: published on `error-encountered`
    /// without a subscriber.
    pub fn run_until_idle(&self) -> Result<usize> {
        self.inner.tasks.run_until_idle()
    }

    /// Routes a failure through the caller's error callback, then the global channel.
    pub(crate) fn fail<T: 'static>(&self, err: GcnError, callbacks: Callbacks<T>) -> Result<()> {
        match callbacks.reject(&err) {
            ErrorFlow::Handled => Ok(()),
            ErrorFlow::Propagate => self.events().publish_error(err),
        }
    }

    /// Defers `fail`, so errors detected up front still arrive asynchronously.
    pub(crate) fn fail_later<T: 'static>(&self, err: GcnError, callbacks: Callbacks<T>) {
        let gcn = self.clone();
        self.defer(Box::new(move || gcn.fail(err, callbacks)));
    }

    /// Returns the handle for `(kind, channel, id)`, creating a placeholder on a miss.
    ///
    /// The handle is returned immediately; `callbacks` run once it is fetched.
    /// Repeated requests before the first fetch completes return the same
    /// instance.
    pub fn request(
        &self,
        kind: ObjectKind,
        id: impl Into<ObjectId>,
        channel: ChannelId,
        callbacks: Callbacks<Handle>,
    ) -> Handle {
        let key = CacheKey::derive(kind, channel, id.into(), None);
        self.request_key(key, None, callbacks)
    }

    pub(crate) fn request_key(
        &self,
        key: CacheKey,
        chain_parent: Option<CacheKey>,
        callbacks: Callbacks<Handle>,
    ) -> Handle {
        let handle = match self.cache().get(&key) {
            Some(handle) => {
                debug!(%key, "cache hit");
                handle
            }
            None => {
                debug!(%key, "cache miss; creating placeholder");
                let handle = Handle::new(self.downgrade(), key.clone(), chain_parent);
                self.cache().set(key, &handle);
                handle
            }
        };
        handle.load(callbacks);
        handle
    }

    /// Like [`request`](Self::request), with loosely typed arguments.
    ///
    /// Accepts an id plus, in any order, up to two callbacks (success then
    /// error) and one settings object (`nodeId`/`channel`). See
    /// [`resolve_args`].
    ///
    /// # Errors
    ///
    /// `UNKNOWN_ARGUMENT` when an argument cannot be placed or the id is
    /// missing. The error is also published on `error-encountered`.
    pub fn request_with_args(&self, kind: ObjectKind, args: Vec<Arg>) -> Result<Handle> {
        let resolved = resolve_args(args).and_then(|resolved| match resolved.id.clone() {
            Some(id) => Ok((id, resolved)),
            None => Err(GcnError::UnknownArgument {
                message: "no id among the arguments".into(),
            }),
        });
        match resolved {
            Ok((id, resolved)) => {
                let channel = resolved
                    .channel()
                    .unwrap_or(ChannelId(self.settings().channel.default_channel));
                Ok(self.request(kind, id, channel, resolved.callbacks))
            }
            Err(err) => {
                warn!(error = %err, "rejected request arguments");
                match self.events().publish_error(err.clone()) {
                    Ok(()) => Err(err),
                    Err(published) if published == err => {
                        debug!(code = err.code(), "argument error has no global subscriber");
                        Err(err)
                    }
                    Err(published) => {
                        warn!(error = %published, "publishing the argument error failed");
                        Err(published)
                    }
                }
            }
        }
    }

    /// Registers server data obtained from a listing as a fetched handle.
    pub(crate) fn adopt(
        &self,
        kind: ObjectKind,
        channel: ChannelId,
        data: Map<String, Value>,
    ) -> Result<Handle> {
        let id = data
            .get("id")
            .and_then(ObjectId::from_value)
            .ok_or_else(|| {
                GcnError::Serialization(format!("{} entry without an id", kind.rest_name()))
            })?;
        let key = CacheKey::derive(kind, channel, id, None);
        let handle = match self.cache().get(&key) {
            Some(handle) => handle,
            None => {
                let handle = Handle::new(self.downgrade(), key.clone(), None);
                self.cache().set(key, &handle);
                handle
            }
        };
        handle.apply_response(self, data);
        Ok(handle)
    }
}
