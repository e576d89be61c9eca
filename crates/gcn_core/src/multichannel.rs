//! Localizing and unlocalizing objects in a channel.
//!
//! Both directions probe the object's current `inherited` flag first and
//! fail without contacting the change endpoint when the object is in the
//! wrong state. Afterwards the cache is rewired so that requests for the
//! original id return the new object.

use crate::cache_key::CacheKey;
use crate::callback::Callbacks;
use crate::context::Gcn;
use crate::error::GcnError;
use crate::object::{extract_object, load_request, Handle, Transition};
use crate::transport::HttpRequest;
use crate::types::ObjectId;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Direction {
    Localize,
    Unlocalize,
}

impl Direction {
    fn action(self) -> &'static str {
        match self {
            Direction::Localize => "localize",
            Direction::Unlocalize => "unlocalize",
        }
    }

    /// `inherited` value the object must currently have.
    fn expects_inherited(self) -> bool {
        self == Direction::Localize
    }

    fn refusal(self, message: String) -> GcnError {
        match self {
            Direction::Localize => GcnError::CannotLocalize { message },
            Direction::Unlocalize => GcnError::CannotUnlocalize { message },
        }
    }

    fn transition(self) -> Transition {
        match self {
            Direction::Localize => Transition::Localizing,
            Direction::Unlocalize => Transition::Unlocalizing,
        }
    }
}

/// Creates a channel-local copy of an inherited object.
///
/// On success the local copy is cached under the original id in this
/// channel, and `handle` is cleared and marked stale.
pub fn localize(handle: &Handle, callbacks: Callbacks<Handle>) {
    start(handle, Direction::Localize, callbacks)
}

/// Removes a channel-local copy so the inherited object shows through again.
///
/// Fails with `CANNONT_UNLOCALIZE` unless the object is a local copy.
pub fn unlocalize(handle: &Handle, callbacks: Callbacks<Handle>) {
    start(handle, Direction::Unlocalize, callbacks)
}

fn start(handle: &Handle, direction: Direction, callbacks: Callbacks<Handle>) {
    let gcn = match handle.context() {
        Ok(gcn) => gcn,
        Err(e) => {
            callbacks.reject(&e);
            return;
        }
    };
    let channel = handle.channel();
    if channel.is_none() {
        let err = direction.refusal(format!("{} is not requested in a channel", handle.hash()));
        gcn.fail_later(err, callbacks);
        return;
    }

    let probe = load_request(handle.kind(), &handle.id(), channel);
    let handle = handle.clone();
    let g = gcn.clone();
    gcn.rest().call(
        probe,
        Box::new(move |result| {
            let data = match result.and_then(|body| extract_object(handle.kind(), &body)) {
                Ok(data) => data,
                Err(err) => return g.fail(err, callbacks),
            };
            let inherited = data.get("inherited").and_then(Value::as_bool).unwrap_or(false);
            if inherited != direction.expects_inherited() {
                let state = if inherited { "inherited" } else { "not inherited" };
                let err = direction.refusal(format!(
                    "{} is {} in channel {}",
                    handle.hash(),
                    state,
                    handle.channel()
                ));
                return g.fail(err, callbacks);
            }
            change(&g, handle, direction, data, callbacks);
            Ok(())
        }),
    );
}

fn change(
    gcn: &Gcn,
    handle: Handle,
    direction: Direction,
    probed: Map<String, Value>,
    callbacks: Callbacks<Handle>,
) {
    handle.set_transition(Some(direction.transition()));
    info!(key = %handle.hash(), action = direction.action(), "multichannelling transition started");
    // the probe tells which object the channel actually shows
    let target = probed_id(&handle, &probed);
    let request = HttpRequest::post(
        format!("/{}/{}/{}", handle.kind().rest_name(), direction.action(), target),
        json!({ "channelId": handle.channel().0 }),
    );
    let g = gcn.clone();
    gcn.rest().call(
        request,
        Box::new(move |result| {
            if let Err(err) = result {
                handle.set_transition(None);
                return g.fail(err, callbacks);
            }
            match direction {
                Direction::Localize => refetch_local_copy(&g, handle, callbacks),
                Direction::Unlocalize => {
                    let master = master_id(&handle, &probed);
                    retire(&g, &handle);
                    info!(key = %handle.hash(), master = %master, "unlocalized");
                    g.request(handle.kind(), master, handle.channel(), callbacks);
                }
            }
            Ok(())
        }),
    );
}

fn probed_id(handle: &Handle, probed: &Map<String, Value>) -> ObjectId {
    probed
        .get("id")
        .and_then(ObjectId::from_value)
        .unwrap_or_else(|| handle.id())
}

/// The inherited object's id: the id the handle was requested under, unless
/// the local copy itself was requested.
fn master_id(handle: &Handle, probed: &Map<String, Value>) -> ObjectId {
    let requested = handle.requested_id();
    if requested != probed_id(handle, probed) {
        return requested;
    }
    probed
        .get("masterId")
        .and_then(ObjectId::from_value)
        .unwrap_or(requested)
}

/// Takes a superseded handle out of every cache slot.
fn retire(gcn: &Gcn, handle: &Handle) {
    let removed = gcn.cache().remove_all(handle);
    debug!(key = %handle.hash(), removed, "retiring superseded handle");
    handle.clear();
    handle.mark_stale();
}

fn refetch_local_copy(gcn: &Gcn, original: Handle, callbacks: Callbacks<Handle>) {
    let request = load_request(original.kind(), &original.requested_id(), original.channel());
    let g = gcn.clone();
    gcn.rest().call(
        request,
        Box::new(move |result| {
            let data = match result.and_then(|body| extract_object(original.kind(), &body)) {
                Ok(data) => data,
                Err(err) => {
                    original.set_transition(None);
                    return g.fail(err, callbacks);
                }
            };
            let local = initialize(&g, &original, data);
            info!(original = %original.hash(), local = %local.hash(), "localized");
            callbacks.succeed(local);
            Ok(())
        }),
    );
}

/// Installs the local copy in the original's slot and retires the original.
fn initialize(gcn: &Gcn, original: &Handle, data: Map<String, Value>) -> Handle {
    let key = CacheKey::derive(
        original.kind(),
        original.channel(),
        original.requested_id(),
        None,
    );
    retire(gcn, original);
    let local = Handle::new(gcn.downgrade(), key.clone(), None);
    gcn.cache().set(key, &local);
    local.apply_response(gcn, data);
    local
}
