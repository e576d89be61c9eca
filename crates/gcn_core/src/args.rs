//! Compatibility shim for loosely typed request arguments.
//!
//! Callers that cannot use the typed API pass a list of [`Arg`]s. Each
//! argument is classified by its runtime shape alone:
//!
//! | Shape             | Role                                      |
//! |-------------------|-------------------------------------------|
//! | number / string   | id (at most one)                          |
//! | callback          | success first, error second (at most two) |
//! | object            | settings (at most one)                    |
//! | array, null, bool | rejected                                  |
//!
//! Anything that does not fit is `UNKNOWN_ARGUMENT`.

use crate::callback::Callbacks;
use crate::error::{ErrorFlow, GcnError, Result};
use crate::object::Handle;
use crate::types::{ChannelId, ObjectId};
use serde_json::{Map, Value};
use std::fmt;

/// What a shim callback receives.
pub enum Outcome {
    /// The object was fetched.
    Loaded(Handle),
    /// The request failed.
    Failed(GcnError),
}

/// A callback passed through the shim. Its return value only matters in the error role.
pub type ArgCallback = Box<dyn FnOnce(Outcome) -> ErrorFlow>;

/// One loosely typed argument.
pub enum Arg {
    /// An id.
    Id(ObjectId),
    /// A callback.
    Callback(ArgCallback),
    /// A settings object.
    Settings(Map<String, Value>),
    /// An array.
    Array(Vec<Value>),
    /// Any other JSON value.
    Other(Value),
}

impl Arg {
    /// Wraps a closure as a callback argument.
    pub fn callback(f: impl FnOnce(Outcome) -> ErrorFlow + 'static) -> Self {
        Arg::Callback(Box::new(f))
    }

    /// The role this argument would take.
    pub fn shape(&self) -> ArgShape {
        match self {
            Arg::Id(_) => ArgShape::Id,
            Arg::Callback(_) => ArgShape::Callback,
            Arg::Settings(_) => ArgShape::Settings,
            Arg::Array(_) => ArgShape::Array,
            Arg::Other(_) => ArgShape::Other,
        }
    }
}

impl fmt::Debug for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Id(id) => write!(f, "Id({})", id),
            Arg::Callback(_) => write!(f, "Callback(<fn>)"),
            Arg::Settings(m) => write!(f, "Settings({})", Value::Object(m.clone())),
            Arg::Array(a) => write!(f, "Array({} items)", a.len()),
            Arg::Other(v) => write!(f, "Other({})", v),
        }
    }
}

impl From<u64> for Arg {
    fn from(n: u64) -> Self {
        Arg::Id(ObjectId::Num(n))
    }
}

impl From<&str> for Arg {
    fn from(s: &str) -> Self {
        Arg::Id(ObjectId::from(s))
    }
}

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        match value {
            Value::Number(n) => match n.as_u64() {
                Some(id) => Arg::Id(ObjectId::Num(id)),
                None => Arg::Other(Value::Number(n)),
            },
            Value::String(s) => Arg::Id(ObjectId::from(s)),
            Value::Object(m) => Arg::Settings(m),
            Value::Array(a) => Arg::Array(a),
            other => Arg::Other(other),
        }
    }
}

/// Runtime shape of an argument.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArgShape {
    /// Number or string.
    Id,
    /// Function.
    Callback,
    /// Plain object.
    Settings,
    /// Array.
    Array,
    /// Anything else.
    Other,
}

/// Arguments sorted into their roles.
pub struct ResolvedArgs {
    /// The id, if one was given.
    pub id: Option<ObjectId>,
    /// Success and error callbacks.
    pub callbacks: Callbacks<Handle>,
    /// The settings object (empty if none was given).
    pub settings: Map<String, Value>,
}

impl ResolvedArgs {
    /// Channel named by the settings (`nodeId` or `channel`).
    pub fn channel(&self) -> Option<ChannelId> {
        ["nodeId", "channel"]
            .iter()
            .find_map(|key| self.settings.get(*key))
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
            .map(ChannelId)
    }
}

fn unknown(message: String) -> GcnError {
    GcnError::UnknownArgument { message }
}

/// Sorts arguments into id, callbacks and settings.
///
/// # Errors
///
/// `UNKNOWN_ARGUMENT` for a second id, a third callback, a second settings
/// object, or any array/null/bool.
pub fn resolve_args(args: Vec<Arg>) -> Result<ResolvedArgs> {
    let mut id: Option<ObjectId> = None;
    let mut success: Option<ArgCallback> = None;
    let mut error: Option<ArgCallback> = None;
    let mut settings: Option<Map<String, Value>> = None;

    for (position, arg) in args.into_iter().enumerate() {
        match arg {
            Arg::Id(value) => {
                if let Some(existing) = &id {
                    return Err(unknown(format!(
                        "argument {} is a second id ({} already given)",
                        position, existing
                    )));
                }
                id = Some(value);
            }
            Arg::Callback(f) => {
                if success.is_none() {
                    success = Some(f);
                } else if error.is_none() {
                    error = Some(f);
                } else {
                    return Err(unknown(format!(
                        "argument {} is a third callback",
                        position
                    )));
                }
            }
            Arg::Settings(map) => {
                if settings.is_some() {
                    return Err(unknown(format!(
                        "argument {} is a second settings object",
                        position
                    )));
                }
                settings = Some(map);
            }
            Arg::Array(_) => {
                return Err(unknown(format!("argument {} is an array", position)));
            }
            Arg::Other(value) => {
                return Err(unknown(format!(
                    "argument {} has unsupported value {}",
                    position, value
                )));
            }
        }
    }

    let mut callbacks = Callbacks::new();
    if let Some(f) = success {
        callbacks = callbacks.on_success(move |handle| {
            f(Outcome::Loaded(handle));
        });
    }
    if let Some(f) = error {
        callbacks = callbacks.on_error(move |err| f(Outcome::Failed(err.clone())));
    }

    Ok(ResolvedArgs {
        id,
        callbacks,
        settings: settings.unwrap_or_default(),
    })
}
