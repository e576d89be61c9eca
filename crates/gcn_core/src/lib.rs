//! GCN Core Library
//!
//! A client for the content-management REST API, providing:
//! - Reference-identity caching of content objects per (type, channel, id)
//! - Chainback navigation (`node.folder()`, `page.tag(name)`, ...)
//! - Multichannelling: localizing and unlocalizing inherited objects
//! - An event bus for errors, session lifecycle and render post-processing
//!
//! # Quick Start
//!
//! ```
//! use gcn_core::{Callbacks, ChannelId, ContentObject, Gcn, Settings};
//! use gcn_core::mock::MockBackend;
//! use std::rc::Rc;
//!
//! let backend = Rc::new(MockBackend::with_fixture());
//! let gcn = Gcn::new(Settings::default(), backend.clone());
//!
//! // Errors nobody handles are fatal unless something listens here.
//! gcn.events().subscribe("error-encountered", |_| Ok(())).unwrap();
//! backend.login_direct(&gcn).unwrap();
//!
//! let page = gcn.page(100u64, ChannelId::NONE, Callbacks::new());
//! let again = gcn.page(100u64, ChannelId::NONE, Callbacks::new());
//! assert!(page.same_instance(&again));
//!
//! gcn.run_until_idle().unwrap();
//! assert_eq!(page.prop("name"), Some("Home".into()));
//! ```
//!
//! # Features
//!
//! ## Asynchronous contract
//!
//! Every operation returns immediately. Network work is queued on the
//! context's [`EventLoop`] and callbacks fire while
//! [`Gcn::run_until_idle`] drains it:
//!
//! ```
//! use gcn_core::{Callbacks, ChannelId, Gcn, Settings};
//! use gcn_core::mock::MockBackend;
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let backend = Rc::new(MockBackend::with_fixture());
//! let gcn = Gcn::new(Settings::default(), backend.clone());
//! gcn.events().subscribe("error-encountered", |_| Ok(())).unwrap();
//! backend.login_direct(&gcn).unwrap();
//!
//! let loaded = Rc::new(Cell::new(false));
//! let flag = loaded.clone();
//! gcn.folder(10u64, ChannelId::NONE, Callbacks::new().on_success(move |_| flag.set(true)));
//! assert!(!loaded.get());
//! gcn.run_until_idle().unwrap();
//! assert!(loaded.get());
//! ```
//!
//! ## Fail loud by default
//!
//! An error without a per-call handler goes to `error-encountered`; with no
//! subscriber there, the driver gets it back:
//!
//! ```
//! use gcn_core::{Callbacks, ChannelId, Gcn, Settings};
//! use gcn_core::mock::MockBackend;
//! use std::rc::Rc;
//!
//! let backend = Rc::new(MockBackend::with_fixture());
//! let gcn = Gcn::new(Settings::default(), backend.clone());
//! backend.login_direct(&gcn).unwrap();
//!
//! gcn.page(9999u64, ChannelId::NONE, Callbacks::new());
//! let err = gcn.run_until_idle().unwrap_err();
//! assert_eq!(err.code(), "NOTFOUND");
//! ```

mod args;
mod cache;
mod cache_key;
mod callback;
mod config;
mod context;
mod error;
mod event_loop;
pub mod mock;
mod multichannel;
mod object;
mod objects;
mod pubsub;
mod rest;
mod session;
mod transport;
mod types;

pub use args::{resolve_args, Arg, ArgCallback, ArgShape, Outcome, ResolvedArgs};
pub use cache::{CacheRegistry, ConstructorCache};
pub use cache_key::{is_localized_response, key_variations, CacheKey};
pub use callback::{Callbacks, ErrorFn, SuccessFn};
pub use config::{
    BackendConfig, CacheConfig, ChannelConfig, ExecutionContext, Settings, CONFIG_FILE,
};
pub use context::Gcn;
pub use error::{ErrorFlow, GcnError, Result};
pub use event_loop::{EventLoop, Task};
pub use multichannel::{localize, unlocalize};
pub use object::{Handle, LocalizationState};
pub use objects::{ContentObject, File, Folder, Image, Node, Page, Tag, Template};
pub use pubsub::{channels, EventBus, Handler, Message, Next, RenderPipeline, RenderStage};
pub use rest::{response_code, ResponseCode};
pub use session::{AuthPrompt, SessionManager, SsoOutcome};
pub use transport::{HttpRequest, HttpResponse, Method, Transport};
pub use types::{Capability, ChannelId, ObjectId, ObjectKind, User};
