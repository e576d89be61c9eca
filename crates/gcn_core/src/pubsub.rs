//! Event bus for errors, session lifecycle and render post-processing.
//!
//! Ordinary channels fan out synchronously to every subscriber. Render
//! channels (`tag.rendered`, `page.rendered`, `content-rendered`) instead
//! run their subscribers as an ordered [`RenderPipeline`]: each stage
//! receives the markup produced by the previous one and hands its own result
//! to [`Next::run`], possibly later from a deferred task.

use crate::error::{GcnError, Result};
use crate::object::Handle;
use crate::session::AuthPrompt;
use crate::types::User;
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use tracing::{trace, warn};

/// Channel names forming the event-bus protocol.
pub mod channels {
    /// Every error not handled by a per-call callback.
    pub const ERROR_ENCOUNTERED: &str = "error-encountered";
    /// A request needs a fresh login before it can be retried.
    pub const AUTHENTICATION_REQUIRED: &str = "session.authentication-required";
    /// Login, SSO or re-authentication succeeded.
    pub const AUTHENTICATED: &str = "session.authenticated";
    /// The session id changed.
    pub const SID_SET: &str = "session.sid-set";
    /// A tag was rendered.
    pub const TAG_RENDERED: &str = "tag.rendered";
    /// A page preview was rendered.
    pub const PAGE_RENDERED: &str = "page.rendered";
    /// Editable content was rendered.
    pub const CONTENT_RENDERED: &str = "content-rendered";

    /// Channels whose subscribers form a pipeline.
    pub const RENDER_CHANNELS: [&str; 3] = [TAG_RENDERED, PAGE_RENDERED, CONTENT_RENDERED];

    /// Maps legacy aliases onto their canonical channel name.
    pub fn canonical(name: &str) -> &str {
        match name {
            "authentication-required" => AUTHENTICATION_REQUIRED,
            "authenticated" => AUTHENTICATED,
            "session-set" => SID_SET,
            other => other,
        }
    }

    /// Whether `name` is a render channel.
    pub fn is_render_channel(name: &str) -> bool {
        RENDER_CHANNELS.contains(&canonical(name))
    }
}

use channels::ERROR_ENCOUNTERED;

/// Payload of a publication.
#[derive(Clone)]
pub enum Message {
    /// An error object.
    Error(GcnError),
    /// Re-authentication request; the prompt resumes or cancels queued work.
    AuthenticationRequired(AuthPrompt),
    /// The now-authenticated user.
    Authenticated(User),
    /// The new session id.
    SidSet(String),
    /// Free-form payload for application channels.
    Payload(Value),
}

impl Message {
    /// The error carried by this message, if any.
    pub fn as_error(&self) -> Option<&GcnError> {
        match self {
            Message::Error(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Error(e) => write!(f, "Error({})", e),
            Message::AuthenticationRequired(_) => write!(f, "AuthenticationRequired"),
            Message::Authenticated(u) => write!(f, "Authenticated({})", u.login),
            Message::SidSet(_) => write!(f, "SidSet(<redacted>)"),
            Message::Payload(v) => write!(f, "Payload({})", v),
        }
    }
}

/// Subscriber of an ordinary channel. An `Err` becomes a `PUBSUB_HANDLER_FAILED` publication.
pub type Handler = Rc<dyn Fn(&Message) -> Result<()>>;

/// One step of a render pipeline.
pub trait RenderStage {
    /// Transforms `html` and eventually passes the result to `next`.
    fn process(&self, html: String, object: &Handle, next: Next);
}

impl<F> RenderStage for F
where
    F: Fn(String, &Handle, Next),
{
    fn process(&self, html: String, object: &Handle, next: Next) {
        self(html, object, next)
    }
}

/// Continuation handed to a render stage; runs the rest of the pipeline.
pub struct Next {
    stages: Rc<[Rc<dyn RenderStage>]>,
    index: usize,
    object: Handle,
    done: Box<dyn FnOnce(String)>,
}

impl Next {
    /// Continues with the next stage, or the original caller after the last one.
    pub fn run(self, html: String) {
        let Next {
            stages,
            index,
            object,
            done,
        } = self;
        match stages.get(index).cloned() {
            Some(stage) => {
                let next = Next {
                    stages,
                    index: index + 1,
                    object: object.clone(),
                    done,
                };
                stage.process(html, &object, next);
            }
            None => done(html),
        }
    }
}

/// Ordered render stages composed by continuation passing.
#[derive(Clone)]
pub struct RenderPipeline {
    stages: Rc<[Rc<dyn RenderStage>]>,
}

impl RenderPipeline {
    /// Builds a pipeline from stages in execution order.
    pub fn new(stages: Vec<Rc<dyn RenderStage>>) -> Self {
        Self {
            stages: stages.into(),
        }
    }

    /// Number of stages.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// True without stages; `run` then hands the markup straight back.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Runs all stages in order, then `done` with the final markup.
    pub fn run(&self, html: String, object: &Handle, done: impl FnOnce(String) + 'static) {
        Next {
            stages: self.stages.clone(),
            index: 0,
            object: object.clone(),
            done: Box::new(done),
        }
        .run(html)
    }
}

/// Publish/subscribe bus. One per client context.
#[derive(Default)]
pub struct EventBus {
    handlers: RefCell<HashMap<String, Vec<Handler>>>,
    stages: RefCell<HashMap<String, Vec<Rc<dyn RenderStage>>>>,
    reporting_failure: Cell<bool>,
}

impl EventBus {
    /// Creates a bus without subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to an ordinary channel.
    ///
    /// # Errors
    ///
    /// `UNKNOWN_ARGUMENT` for render channels, which take [`RenderStage`]s.
    pub fn subscribe(
        &self,
        channel: &str,
        handler: impl Fn(&Message) -> Result<()> + 'static,
    ) -> Result<()> {
        if channels::is_render_channel(channel) {
            return Err(GcnError::UnknownArgument {
                message: format!("'{}' is a render channel; use subscribe_render", channel),
            });
        }
        self.handlers
            .borrow_mut()
            .entry(channels::canonical(channel).to_string())
            .or_default()
            .push(Rc::new(handler));
        Ok(())
    }

    /// Appends a stage to a render channel's pipeline.
    ///
    /// # Errors
    ///
    /// `UNKNOWN_ARGUMENT` if `channel` is not a render channel.
    pub fn subscribe_render(&self, channel: &str, stage: impl RenderStage + 'static) -> Result<()> {
        if !channels::is_render_channel(channel) {
            return Err(GcnError::UnknownArgument {
                message: format!("'{}' is not a render channel", channel),
            });
        }
        self.stages
            .borrow_mut()
            .entry(channels::canonical(channel).to_string())
            .or_default()
            .push(Rc::new(stage));
        Ok(())
    }

    /// Whether anything listens on `channel`.
    pub fn has_subscribers(&self, channel: &str) -> bool {
        let name = channels::canonical(channel);
        if channels::is_render_channel(name) {
            self.stages.borrow().get(name).is_some_and(|s| !s.is_empty())
        } else {
            self.handlers.borrow().get(name).is_some_and(|h| !h.is_empty())
        }
    }

    /// Dispatches `message` to every subscriber of `channel`, in registration order.
    ///
    /// A failing subscriber never fails the publisher: its error is
    /// republished as `PUBSUB_HANDLER_FAILED`. A subscriber failing while
    /// that report is delivered is only logged.
    ///
    /// # Errors
    ///
    /// Publishing on `error-encountered` without any subscriber returns the
    /// published error itself.
    pub fn publish(&self, channel: &str, message: &Message) -> Result<()> {
        let name = channels::canonical(channel);
        let handlers = self.handlers.borrow().get(name).cloned().unwrap_or_default();

        if handlers.is_empty() {
            if name == ERROR_ENCOUNTERED {
                return Err(message.as_error().cloned().unwrap_or_else(|| {
                    GcnError::UnknownArgument {
                        message: format!("non-error payload on {}: {:?}", name, message),
                    }
                }));
            }
            trace!(channel = name, "publication without subscribers");
            return Ok(());
        }

        for handler in handlers {
            if let Err(e) = handler(message) {
                if self.reporting_failure.get() {
                    warn!(
                        channel = name,
                        error = %e,
                        "subscriber failed while reporting a failure"
                    );
                    continue;
                }
                let failure = GcnError::PubsubHandlerFailed {
                    channel: name.to_string(),
                    message: e.to_string(),
                };
                self.reporting_failure.set(true);
                let reported = self.publish_error(failure);
                self.reporting_failure.set(false);
                reported?;
            }
        }
        Ok(())
    }

    /// Publishes `err` on `error-encountered`.
    pub fn publish_error(&self, err: GcnError) -> Result<()> {
        self.publish(ERROR_ENCOUNTERED, &Message::Error(err))
    }

    /// Snapshot of a render channel's stages.
    pub fn pipeline(&self, channel: &str) -> RenderPipeline {
        let stages = self
            .stages
            .borrow()
            .get(channels::canonical(channel))
            .cloned()
            .unwrap_or_default();
        RenderPipeline::new(stages)
    }

    /// Runs `html` through the render channel's pipeline, then `done`.
    pub fn render(
        &self,
        channel: &str,
        html: String,
        object: &Handle,
        done: impl FnOnce(String) + 'static,
    ) {
        self.pipeline(channel).run(html, object, done)
    }
}
