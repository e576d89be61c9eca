//! Session lifecycle: login, logout, single sign-on and the re-authentication
//! protocol.
//!
//! When a request finds its session expired it parks itself with
//! [`SessionManager::after_next_authentication`] and calls
//! [`SessionManager::authenticate`], which publishes
//! `session.authentication-required` with an [`AuthPrompt`]. The host logs
//! in again and calls [`AuthPrompt::proceed`]; every parked retry then runs
//! once, oldest first.

use crate::callback::Callbacks;
use crate::config::ExecutionContext;
use crate::context::{Gcn, GcnInner};
use crate::error::{GcnError, Result};
use crate::event_loop::Task;
use crate::pubsub::{channels, Message};
use crate::rest::AuthMode;
use crate::transport::{HttpRequest, HttpResponse};
use crate::types::User;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::mem;
use std::rc::Weak;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Mutable session state of one context.
#[derive(Default)]
pub(crate) struct SessionState {
    pub(crate) sid: Option<String>,
    pub(crate) user: Option<User>,
    pub(crate) authenticating: bool,
    pub(crate) retry_queue: VecDeque<Task>,
    pub(crate) cancel_callbacks: Vec<Task>,
}

/// Handed to `session.authentication-required` subscribers.
#[derive(Clone)]
pub struct AuthPrompt {
    ctx: Weak<GcnInner>,
}

impl AuthPrompt {
    /// Resumes every parked request. Call after a successful login.
    pub fn proceed(&self) -> Result<()> {
        Gcn::from_weak(&self.ctx)?.session().proceed()
    }

    /// Gives up; parked requests fail with `AUTHENTICATION_FAILED`.
    pub fn cancel(&self) -> Result<()> {
        Gcn::from_weak(&self.ctx)?.session().cancel()
    }
}

/// Result of a single sign-on attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SsoOutcome {
    /// The CMS recognized the user.
    Authenticated(User),
    /// No single sign-on is configured, or it did not recognize anyone.
    NotAvailable,
}

/// Extracts the value of cookie `name` from `Set-Cookie` headers.
fn cookie_value(response: &HttpResponse, name: &str) -> Option<String> {
    response
        .header_values("set-cookie")
        .filter_map(|header| header.split(';').next())
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().to_string())
}

fn sid_of(body: &Value) -> Option<String> {
    match body.get("sid")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn user_of(body: &Value) -> Result<User> {
    match body.get("user") {
        Some(user) => Ok(serde_json::from_value(user.clone())?),
        None => Ok(User::default()),
    }
}

/// Server-reported login failures surface as `AUTHENTICATION_FAILED`.
fn as_auth_failure(err: GcnError) -> GcnError {
    match err {
        GcnError::Server { code, message, .. } => GcnError::AuthenticationFailed {
            message: if message.is_empty() { code } else { message },
        },
        other => other,
    }
}

/// Session operations of one context.
pub struct SessionManager<'a> {
    gcn: &'a Gcn,
}

impl<'a> SessionManager<'a> {
    pub(crate) fn new(gcn: &'a Gcn) -> Self {
        Self { gcn }
    }

    /// Current session id.
    pub fn sid(&self) -> Option<String> {
        self.gcn.sid()
    }

    /// The logged-in user, once known.
    pub fn user(&self) -> Option<User> {
        self.gcn.inner().session.borrow().user.clone()
    }

    /// Whether an `authentication-required` prompt is outstanding.
    pub fn is_authenticating(&self) -> bool {
        self.gcn.inner().session.borrow().authenticating
    }

    /// Number of requests parked until the next authentication.
    pub fn pending_retries(&self) -> usize {
        self.gcn.inner().session.borrow().retry_queue.len()
    }

    /// Sets the session id and publishes `session.sid-set`.
    pub fn set_sid(&self, sid: impl Into<String>) -> Result<()> {
        let sid = sid.into();
        self.gcn.inner().session.borrow_mut().sid = Some(sid.clone());
        self.gcn
            .events()
            .publish(channels::SID_SET, &Message::SidSet(sid))
    }

    /// Forgets sid and user.
    pub fn clear(&self) {
        let mut state = self.gcn.inner().session.borrow_mut();
        state.sid = None;
        state.user = None;
    }

    /// Logs in with credentials.
    ///
    /// In the server execution context the session secret cookie is appended
    /// to the sid, since there is no cookie jar to carry it.
    pub fn login(&self, login: &str, password: &str, callbacks: Callbacks<User>) {
        let request = HttpRequest::post(
            "/auth/login.json",
            json!({ "login": login, "password": password }),
        );
        let gcn = self.gcn.clone();
        self.gcn.rest().call_with_response(
            request,
            AuthMode::Anonymous,
            Box::new(move |result| {
                let established = result
                    .map_err(as_auth_failure)
                    .and_then(|(body, response)| gcn.session().establish(&body, &response));
                match established {
                    Ok(user) => {
                        callbacks.succeed(user);
                        Ok(())
                    }
                    Err(err) => gcn.fail(err, callbacks),
                }
            }),
        );
    }

    fn establish(&self, body: &Value, response: &HttpResponse) -> Result<User> {
        let sid = sid_of(body).ok_or_else(|| GcnError::AuthenticationFailed {
            message: "login response carries no sid".into(),
        })?;
        let backend = &self.gcn.settings().backend;
        let sid = match backend.execution_context {
            ExecutionContext::Browser => sid,
            ExecutionContext::Server => match cookie_value(response, &backend.secret_cookie) {
                Some(secret) => format!("{}{}", sid, secret),
                None => {
                    warn!(
                        cookie = %backend.secret_cookie,
                        "login response lacks the session secret cookie"
                    );
                    sid
                }
            },
        };
        let user = user_of(body)?;
        self.set_sid(sid)?;
        self.authenticated(user.clone())?;
        Ok(user)
    }

    fn authenticated(&self, user: User) -> Result<()> {
        info!(login = %user.login, "authenticated");
        self.gcn.inner().session.borrow_mut().user = Some(user.clone());
        self.gcn
            .events()
            .publish(channels::AUTHENTICATED, &Message::Authenticated(user))
    }

    /// Ends the session. Succeeds with `false` when there is none.
    pub fn logout(&self, callbacks: Callbacks<bool>) {
        let Some(sid) = self.sid() else {
            debug!("logout without a session");
            self.gcn.defer(Box::new(move || {
                callbacks.succeed(false);
                Ok(())
            }));
            return;
        };
        let request = HttpRequest::post(format!("/auth/logout/{}", sid), json!({}));
        let gcn = self.gcn.clone();
        self.gcn.rest().call_with_response(
            request,
            AuthMode::NoRetry,
            Box::new(move |result| match result {
                Ok(_) => {
                    gcn.session().clear();
                    info!("logged out");
                    callbacks.succeed(true);
                    Ok(())
                }
                Err(err) => gcn.fail(err, callbacks),
            }),
        );
    }

    /// Tries single sign-on. The endpoint answers with plain text:
    /// empty or `NOTFOUND` when unavailable, `FAILURE`, or a session id.
    pub fn sso_login(&self, callbacks: Callbacks<SsoOutcome>) {
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let request = HttpRequest::get("/auth/ssologin").with_query("ts", ts.to_string());
        let gcn = self.gcn.clone();
        self.gcn.rest().call_raw(
            request,
            AuthMode::Anonymous,
            Box::new(move |result| {
                let response = match result {
                    Ok(response) if response.is_success() => response,
                    Ok(response) => {
                        let err = GcnError::Http {
                            message: format!(
                                "single sign-on failed with status {}",
                                response.status
                            ),
                            status: Some(response.status),
                        };
                        return gcn.fail(err, callbacks);
                    }
                    Err(err) => return gcn.fail(err, callbacks),
                };
                match response.body.trim() {
                    "" | "NOTFOUND" => {
                        debug!("single sign-on not available");
                        callbacks.succeed(SsoOutcome::NotAvailable);
                        Ok(())
                    }
                    "FAILURE" => gcn.fail(
                        GcnError::AuthenticationFailed {
                            message: "single sign-on was rejected".into(),
                        },
                        callbacks,
                    ),
                    sid => {
                        gcn.session().set_sid(sid)?;
                        let g = gcn.clone();
                        gcn.session().fetch_user(
                            AuthMode::NoRetry,
                            callbacks.map(move |user: User| {
                                if let Err(err) = g.session().authenticated(user.clone()) {
                                    warn!(error = %err, "authenticated subscriber failed");
                                }
                                SsoOutcome::Authenticated(user)
                            }),
                        );
                        Ok(())
                    }
                }
            }),
        );
    }

    /// Loads the current user from `/user/me`.
    pub fn load_user(&self, callbacks: Callbacks<User>) {
        if self.sid().is_none() {
            self.gcn.fail_later(GcnError::NoSession, callbacks);
            return;
        }
        self.fetch_user(AuthMode::Intercept, callbacks);
    }

    fn fetch_user(&self, mode: AuthMode, callbacks: Callbacks<User>) {
        let gcn = self.gcn.clone();
        self.gcn.rest().call_with_response(
            HttpRequest::get("/user/me"),
            mode,
            Box::new(move |result| {
                match result.and_then(|(body, _)| user_of(&body)) {
                    Ok(user) => {
                        gcn.inner().session.borrow_mut().user = Some(user.clone());
                        callbacks.succeed(user);
                        Ok(())
                    }
                    Err(err) => gcn.fail(err, callbacks),
                }
            }),
        );
    }

    /// Asks the host to authenticate again.
    ///
    /// Publishes `session.authentication-required` unless a prompt is already
    /// outstanding; `cancel` runs if the host gives up.
    ///
    /// # Errors
    ///
    /// `NO_AUTH_HANDLER` when nobody subscribed. Parked retries are discarded.
    pub fn authenticate(&self, cancel: Option<Task>) -> Result<()> {
        if !self
            .gcn
            .events()
            .has_subscribers(channels::AUTHENTICATION_REQUIRED)
        {
            let discarded = {
                let mut state = self.gcn.inner().session.borrow_mut();
                state.authenticating = false;
                state.cancel_callbacks.clear();
                mem::take(&mut state.retry_queue).len()
            };
            warn!(discarded, "re-authentication needed but no handler is subscribed");
            return Err(GcnError::NoAuthHandler);
        }

        let already_prompting = {
            let mut state = self.gcn.inner().session.borrow_mut();
            if let Some(cancel) = cancel {
                state.cancel_callbacks.push(cancel);
            }
            mem::replace(&mut state.authenticating, true)
        };
        if already_prompting {
            debug!("re-authentication already requested");
            return Ok(());
        }

        info!("authentication required");
        let prompt = AuthPrompt {
            ctx: self.gcn.downgrade(),
        };
        self.gcn.events().publish(
            channels::AUTHENTICATION_REQUIRED,
            &Message::AuthenticationRequired(prompt),
        )
    }

    /// Parks `retry` until the next [`proceed`](Self::proceed).
    pub fn after_next_authentication(&self, retry: Task) {
        self.gcn
            .inner()
            .session
            .borrow_mut()
            .retry_queue
            .push_back(retry);
    }

    /// Runs every parked retry once, oldest first, and empties the queue.
    ///
    /// Retries parked while this runs wait for the next authentication.
    pub fn proceed(&self) -> Result<()> {
        let retries = {
            let mut state = self.gcn.inner().session.borrow_mut();
            state.authenticating = false;
            state.cancel_callbacks.clear();
            mem::take(&mut state.retry_queue)
        };
        debug!(retries = retries.len(), "resuming parked requests");
        for retry in retries {
            retry()?;
        }
        Ok(())
    }

    /// Alias of [`proceed`](Self::proceed).
    pub fn on_authenticated(&self) -> Result<()> {
        self.proceed()
    }

    /// Drops parked retries and runs the cancel callbacks.
    pub fn cancel(&self) -> Result<()> {
        let cancels = {
            let mut state = self.gcn.inner().session.borrow_mut();
            state.authenticating = false;
            state.retry_queue.clear();
            mem::take(&mut state.cancel_callbacks)
        };
        info!(cancelled = cancels.len(), "re-authentication cancelled");
        for cancel in cancels {
            cancel()?;
        }
        Ok(())
    }
}
