//! REST adapter: request preparation, envelope decoding and session-expiry
//! interception.
//!
//! Every call is deferred onto the event loop, so the caller always regains
//! control before the transport is touched.

use crate::context::Gcn;
use crate::error::{GcnError, Result};
use crate::event_loop::Task;
use crate::transport::{HttpRequest, HttpResponse};
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, warn};

/// Receives the decoded body of an OK envelope.
pub(crate) type Completion = Box<dyn FnOnce(Result<Value>) -> Result<()>>;

/// Receives the decoded body together with the raw response (for headers).
pub(crate) type ReplyCompletion = Box<dyn FnOnce(Result<(Value, HttpResponse)>) -> Result<()>>;

/// Receives the raw response, undecoded.
pub(crate) type RawCompletion = Box<dyn FnOnce(Result<HttpResponse>) -> Result<()>>;

/// How a call treats the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum AuthMode {
    /// Send the sid; on `AUTHREQUIRED` re-authenticate and retry once.
    Intercept,
    /// Send the sid; `AUTHREQUIRED` is an ordinary failure.
    NoRetry,
    /// Send no sid.
    Anonymous,
}

/// Classification of `responseInfo.responseCode`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResponseCode {
    /// `OK`
    Ok,
    /// `AUTHREQUIRED`: the session expired.
    AuthRequired,
    /// Any other code, verbatim.
    Failure(String),
    /// The body carries no envelope.
    Missing,
}

/// Reads the response code of a CMS envelope.
///
/// # Examples
///
/// ```
/// use gcn_core::{response_code, ResponseCode};
/// use serde_json::json;
///
/// let body = json!({"responseInfo": {"responseCode": "NOTFOUND"}});
/// assert_eq!(response_code(&body), ResponseCode::Failure("NOTFOUND".into()));
/// ```
pub fn response_code(body: &Value) -> ResponseCode {
    match body
        .pointer("/responseInfo/responseCode")
        .and_then(Value::as_str)
    {
        Some("OK") => ResponseCode::Ok,
        Some("AUTHREQUIRED") => ResponseCode::AuthRequired,
        Some(code) => ResponseCode::Failure(code.to_string()),
        None => ResponseCode::Missing,
    }
}

fn response_message(body: &Value) -> String {
    body.pointer("/responseInfo/responseMessage")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn server_error(code: &str, body: Value) -> GcnError {
    GcnError::Server {
        code: code.to_string(),
        message: response_message(&body),
        data: Some(body),
    }
}

/// Parses a response body as JSON.
pub(crate) fn decode(response: &HttpResponse) -> Result<Value> {
    match serde_json::from_str::<Value>(&response.body) {
        Ok(body) => Ok(body),
        Err(e) if response.is_success() => Err(GcnError::Http {
            message: format!("invalid JSON in response: {}", e),
            status: Some(response.status),
        }),
        Err(_) => Err(GcnError::Http {
            message: format!("request failed with status {}", response.status),
            status: Some(response.status),
        }),
    }
}

/// Borrowing view of a context that issues REST calls.
pub(crate) struct RestClient<'a> {
    gcn: &'a Gcn,
}

impl<'a> RestClient<'a> {
    pub(crate) fn new(gcn: &'a Gcn) -> Self {
        Self { gcn }
    }

    /// Prefixes the REST path and attaches the current sid.
    fn prepare(&self, request: &HttpRequest, mode: AuthMode) -> HttpRequest {
        let rest_path = self.gcn.settings().backend.rest_path.trim_end_matches('/');
        let mut prepared = request.clone();
        prepared.path = format!("{}{}", rest_path, request.path);
        if mode != AuthMode::Anonymous {
            prepared = prepared.with_query_opt("sid", self.gcn.sid());
        }
        prepared
    }

    /// Issues `request` and hands over the body of an OK envelope.
    pub(crate) fn call(&self, request: HttpRequest, done: Completion) {
        self.call_with_response(
            request,
            AuthMode::Intercept,
            Box::new(move |result| done(result.map(|(body, _)| body))),
        );
    }

    /// Issues `request`; non-OK envelopes become errors.
    pub(crate) fn call_with_response(
        &self,
        request: HttpRequest,
        mode: AuthMode,
        done: ReplyCompletion,
    ) {
        let gcn = self.gcn.clone();
        let retry = request.clone();
        self.call_raw(
            request,
            mode,
            Box::new(move |result| {
                let decoded =
                    result.and_then(|response| decode(&response).map(|body| (body, response)));
                let (body, response) = match decoded {
                    Ok(pair) => pair,
                    Err(err) => return done(Err(err)),
                };
                match response_code(&body) {
                    ResponseCode::Ok => done(Ok((body, response))),
                    ResponseCode::AuthRequired if mode == AuthMode::Intercept => {
                        debug!(
                            path = %retry.path,
                            "session expired; waiting for re-authentication"
                        );
                        reauthenticate(&gcn, retry, done)
                    }
                    ResponseCode::AuthRequired => done(Err(server_error("AUTHREQUIRED", body))),
                    ResponseCode::Failure(code) => done(Err(server_error(&code, body))),
                    ResponseCode::Missing if response.is_success() => {
                        warn!(path = %retry.path, "response without responseInfo; accepting as is");
                        done(Ok((body, response)))
                    }
                    ResponseCode::Missing => done(Err(GcnError::Http {
                        message: format!("request failed with status {}", response.status),
                        status: Some(response.status),
                    })),
                }
            }),
        );
    }

    /// Defers the transport call. The sid is read when the task runs.
    pub(crate) fn call_raw(&self, request: HttpRequest, mode: AuthMode, done: RawCompletion) {
        let gcn = self.gcn.clone();
        self.gcn.defer(Box::new(move || {
            let prepared = gcn.rest().prepare(&request, mode);
            debug!(method = ?prepared.method, path = %prepared.path, "sending request");
            let result = gcn.transport().send(&prepared);
            done(result)
        }));
    }
}

/// Parks the call until the next successful authentication, then retries it once.
fn reauthenticate(gcn: &Gcn, request: HttpRequest, done: ReplyCompletion) -> Result<()> {
    let slot: Rc<RefCell<Option<ReplyCompletion>>> = Rc::new(RefCell::new(Some(done)));

    let retry_slot = slot.clone();
    let g = gcn.clone();
    gcn.session().after_next_authentication(Box::new(move || {
        let taken = retry_slot.borrow_mut().take();
        if let Some(done) = taken {
            g.rest().call_with_response(request, AuthMode::NoRetry, done);
        }
        Ok(())
    }));

    let cancel_slot = slot.clone();
    let cancel: Task = Box::new(move || {
        let taken = cancel_slot.borrow_mut().take();
        match taken {
            Some(done) => done(Err(GcnError::AuthenticationFailed {
                message: "re-authentication was cancelled".into(),
            })),
            None => Ok(()),
        }
    });

    if let Err(err) = gcn.session().authenticate(Some(cancel)) {
        let taken = slot.borrow_mut().take();
        if let Some(done) = taken {
            return done(Err(err));
        }
    }
    Ok(())
}
