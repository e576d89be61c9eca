use super::assertions::Assertion;
use super::runner::ScenarioRunner;
use super::steps::{ArgSpec, Listing, PageAction, Relation, ScenarioStep};
use gcn_core::mock::SsoMode;
use gcn_core::{ExecutionContext, LocalizationState, ObjectKind, Settings};
use serde_json::Value;

/// Fluent DSL for building test scenarios
pub struct Scenario {
    name: String,
    settings: Settings,
    objects: Vec<(ObjectKind, u64, Value)>,
    steps: Vec<ScenarioStep>,
}

impl Scenario {
    /// Create a new scenario with the given name
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            settings: Settings::default(),
            objects: Vec::new(),
            steps: Vec::new(),
        }
    }

    // ===== Initial setup =====

    /// Run as a server-side client, without a cookie jar
    pub fn in_server_context(mut self) -> Self {
        self.settings.backend.execution_context = ExecutionContext::Server;
        self
    }

    /// Adjust settings before the context is created
    pub fn with_settings(mut self, f: impl FnOnce(&mut Settings)) -> Self {
        f(&mut self.settings);
        self
    }

    /// Store an extra object in the backend's master node
    pub fn with_object(mut self, kind: ObjectKind, id: u64, data: Value) -> Self {
        self.objects.push((kind, id, data));
        self
    }

    fn step(mut self, step: ScenarioStep) -> Self {
        self.steps.push(step);
        self
    }

    // ===== Host wiring =====

    /// Collect everything published on `error-encountered`
    pub fn handles_errors(self) -> Self {
        self.step(ScenarioStep::HandleErrors)
    }

    /// Keep `authentication-required` prompts for later steps
    pub fn handles_authentication(self) -> Self {
        self.step(ScenarioStep::HandleAuthentication)
    }

    /// Wrap rendered markup on a render channel
    pub fn render_stage(self, channel: &str, prefix: &str, suffix: &str) -> Self {
        self.step(ScenarioStep::AddRenderStage {
            channel: channel.to_string(),
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
        })
    }

    // ===== Session =====

    /// Open a session for the fixture user without a request
    pub fn logged_in(self) -> Self {
        self.step(ScenarioStep::LoginDirect)
    }

    /// Log in with credentials
    pub fn login(self, user: &str, password: &str) -> Self {
        self.step(ScenarioStep::Login {
            user: user.to_string(),
            password: password.to_string(),
        })
    }

    /// Log out
    pub fn logout(self) -> Self {
        self.step(ScenarioStep::Logout)
    }

    /// Try single sign-on
    pub fn sso_login(self) -> Self {
        self.step(ScenarioStep::SsoLogin)
    }

    /// Fetch the current user
    pub fn load_user(self) -> Self {
        self.step(ScenarioStep::LoadUser)
    }

    /// Answer the outstanding prompt by logging in again
    pub fn reauthenticate(self, user: &str, password: &str) -> Self {
        self.step(ScenarioStep::Reauthenticate {
            user: user.to_string(),
            password: password.to_string(),
        })
    }

    /// Give up on the outstanding prompt
    pub fn cancel_authentication(self) -> Self {
        self.step(ScenarioStep::CancelAuthentication)
    }

    // ===== Objects =====

    /// Request an object and label the returned handle
    pub fn request(self, label: &str, kind: ObjectKind, id: u64) -> Self {
        self.request_in(label, kind, id, 0)
    }

    /// Request an object in a channel
    pub fn request_in(self, label: &str, kind: ObjectKind, id: u64, channel: u32) -> Self {
        self.step(ScenarioStep::Request {
            label: label.to_string(),
            kind,
            id,
            channel,
        })
    }

    /// Request with loosely typed arguments
    pub fn request_with_args(self, label: &str, kind: ObjectKind, args: Vec<ArgSpec>) -> Self {
        self.step(ScenarioStep::RequestWithArgs {
            label: label.to_string(),
            kind,
            args,
        })
    }

    /// Navigate from a labelled object
    pub fn chain(self, from: &str, relation: Relation, label: &str) -> Self {
        self.step(ScenarioStep::Chain {
            from: from.to_string(),
            relation,
            label: label.to_string(),
        })
    }

    /// List a folder's pages or subfolders
    pub fn list(self, folder: &str, listing: Listing, name: &str) -> Self {
        self.step(ScenarioStep::List {
            folder: folder.to_string(),
            listing,
            name: name.to_string(),
        })
    }

    /// Create a page in a labelled folder
    pub fn create_page(self, folder: &str, template: u64, label: &str) -> Self {
        self.step(ScenarioStep::CreatePage {
            folder: folder.to_string(),
            template,
            label: label.to_string(),
        })
    }

    /// Write a property
    pub fn set_prop(self, label: &str, name: &str, value: Value) -> Self {
        self.step(ScenarioStep::SetProp {
            label: label.to_string(),
            name: name.to_string(),
            value,
            rejected_with: None,
        })
    }

    /// Write a property that must be refused with `code`
    pub fn set_prop_rejected(self, label: &str, name: &str, value: Value, code: &str) -> Self {
        self.step(ScenarioStep::SetProp {
            label: label.to_string(),
            name: name.to_string(),
            value,
            rejected_with: Some(code.to_string()),
        })
    }

    /// Replace a tag part
    pub fn set_part(self, tag: &str, part: &str, value: Value) -> Self {
        self.step(ScenarioStep::SetPart {
            tag: tag.to_string(),
            part: part.to_string(),
            value,
        })
    }

    /// Drop an object's data
    pub fn clear(self, label: &str) -> Self {
        self.step(ScenarioStep::Clear {
            label: label.to_string(),
        })
    }

    /// Save an object
    pub fn save(self, label: &str) -> Self {
        self.step(ScenarioStep::Save {
            label: label.to_string(),
        })
    }

    /// Delete an object
    pub fn remove(self, label: &str) -> Self {
        self.step(ScenarioStep::Remove {
            label: label.to_string(),
        })
    }

    /// Run a page workflow action
    pub fn page_action(self, label: &str, action: PageAction) -> Self {
        self.step(ScenarioStep::Page {
            label: label.to_string(),
            action,
        })
    }

    // ===== Multichannelling =====

    /// Localize a labelled object, labelling the local copy
    pub fn localize(self, label: &str, result: &str) -> Self {
        self.step(ScenarioStep::Localize {
            label: label.to_string(),
            result: result.to_string(),
        })
    }

    /// Unlocalize a labelled object, labelling the inherited object
    pub fn unlocalize(self, label: &str, result: &str) -> Self {
        self.step(ScenarioStep::Unlocalize {
            label: label.to_string(),
            result: result.to_string(),
        })
    }

    // ===== Rendering =====

    /// Render a labelled tag
    pub fn render(self, tag: &str, output: &str) -> Self {
        self.step(ScenarioStep::Render {
            tag: tag.to_string(),
            output: output.to_string(),
            edit: false,
        })
    }

    /// Render a labelled tag for editing
    pub fn edit(self, tag: &str, output: &str) -> Self {
        self.step(ScenarioStep::Render {
            tag: tag.to_string(),
            output: output.to_string(),
            edit: true,
        })
    }

    /// Preview a labelled page
    pub fn preview(self, page: &str, output: &str) -> Self {
        self.step(ScenarioStep::Preview {
            page: page.to_string(),
            output: output.to_string(),
        })
    }

    // ===== Backend control =====

    /// Invalidate every backend session
    pub fn expire_sessions(self) -> Self {
        self.step(ScenarioStep::ExpireSessions)
    }

    /// Localize an object on the backend behind the client's back
    pub fn localized_on_server(self, kind: ObjectKind, id: u64, channel: u32) -> Self {
        self.step(ScenarioStep::LocalizeOnServer { kind, id, channel })
    }

    /// Make the transport fail
    pub fn go_offline(self) -> Self {
        self.step(ScenarioStep::SetOffline(true))
    }

    /// Configure single sign-on
    pub fn sso_mode(self, mode: SsoMode) -> Self {
        self.step(ScenarioStep::SetSso(mode))
    }

    // ===== Event loop =====

    /// Drain the event loop; an unhandled error fails the scenario
    pub fn settle(self) -> Self {
        self.step(ScenarioStep::Settle)
    }

    /// Drain the event loop, expecting it to stop with `code`
    pub fn settle_fails_with(self, code: &str) -> Self {
        self.step(ScenarioStep::SettleFatal {
            code: code.to_string(),
        })
    }

    // ===== Assertions =====

    /// Add a general assertion
    pub fn assert(self, assertion: Assertion) -> Self {
        self.step(ScenarioStep::Assert { assertion })
    }

    /// Assert two labels hold the same instance
    pub fn assert_same(self, a: &str, b: &str) -> Self {
        self.assert(Assertion::SameInstance {
            a: a.to_string(),
            b: b.to_string(),
        })
    }

    /// Assert two labels hold different instances
    pub fn assert_distinct(self, a: &str, b: &str) -> Self {
        self.assert(Assertion::DistinctInstances {
            a: a.to_string(),
            b: b.to_string(),
        })
    }

    /// Assert an object has (or lacks) its server data
    pub fn assert_fetched(self, label: &str, fetched: bool) -> Self {
        self.assert(Assertion::Fetched {
            label: label.to_string(),
            fetched,
        })
    }

    /// Assert a property value
    pub fn assert_prop(self, label: &str, name: &str, value: Value) -> Self {
        self.assert(Assertion::Prop {
            label: label.to_string(),
            name: name.to_string(),
            value,
        })
    }

    /// Assert an object's id
    pub fn assert_id(self, label: &str, id: u64) -> Self {
        self.assert(Assertion::HandleId {
            label: label.to_string(),
            id,
        })
    }

    /// Assert the total number of backend requests
    pub fn assert_requests(self, count: usize) -> Self {
        self.assert(Assertion::RequestCount(count))
    }

    /// Assert the number of requests to paths ending with `suffix`
    pub fn assert_requests_to(self, suffix: &str, count: usize) -> Self {
        self.assert(Assertion::RequestsTo {
            suffix: suffix.to_string(),
            count,
        })
    }

    /// Assert an error with `code` reached `error-encountered`
    pub fn assert_error(self, code: &str) -> Self {
        self.assert(Assertion::ErrorCollected(code.to_string()))
    }

    /// Assert nothing reached `error-encountered`
    pub fn assert_no_errors(self) -> Self {
        self.assert(Assertion::NoErrorsCollected)
    }

    /// Assert a localization state
    pub fn assert_localization(self, label: &str, state: Option<LocalizationState>) -> Self {
        self.assert(Assertion::Localization {
            label: label.to_string(),
            state,
        })
    }

    /// Assert whether the backend holds a local copy
    pub fn assert_local_copy(self, kind: ObjectKind, master: u64, node: u32, exists: bool) -> Self {
        self.assert(Assertion::LocalCopy {
            kind,
            master,
            node,
            exists,
        })
    }

    /// Assert rendered output
    pub fn assert_output(self, output: &str, html: &str) -> Self {
        self.assert(Assertion::OutputEquals {
            output: output.to_string(),
            html: html.to_string(),
        })
    }

    // ===== Execution =====

    /// Execute the scenario and return results
    pub fn run(self) -> ScenarioResult {
        let mut runner = match ScenarioRunner::new(self.settings, self.objects) {
            Ok(r) => r,
            Err(e) => {
                return ScenarioResult {
                    name: self.name,
                    success: false,
                    steps_executed: 0,
                    failure_step: Some(0),
                    error: Some(format!("Failed to create runner: {}", e)),
                }
            }
        };

        match runner.execute(&self.steps) {
            Ok(()) => ScenarioResult {
                name: self.name,
                success: true,
                steps_executed: self.steps.len(),
                failure_step: None,
                error: None,
            },
            Err(e) => {
                let failure_step = runner.current_step();
                ScenarioResult {
                    name: self.name,
                    success: false,
                    steps_executed: failure_step,
                    failure_step: Some(failure_step),
                    error: Some(format!("{:?}", e)),
                }
            }
        }
    }
}

/// Result of running a scenario
#[derive(Debug)]
pub struct ScenarioResult {
    pub name: String,
    pub success: bool,
    pub steps_executed: usize,
    pub failure_step: Option<usize>,
    pub error: Option<String>,
}

impl ScenarioResult {
    /// Unwrap the result, panicking if it failed
    pub fn unwrap(self) {
        if !self.success {
            panic!(
                "Scenario '{}' failed at step {}: {}",
                self.name,
                self.failure_step.unwrap_or(0),
                self.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }
    }

    /// Expect the result to be successful
    pub fn expect(self, msg: &str) {
        if !self.success {
            panic!(
                "{}: Scenario '{}' failed at step {}: {}",
                msg,
                self.name,
                self.failure_step.unwrap_or(0),
                self.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }
    }
}
