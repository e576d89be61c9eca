use crate::harness::{Assertion, Scenario};
use gcn_core::mock::{SsoMode, SESSION_SECRET};
use gcn_core::ObjectKind;

#[test]
fn test_login_sets_sid_and_user() {
    Scenario::new("login_sets_sid_and_user")
        .login("node", "node")
        .settle()
        .assert(Assertion::HasSid)
        .assert(Assertion::SidEndsWith {
            suffix: SESSION_SECRET.into(),
            expected: false,
        })
        .assert(Assertion::UserLogin("node".into()))
        .request("page", ObjectKind::Page, 100)
        .settle()
        .assert_fetched("page", true)
        .run()
        .expect("scenario should pass");
}

#[test]
fn test_server_context_appends_session_secret() {
    Scenario::new("server_context_appends_session_secret")
        .in_server_context()
        .login("node", "node")
        .settle()
        .assert(Assertion::SidEndsWith {
            suffix: SESSION_SECRET.into(),
            expected: true,
        })
        .request("page", ObjectKind::Page, 100)
        .settle()
        .assert_fetched("page", true)
        .run()
        .unwrap();
}

#[test]
fn test_wrong_password_is_reported() {
    Scenario::new("wrong_password_is_reported")
        .handles_errors()
        .login("node", "wrong")
        .settle()
        .assert_error("AUTHENTICATION_FAILED")
        .assert(Assertion::NoSid)
        .run()
        .unwrap();
}

#[test]
fn test_logout_without_session() {
    Scenario::new("logout_without_session")
        .logout()
        .settle()
        .assert(Assertion::LoggedOut(false))
        .assert_requests(0)
        .run()
        .unwrap();
}

#[test]
fn test_logout_ends_the_session() {
    Scenario::new("logout_ends_the_session")
        .logged_in()
        .logout()
        .settle()
        .assert(Assertion::LoggedOut(true))
        .assert(Assertion::NoSid)
        .assert_requests(1)
        .run()
        .unwrap();
}

#[test]
fn test_load_user_needs_a_session() {
    Scenario::new("load_user_needs_a_session")
        .handles_errors()
        .load_user()
        .settle()
        .assert_error("NO_SESSION")
        .assert_requests(0)
        .run()
        .unwrap();
}

#[test]
fn test_load_user() {
    Scenario::new("load_user")
        .logged_in()
        .load_user()
        .settle()
        .assert_requests_to("/user/me", 1)
        .run()
        .unwrap();
}

#[test]
fn test_expired_session_is_renewed_and_retried() {
    Scenario::new("expired_session_is_renewed_and_retried")
        .handles_authentication()
        .logged_in()
        .expire_sessions()
        .request("page", ObjectKind::Page, 100)
        .settle()
        .assert(Assertion::PromptCount(1))
        .assert(Assertion::PendingRetries(1))
        .assert_fetched("page", false)
        .reauthenticate("node", "node")
        .settle()
        .assert(Assertion::PendingRetries(0))
        .assert_fetched("page", true)
        .assert_requests_to("/page/load/100", 2)
        .run()
        .unwrap();
}

#[test]
fn test_concurrent_expiries_share_one_prompt() {
    Scenario::new("concurrent_expiries_share_one_prompt")
        .handles_authentication()
        .logged_in()
        .expire_sessions()
        .request("page", ObjectKind::Page, 100)
        .request("folder", ObjectKind::Folder, 10)
        .settle()
        .assert(Assertion::PromptCount(1))
        .assert(Assertion::PendingRetries(2))
        .reauthenticate("node", "node")
        .settle()
        .assert_fetched("page", true)
        .assert_fetched("folder", true)
        .run()
        .unwrap();
}

#[test]
fn test_retry_runs_only_once() {
    Scenario::new("retry_runs_only_once")
        .handles_errors()
        .handles_authentication()
        .logged_in()
        .expire_sessions()
        .request("page", ObjectKind::Page, 100)
        .settle()
        // the new session expires before the retry reaches the backend
        .login("node", "node")
        .settle()
        .expire_sessions()
        .assert(Assertion::Custom(Box::new(|runner| {
            runner.gcn().session().proceed()?;
            Ok(())
        })))
        .settle()
        .assert_error("AUTHREQUIRED")
        .assert(Assertion::PendingRetries(0))
        .assert_requests_to("/page/load/100", 2)
        .run()
        .unwrap();
}

#[test]
fn test_cancelled_authentication_fails_parked_requests() {
    Scenario::new("cancelled_authentication_fails_parked_requests")
        .handles_errors()
        .handles_authentication()
        .logged_in()
        .expire_sessions()
        .request("page", ObjectKind::Page, 100)
        .settle()
        .cancel_authentication()
        .settle()
        .assert_error("AUTHENTICATION_FAILED")
        .assert(Assertion::PendingRetries(0))
        .assert_fetched("page", false)
        .run()
        .unwrap();
}

#[test]
fn test_expired_session_without_handler_is_fatal() {
    Scenario::new("expired_session_without_handler_is_fatal")
        .logged_in()
        .expire_sessions()
        .request("page", ObjectKind::Page, 100)
        .settle_fails_with("NO_AUTH_HANDLER")
        .run()
        .unwrap();
}

#[test]
fn test_sso_login() {
    Scenario::new("sso_login")
        .sso_mode(SsoMode::User("node".into()))
        .sso_login()
        .settle()
        .assert(Assertion::SsoAuthenticated(true))
        .assert(Assertion::HasSid)
        .assert(Assertion::UserLogin("node".into()))
        .run()
        .unwrap();
}

#[test]
fn test_sso_not_available() {
    Scenario::new("sso_not_available")
        .sso_mode(SsoMode::NotFound)
        .sso_login()
        .settle()
        .assert(Assertion::SsoAuthenticated(false))
        .assert(Assertion::NoSid)
        .run()
        .unwrap();
}

#[test]
fn test_sso_rejected() {
    Scenario::new("sso_rejected")
        .handles_errors()
        .sso_mode(SsoMode::Failure)
        .sso_login()
        .settle()
        .assert_error("AUTHENTICATION_FAILED")
        .assert(Assertion::NoSid)
        .run()
        .unwrap();
}
