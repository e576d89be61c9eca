use crate::harness::{Assertion, PageAction, Scenario};
use gcn_core::ObjectKind;
use serde_json::json;

#[test]
fn test_repeated_requests_share_one_instance() {
    Scenario::new("repeated_requests_share_one_instance")
        .logged_in()
        .request("a", ObjectKind::Page, 100)
        .request("b", ObjectKind::Page, 100)
        .assert_same("a", "b")
        .assert_fetched("a", false)
        .settle()
        .assert_fetched("b", true)
        .assert_prop("a", "name", json!("Home"))
        .assert_requests_to("/page/load/100", 1)
        .run()
        .expect("scenario should pass");
}

#[test]
fn test_request_after_fetch_is_served_from_cache() {
    Scenario::new("request_after_fetch_is_served_from_cache")
        .logged_in()
        .request("first", ObjectKind::Folder, 10)
        .settle()
        .request("second", ObjectKind::Folder, 10)
        .settle()
        .assert_same("first", "second")
        .assert_requests(1)
        .run()
        .unwrap();
}

#[test]
fn test_channels_are_cached_separately() {
    Scenario::new("channels_are_cached_separately")
        .logged_in()
        .request("plain", ObjectKind::Page, 100)
        .request_in("channel", ObjectKind::Page, 100, 2)
        .settle()
        .assert_distinct("plain", "channel")
        .assert_prop("plain", "inherited", json!(false))
        .assert_prop("channel", "inherited", json!(true))
        .assert_requests_to("/page/load/100", 2)
        .run()
        .unwrap();
}

#[test]
fn test_types_are_cached_separately() {
    Scenario::new("types_are_cached_separately")
        .logged_in()
        .request("node", ObjectKind::Node, 1)
        .request("folder", ObjectKind::Folder, 1)
        .assert_distinct("node", "folder")
        .assert(Assertion::CacheLen {
            kind: ObjectKind::Node,
            len: 1,
        })
        .run()
        .unwrap();
}

#[test]
fn test_clear_keeps_identity_and_refetches() {
    Scenario::new("clear_keeps_identity_and_refetches")
        .logged_in()
        .request("page", ObjectKind::Page, 100)
        .settle()
        .clear("page")
        .assert_fetched("page", false)
        .assert(Assertion::NoProp {
            label: "page".into(),
            name: "name".into(),
        })
        .assert_prop("page", "id", json!(100))
        .request("again", ObjectKind::Page, 100)
        .assert_same("page", "again")
        .settle()
        .assert_fetched("page", true)
        .assert_prop("page", "name", json!("Home"))
        .assert_requests_to("/page/load/100", 2)
        .run()
        .unwrap();
}

#[test]
fn test_save_sends_changed_fields() {
    Scenario::new("save_sends_changed_fields")
        .logged_in()
        .request("page", ObjectKind::Page, 100)
        .settle()
        .set_prop("page", "name", json!("Start"))
        .assert_prop("page", "name", json!("Start"))
        .save("page")
        .settle()
        .assert(Assertion::BackendProp {
            kind: ObjectKind::Page,
            id: 100,
            name: "name".into(),
            value: json!("Start"),
        })
        .run()
        .unwrap();
}

#[test]
fn test_readonly_attributes_are_refused_locally() {
    Scenario::new("readonly_attributes_are_refused_locally")
        .logged_in()
        .request("page", ObjectKind::Page, 100)
        .settle()
        .set_prop_rejected("page", "id", json!(7), "READONLY_ATTRIBUTE")
        .set_prop_rejected("page", "inherited", json!(true), "READONLY_ATTRIBUTE")
        .assert_prop("page", "id", json!(100))
        .run()
        .unwrap();
}

#[test]
fn test_unhandled_error_stops_the_loop() {
    Scenario::new("unhandled_error_stops_the_loop")
        .logged_in()
        .request("missing", ObjectKind::Page, 9999)
        .settle_fails_with("NOTFOUND")
        .run()
        .unwrap();
}

#[test]
fn test_failed_fetch_is_not_cached() {
    Scenario::new("failed_fetch_is_not_cached")
        .handles_errors()
        .logged_in()
        .request("first", ObjectKind::Page, 9999)
        .settle()
        .assert_error("NOTFOUND")
        .request("second", ObjectKind::Page, 9999)
        .assert_distinct("first", "second")
        .settle()
        .assert_requests_to("/page/load/9999", 2)
        .run()
        .unwrap();
}

#[test]
fn test_transport_failure_is_reported() {
    Scenario::new("transport_failure_is_reported")
        .handles_errors()
        .logged_in()
        .go_offline()
        .request("page", ObjectKind::Page, 100)
        .settle()
        .assert_error("HTTP_ERROR")
        .assert_fetched("page", false)
        .run()
        .unwrap();
}

#[test]
fn test_remove_drops_every_cache_entry() {
    Scenario::new("remove_drops_every_cache_entry")
        .handles_errors()
        .logged_in()
        .request("file", ObjectKind::File, 200)
        .settle()
        .remove("file")
        .settle()
        .assert_no_errors()
        .assert(Assertion::Stale("file".into()))
        .assert(Assertion::CacheLen {
            kind: ObjectKind::File,
            len: 0,
        })
        .request("again", ObjectKind::File, 200)
        .assert_distinct("file", "again")
        .settle()
        .assert_error("NOTFOUND")
        .run()
        .unwrap();
}

#[test]
fn test_page_workflow_actions() {
    Scenario::new("page_workflow_actions")
        .logged_in()
        .request("page", ObjectKind::Page, 100)
        .settle()
        .page_action("page", PageAction::Publish)
        .settle()
        .assert(Assertion::BackendProp {
            kind: ObjectKind::Page,
            id: 100,
            name: "online".into(),
            value: json!(true),
        })
        .assert_fetched("page", false)
        .page_action("page", PageAction::TakeOffline)
        .settle()
        .assert(Assertion::BackendProp {
            kind: ObjectKind::Page,
            id: 100,
            name: "online".into(),
            value: json!(false),
        })
        .assert_requests_to("/page/publish/100", 1)
        .assert_requests_to("/page/takeOffline/100", 1)
        .run()
        .unwrap();
}

#[test]
fn test_failing_subscriber_is_reported() {
    Scenario::new("failing_subscriber_is_reported")
        .handles_errors()
        .assert(Assertion::Custom(Box::new(|runner| {
            runner
                .gcn()
                .events()
                .subscribe("session.sid-set", |_| {
                    Err(gcn_core::GcnError::Config("subscriber broke".into()))
                })?;
            Ok(())
        })))
        .logged_in()
        .assert_error("PUBSUB_HANDLER_FAILED")
        .run()
        .unwrap();
}
