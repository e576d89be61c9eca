use crate::harness::{Assertion, Relation, Scenario};
use gcn_core::mock::CHANNEL_NODE;
use gcn_core::{LocalizationState, ObjectKind};
use serde_json::json;

#[test]
fn test_localize_and_unlocalize_round_trip() {
    Scenario::new("localize_and_unlocalize_round_trip")
        .logged_in()
        .request_in("page", ObjectKind::Page, 100, CHANNEL_NODE)
        .settle()
        .assert_localization("page", Some(LocalizationState::Inherited))
        .localize("page", "local")
        .settle()
        .assert_local_copy(ObjectKind::Page, 100, CHANNEL_NODE, true)
        .assert_id("local", 1001)
        .assert_prop("local", "masterId", json!(100))
        .assert_localization("local", Some(LocalizationState::Localized))
        .assert(Assertion::Stale("page".into()))
        .assert_distinct("page", "local")
        // the original id now leads to the local copy
        .request_in("again", ObjectKind::Page, 100, CHANNEL_NODE)
        .assert_same("again", "local")
        .request_in("by_local_id", ObjectKind::Page, 1001, CHANNEL_NODE)
        .assert_same("by_local_id", "local")
        .unlocalize("local", "inherited")
        .settle()
        .assert_local_copy(ObjectKind::Page, 100, CHANNEL_NODE, false)
        .assert_id("inherited", 100)
        .assert_localization("inherited", Some(LocalizationState::Inherited))
        .assert(Assertion::Stale("local".into()))
        .assert_requests_to("/page/localize/100", 1)
        .assert_requests_to("/page/unlocalize/1001", 1)
        .run()
        .expect("scenario should pass");
}

#[test]
fn test_stale_handle_forwards_to_the_local_copy() {
    Scenario::new("stale_handle_forwards_to_the_local_copy")
        .logged_in()
        .request_in("page", ObjectKind::Page, 100, CHANNEL_NODE)
        .settle()
        .localize("page", "local")
        .settle()
        .request_in("again", ObjectKind::Page, 100, CHANNEL_NODE)
        .assert_same("again", "local")
        .assert(Assertion::Custom(Box::new(|runner| {
            let local = runner.handle("local")?;
            anyhow::ensure!(
                !runner.gcn().cache().keys_of(&local).is_empty(),
                "local copy is not cached"
            );
            anyhow::ensure!(
                runner.gcn().cache().keys_of(&runner.handle("page")?).is_empty(),
                "retired handle is still cached"
            );
            Ok(())
        })))
        .run()
        .unwrap();
}

#[test]
fn test_tag_identity_survives_local_copy_substitution() {
    Scenario::new("tag_identity_survives_local_copy_substitution")
        .logged_in()
        .localized_on_server(ObjectKind::Page, 100, CHANNEL_NODE)
        .request_in("page", ObjectKind::Page, 100, CHANNEL_NODE)
        .chain("page", Relation::Tag("content".into()), "early")
        .settle()
        .assert_id("page", 1001)
        .chain("page", Relation::Tag("content".into()), "late")
        .assert_same("early", "late")
        .request_in("by_local_id", ObjectKind::Page, 1001, CHANNEL_NODE)
        .assert_same("by_local_id", "page")
        .chain("by_local_id", Relation::Tag("content".into()), "via_local_id")
        .assert_same("via_local_id", "early")
        .assert(Assertion::CacheLen {
            kind: ObjectKind::Tag,
            len: 1,
        })
        .assert_fetched("early", true)
        .assert_requests_to("/page/load/100", 1)
        .run()
        .expect("scenario should pass");
}

#[test]
fn test_localize_needs_a_channel() {
    Scenario::new("localize_needs_a_channel")
        .handles_errors()
        .logged_in()
        .request("page", ObjectKind::Page, 100)
        .settle()
        .localize("page", "local")
        .settle()
        .assert_error("CANNOT_LOCALIZE")
        .assert_requests_to("/page/localize/100", 0)
        .run()
        .unwrap();
}

#[test]
fn test_localize_twice_is_refused_before_the_change() {
    Scenario::new("localize_twice_is_refused_before_the_change")
        .handles_errors()
        .logged_in()
        .request_in("page", ObjectKind::Page, 100, CHANNEL_NODE)
        .localize("page", "local")
        .settle()
        .assert_no_errors()
        .localize("local", "local_again")
        .settle()
        .assert_error("CANNOT_LOCALIZE")
        .assert_requests_to("/localize/1001", 0)
        .assert_requests_to("/page/localize/100", 1)
        .assert_localization("local", Some(LocalizationState::Localized))
        .run()
        .unwrap();
}

#[test]
fn test_unlocalize_inherited_object_is_refused() {
    Scenario::new("unlocalize_inherited_object_is_refused")
        .handles_errors()
        .logged_in()
        .request_in("image", ObjectKind::Image, 201, CHANNEL_NODE)
        .unlocalize("image", "result")
        .settle()
        .assert_error("CANNONT_UNLOCALIZE")
        .assert_requests_to("/image/unlocalize/201", 0)
        .run()
        .unwrap();
}

#[test]
fn test_localize_other_types() {
    Scenario::new("localize_other_types")
        .logged_in()
        .request_in("image", ObjectKind::Image, 201, CHANNEL_NODE)
        .request_in("template", ObjectKind::Template, 50, CHANNEL_NODE)
        .localize("image", "local_image")
        .localize("template", "local_template")
        .settle()
        .assert_local_copy(ObjectKind::Image, 201, CHANNEL_NODE, true)
        .assert_local_copy(ObjectKind::Template, 50, CHANNEL_NODE, true)
        .assert_localization("local_image", Some(LocalizationState::Localized))
        .assert_localization("local_template", Some(LocalizationState::Localized))
        .run()
        .unwrap();
}

#[test]
fn test_local_change_stays_in_the_channel() {
    Scenario::new("local_change_stays_in_the_channel")
        .logged_in()
        .request_in("page", ObjectKind::Page, 100, CHANNEL_NODE)
        .localize("page", "local")
        .settle()
        .set_prop("local", "name", json!("Channel Home"))
        .save("local")
        .settle()
        .assert(Assertion::BackendProp {
            kind: ObjectKind::Page,
            id: 1001,
            name: "name".into(),
            value: json!("Channel Home"),
        })
        .assert(Assertion::BackendProp {
            kind: ObjectKind::Page,
            id: 100,
            name: "name".into(),
            value: json!("Home"),
        })
        .run()
        .unwrap();
}
