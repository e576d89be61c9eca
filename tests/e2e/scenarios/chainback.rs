use crate::harness::{Assertion, Listing, Relation, Scenario};
use gcn_core::ObjectKind;
use serde_json::json;

#[test]
fn test_node_to_root_folder() {
    Scenario::new("node_to_root_folder")
        .logged_in()
        .request("node", ObjectKind::Node, 1)
        .chain("node", Relation::Folder, "root")
        .settle()
        .assert_id("root", 10)
        .assert_prop("root", "name", json!("Root"))
        .run()
        .expect("scenario should pass");
}

#[test]
fn test_chained_and_direct_requests_meet_in_the_cache() {
    Scenario::new("chained_and_direct_requests_meet_in_the_cache")
        .logged_in()
        .request("folder", ObjectKind::Folder, 10)
        .chain("folder", Relation::Page(100), "via_folder")
        .request("direct", ObjectKind::Page, 100)
        .assert_same("via_folder", "direct")
        .settle()
        .assert_requests_to("/page/load/100", 1)
        .run()
        .unwrap();
}

#[test]
fn test_folder_chain_keeps_the_channel() {
    Scenario::new("folder_chain_keeps_the_channel")
        .logged_in()
        .request_in("folder", ObjectKind::Folder, 10, 2)
        .chain("folder", Relation::SubFolder(11), "news")
        .request_in("direct", ObjectKind::Folder, 11, 2)
        .request("plain", ObjectKind::Folder, 11)
        .assert_same("news", "direct")
        .assert_distinct("news", "plain")
        .run()
        .unwrap();
}

#[test]
fn test_page_template_and_folder() {
    Scenario::new("page_template_and_folder")
        .logged_in()
        .request("page", ObjectKind::Page, 101)
        .chain("page", Relation::Template, "template")
        .chain("page", Relation::Folder, "folder")
        .settle()
        .assert_id("template", 50)
        .assert_prop("template", "name", json!("Standard"))
        .assert_id("folder", 11)
        .assert_prop("folder", "name", json!("News"))
        .run()
        .unwrap();
}

#[test]
fn test_file_and_image_folders() {
    Scenario::new("file_and_image_folders")
        .logged_in()
        .request("file", ObjectKind::File, 200)
        .request("image", ObjectKind::Image, 201)
        .chain("file", Relation::Folder, "file_folder")
        .chain("image", Relation::Folder, "image_folder")
        .settle()
        .assert_same("file_folder", "image_folder")
        .assert_id("file_folder", 10)
        .run()
        .unwrap();
}

#[test]
fn test_tag_comes_from_its_page() {
    Scenario::new("tag_comes_from_its_page")
        .logged_in()
        .request("page", ObjectKind::Page, 100)
        .chain("page", Relation::Tag("content".into()), "tag")
        .settle()
        .assert_fetched("tag", true)
        .assert_prop("tag", "name", json!("content"))
        .assert_prop("tag", "constructId", json!(5))
        .assert_requests(1)
        .run()
        .unwrap();
}

#[test]
fn test_tags_of_different_pages_are_distinct() {
    Scenario::new("tags_of_different_pages_are_distinct")
        .logged_in()
        .request("plain", ObjectKind::Page, 100)
        .request_in("channel", ObjectKind::Page, 100, 2)
        .chain("plain", Relation::Tag("content".into()), "plain_tag")
        .chain("channel", Relation::Tag("content".into()), "channel_tag")
        .chain("plain", Relation::Tag("content".into()), "plain_tag_again")
        .assert_distinct("plain_tag", "channel_tag")
        .assert_same("plain_tag", "plain_tag_again")
        .settle()
        .run()
        .unwrap();
}

#[test]
fn test_missing_tag_is_not_found() {
    Scenario::new("missing_tag_is_not_found")
        .handles_errors()
        .logged_in()
        .request("page", ObjectKind::Page, 100)
        .chain("page", Relation::Tag("sidebar".into()), "tag")
        .settle()
        .assert_error("NOTFOUND")
        .assert_fetched("tag", false)
        .run()
        .unwrap();
}

#[test]
fn test_folder_listings_register_instances() {
    Scenario::new("folder_listings_register_instances")
        .logged_in()
        .request("root", ObjectKind::Folder, 10)
        .list("root", Listing::Pages, "pages")
        .list("root", Listing::Folders, "folders")
        .settle()
        .assert(Assertion::ListingLen {
            name: "pages".into(),
            len: 1,
        })
        .assert(Assertion::ListingLen {
            name: "folders".into(),
            len: 1,
        })
        .request("home", ObjectKind::Page, 100)
        .request("news", ObjectKind::Folder, 11)
        .assert(Assertion::ListingHasInstance {
            name: "pages".into(),
            label: "home".into(),
        })
        .assert(Assertion::ListingHasInstance {
            name: "folders".into(),
            label: "news".into(),
        })
        .assert_fetched("home", true)
        .settle()
        .assert_requests_to("/page/load/100", 0)
        .run()
        .unwrap();
}

#[test]
fn test_create_page_in_folder() {
    Scenario::new("create_page_in_folder")
        .logged_in()
        .request("news", ObjectKind::Folder, 11)
        .create_page("news", 50, "created")
        .settle()
        .assert_fetched("created", true)
        .assert_prop("created", "folderId", json!(11))
        .assert_prop("created", "templateId", json!(50))
        .request("direct", ObjectKind::Page, 1001)
        .assert_same("created", "direct")
        .run()
        .unwrap();
}
