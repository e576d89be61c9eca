use super::assertions::Assertion;
use gcn_core::mock::SsoMode;
use gcn_core::ObjectKind;
use serde_json::Value;

/// How a chained object is reached from a labelled one.
#[derive(Debug, Clone)]
pub enum Relation {
    /// `folder()` of a node, page, template, file or image.
    Folder,
    /// `template()` of a page.
    Template,
    /// `tag(name)` of a page.
    Tag(String),
    /// `page(id)` of a folder.
    Page(u64),
    /// `folder(id)` of a folder.
    SubFolder(u64),
}

/// Folder listings.
#[derive(Debug, Clone, Copy)]
pub enum Listing {
    Pages,
    Folders,
}

/// Page workflow actions.
#[derive(Debug, Clone, Copy)]
pub enum PageAction {
    Publish,
    TakeOffline,
    Unlock,
}

/// One loosely typed request argument. Callbacks are numbered in order of appearance.
#[derive(Debug, Clone)]
pub enum ArgSpec {
    Value(Value),
    Callback,
}

/// All possible actions in a test scenario
#[derive(Debug)]
pub enum ScenarioStep {
    // Host wiring
    HandleErrors,
    HandleAuthentication,
    AddRenderStage {
        channel: String,
        prefix: String,
        suffix: String,
    },

    // Session
    LoginDirect,
    Login {
        user: String,
        password: String,
    },
    Logout,
    SsoLogin,
    LoadUser,
    Reauthenticate {
        user: String,
        password: String,
    },
    CancelAuthentication,

    // Objects
    Request {
        label: String,
        kind: ObjectKind,
        id: u64,
        channel: u32,
    },
    RequestWithArgs {
        label: String,
        kind: ObjectKind,
        args: Vec<ArgSpec>,
    },
    Chain {
        from: String,
        relation: Relation,
        label: String,
    },
    List {
        folder: String,
        listing: Listing,
        name: String,
    },
    CreatePage {
        folder: String,
        template: u64,
        label: String,
    },
    SetProp {
        label: String,
        name: String,
        value: Value,
        rejected_with: Option<String>,
    },
    SetPart {
        tag: String,
        part: String,
        value: Value,
    },
    Clear {
        label: String,
    },
    Save {
        label: String,
    },
    Remove {
        label: String,
    },
    Page {
        label: String,
        action: PageAction,
    },

    // Multichannelling
    Localize {
        label: String,
        result: String,
    },
    Unlocalize {
        label: String,
        result: String,
    },

    // Rendering
    Render {
        tag: String,
        output: String,
        edit: bool,
    },
    Preview {
        page: String,
        output: String,
    },

    // Backend control
    ExpireSessions,
    LocalizeOnServer {
        kind: ObjectKind,
        id: u64,
        channel: u32,
    },
    SetOffline(bool),
    SetSso(SsoMode),

    // Event loop
    Settle,
    SettleFatal {
        code: String,
    },

    // Assertions (can be interspersed)
    Assert {
        assertion: Assertion,
    },
}
