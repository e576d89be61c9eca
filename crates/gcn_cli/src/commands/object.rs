//! Object commands: load, localize, unlocalize.

use crate::client::{parse_kind, Client};
use anyhow::{Context, Result};
use chrono::{DateTime, Local, TimeZone};
use console::style;
use gcn_core::{Callbacks, ChannelId, Handle, LocalizationState, ObjectId};
use serde_json::Value;
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

/// Unix timestamps the CMS reports on objects.
const TIMESTAMP_FIELDS: &[(&str, &str)] = &[("cdate", "Created"), ("edate", "Edited")];

fn format_timestamp(value: &Value) -> Option<String> {
    let secs = value.as_i64()?;
    let time: DateTime<Local> = Local.timestamp_opt(secs, 0).single()?;
    Some(time.format("%Y-%m-%d %H:%M:%S").to_string())
}

fn state_label(state: Option<LocalizationState>) -> &'static str {
    match state {
        Some(LocalizationState::Inherited) => "inherited",
        Some(LocalizationState::Localizing) => "localizing",
        Some(LocalizationState::Localized) => "local",
        Some(LocalizationState::Unlocalizing) => "unlocalizing",
        None => "-",
    }
}

fn print_handle(handle: &Handle) -> Result<()> {
    println!(
        "{} {} {}",
        style(handle.kind()).bold(),
        style(handle.id()).cyan(),
        style(format!("[{}]", handle.hash())).dim()
    );
    if !handle.channel().is_none() {
        println!(
            "  channel {} ({})",
            handle.channel(),
            state_label(handle.localization_state())
        );
    }
    for (field, label) in TIMESTAMP_FIELDS {
        if let Some(formatted) = handle.prop(field).as_ref().and_then(format_timestamp) {
            println!("  {}: {}", label, formatted);
        }
    }
    println!();
    let json = serde_json::to_string_pretty(&handle.data())
        .context("Failed to serialize object data")?;
    println!("{}", json);
    Ok(())
}

/// Fetches one object, optionally passes it through `action`, and prints the result.
fn with_object(
    config: &Path,
    sid: Option<&str>,
    kind: &str,
    id: &str,
    channel: u32,
    message: &str,
    action: Option<fn(&Handle, Callbacks<Handle>)>,
) -> Result<()> {
    let kind = parse_kind(kind)?;
    let client = Client::connect(config, sid)?;

    let result: Rc<RefCell<Option<Handle>>> = Rc::new(RefCell::new(None));
    let slot = result.clone();
    let done = Callbacks::new().on_success(move |handle| *slot.borrow_mut() = Some(handle));

    let loaded = match action {
        Some(action) => Callbacks::new().on_success(move |handle: Handle| action(&handle, done)),
        None => done,
    };
    client
        .gcn
        .request(kind, ObjectId::from(id), ChannelId(channel), loaded);
    client.run(message)?;

    let handle = result
        .borrow_mut()
        .take()
        .context("Request finished without an object")?;
    print_handle(&handle)
}

/// Load and print an object.
pub fn load(config: &Path, sid: Option<&str>, kind: &str, id: &str, channel: u32) -> Result<()> {
    with_object(
        config,
        sid,
        kind,
        id,
        channel,
        "Loading...",
        None,
    )
}

/// Localize an inherited object in `channel`.
pub fn localize(
    config: &Path,
    sid: Option<&str>,
    kind: &str,
    id: &str,
    channel: u32,
) -> Result<()> {
    with_object(
        config,
        sid,
        kind,
        id,
        channel,
        "Localizing...",
        Some(gcn_core::localize),
    )?;
    println!("{}", style("Localized").green().bold());
    Ok(())
}

/// Remove the local copy of an object in `channel`.
pub fn unlocalize(
    config: &Path,
    sid: Option<&str>,
    kind: &str,
    id: &str,
    channel: u32,
) -> Result<()> {
    with_object(
        config,
        sid,
        kind,
        id,
        channel,
        "Unlocalizing...",
        Some(gcn_core::unlocalize),
    )?;
    println!("{}", style("Unlocalized").green().bold());
    Ok(())
}
