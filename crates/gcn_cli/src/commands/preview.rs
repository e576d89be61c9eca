//! Page preview command.

use crate::client::Client;
use anyhow::{Context, Result};
use gcn_core::{Callbacks, ChannelId};
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

/// Render `page` and print the resulting HTML.
pub fn run(config: &Path, sid: Option<&str>, page: u64, channel: u32) -> Result<()> {
    let client = Client::connect(config, sid)?;
    let result: Rc<RefCell<Option<String>>> = Rc::new(RefCell::new(None));
    let slot = result.clone();

    let page = client.gcn.page(page, ChannelId(channel), Callbacks::new());
    page.preview(Callbacks::new().on_success(move |html| *slot.borrow_mut() = Some(html)));
    client.run("Rendering preview...")?;

    let html = result
        .borrow_mut()
        .take()
        .context("Preview finished without output")?;
    println!("{}", html);
    Ok(())
}
