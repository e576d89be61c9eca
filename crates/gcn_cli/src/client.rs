//! A client context wired for the terminal.

use crate::http::HttpTransport;
use anyhow::{anyhow, Context, Result};
use console::style;
use gcn_core::{channels, Gcn, GcnError, Message, Settings};
use indicatif::{ProgressBar, ProgressStyle};
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

/// A context talking to the configured CMS, collecting the first unhandled error.
pub struct Client {
    pub gcn: Gcn,
    failure: Rc<RefCell<Option<GcnError>>>,
}

impl Client {
    /// Loads `gcn.toml` from `config_dir` and connects, reusing `sid` if given.
    pub fn connect(config_dir: &Path, sid: Option<&str>) -> Result<Self> {
        let settings = Settings::load(config_dir).context("Failed to load gcn.toml")?;
        let transport = HttpTransport::new(&settings.backend.base_url)
            .context("Failed to set up HTTP transport")?;
        let gcn = Gcn::new(settings, Rc::new(transport));

        let failure: Rc<RefCell<Option<GcnError>>> = Rc::new(RefCell::new(None));
        let slot = failure.clone();
        gcn.events()
            .subscribe(channels::ERROR_ENCOUNTERED, move |message| {
                if let Some(err) = message.as_error() {
                    tracing::debug!(code = err.code(), "error encountered");
                    slot.borrow_mut().get_or_insert_with(|| err.clone());
                }
                Ok(())
            })
            .map_err(|e| anyhow!("{}", e))?;

        // Non-interactive: a session that expires mid-command cannot be renewed.
        gcn.events()
            .subscribe(channels::AUTHENTICATION_REQUIRED, |message| match message {
                Message::AuthenticationRequired(prompt) => prompt.cancel(),
                _ => Ok(()),
            })
            .map_err(|e| anyhow!("{}", e))?;

        if let Some(sid) = sid {
            gcn.session()
                .set_sid(sid)
                .map_err(|e| anyhow!("{}", e))?;
        }

        Ok(Self { gcn, failure })
    }

    /// Runs queued work to completion, showing a spinner meanwhile.
    pub fn run(&self, message: &str) -> Result<()> {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(100));

        let result = self.gcn.run_until_idle();
        spinner.finish_and_clear();

        if let Err(err) = result {
            return Err(describe(&err));
        }
        match self.failure.borrow_mut().take() {
            Some(err) => Err(describe(&err)),
            None => Ok(()),
        }
    }
}

/// Turns a client error into a terminal-friendly report.
pub fn describe(err: &GcnError) -> anyhow::Error {
    match err.recovery_suggestion() {
        Some(hint) => anyhow!("{}\n  {} {}", err, style("hint:").yellow(), hint),
        None => anyhow!("{}", err),
    }
}

/// Parses an object type name given on the command line.
pub fn parse_kind(kind: &str) -> Result<gcn_core::ObjectKind> {
    gcn_core::ObjectKind::parse(kind).with_context(|| {
        format!(
            "Unknown object type '{}' (expected node, folder, page, file, image, template)",
            kind
        )
    })
}
