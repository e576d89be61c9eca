//! Session commands: login, logout, sso, me.

use crate::client::Client;
use anyhow::{Context, Result};
use console::style;
use gcn_core::{Callbacks, SsoOutcome, User};
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

fn print_user(user: &User) {
    println!(
        "  {} {} ({})",
        user.first_name,
        user.last_name,
        style(&user.login).cyan()
    );
    if !user.email.is_empty() {
        println!("  {}", user.email);
    }
}

fn print_sid(client: &Client) {
    if let Some(sid) = client.gcn.sid() {
        println!();
        println!("Reuse this session with:");
        println!("  export GCN_SID={}", sid);
    }
}

/// Log in with credentials.
pub fn login(config: &Path, user: &str, password: &str) -> Result<()> {
    let client = Client::connect(config, None)?;
    let result: Rc<RefCell<Option<User>>> = Rc::new(RefCell::new(None));
    let slot = result.clone();
    client.gcn.session().login(
        user,
        password,
        Callbacks::new().on_success(move |user| *slot.borrow_mut() = Some(user)),
    );
    client.run("Logging in...")?;

    let user = result
        .borrow_mut()
        .take()
        .context("Login finished without a user")?;
    println!("{}", style("Logged in").green().bold());
    print_user(&user);
    print_sid(&client);
    Ok(())
}

/// End the session given by `--sid`.
pub fn logout(config: &Path, sid: Option<&str>) -> Result<()> {
    let client = Client::connect(config, sid)?;
    let result = Rc::new(RefCell::new(None));
    let slot = result.clone();
    client
        .gcn
        .session()
        .logout(Callbacks::new().on_success(move |done: bool| *slot.borrow_mut() = Some(done)));
    client.run("Logging out...")?;

    match *result.borrow() {
        Some(true) => println!("{}", style("Logged out").green()),
        _ => println!("No session to log out from (pass --sid or set GCN_SID)"),
    }
    Ok(())
}

/// Try single sign-on.
pub fn sso(config: &Path) -> Result<()> {
    let client = Client::connect(config, None)?;
    let result = Rc::new(RefCell::new(None));
    let slot = result.clone();
    client.gcn.session().sso_login(
        Callbacks::new().on_success(move |outcome: SsoOutcome| *slot.borrow_mut() = Some(outcome)),
    );
    client.run("Trying single sign-on...")?;

    let outcome = result.borrow_mut().take();
    match outcome {
        Some(SsoOutcome::Authenticated(user)) => {
            println!("{}", style("Logged in via single sign-on").green().bold());
            print_user(&user);
            print_sid(&client);
        }
        Some(SsoOutcome::NotAvailable) | None => {
            println!("Single sign-on is not available; use 'gcn login'");
        }
    }
    Ok(())
}

/// Show the user of the session given by `--sid`.
pub fn me(config: &Path, sid: Option<&str>) -> Result<()> {
    let client = Client::connect(config, sid)?;
    let result: Rc<RefCell<Option<User>>> = Rc::new(RefCell::new(None));
    let slot = result.clone();
    client
        .gcn
        .session()
        .load_user(Callbacks::new().on_success(move |user| *slot.borrow_mut() = Some(user)));
    client.run("Loading user...")?;

    let user = result
        .borrow_mut()
        .take()
        .context("Request finished without a user")?;
    println!("{}", style("Current user:").bold());
    print_user(&user);
    Ok(())
}
