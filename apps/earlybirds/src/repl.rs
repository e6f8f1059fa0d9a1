//! Line-oriented front end: maps typed commands onto controller actions.

use std::{io::Write as _, sync::Arc};

use anyhow::{bail, Result};
use client_core::{ControllerEvent, ViewController, ViewState};
use shared::domain::ProductId;
use tokio::{
    io::{AsyncBufReadExt, BufReader, Lines, Stdin},
    sync::broadcast::{self, error::RecvError},
    task::JoinHandle,
};
use tracing::{debug, warn};

use crate::render;

const HELP: &str = "\
commands:
  login            sign in with email and passcode
  signup           create a profile
  toggle           switch between the login and signup views
  menu | history   switch views while signed in
  home             menu when signed in, login otherwise
  order <id>       order one of the listed products
  refresh          reload the menu (and history when signed in)
  logout           sign out
  help | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login,
    Signup,
    Toggle,
    Menu,
    History,
    Home,
    Order(ProductId),
    Refresh,
    Logout,
    Help,
    Quit,
}

impl Command {
    /// Remote-only commands that need no further input; these run on their
    /// own task so the prompt stays live while the call is in flight.
    pub fn runs_in_background(&self) -> bool {
        matches!(self, Self::Order(_) | Self::Refresh)
    }
}

pub fn parse_command(line: &str) -> Result<Command> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        bail!("type `help` for a list of commands");
    };
    let command = match verb.to_ascii_lowercase().as_str() {
        "login" | "signin" => Command::Login,
        "signup" | "join" => Command::Signup,
        "toggle" => Command::Toggle,
        "menu" => Command::Menu,
        "history" => Command::History,
        "home" => Command::Home,
        "order" => match words.next() {
            Some(id) => Command::Order(ProductId::from(id)),
            None => bail!("usage: order <product-id>"),
        },
        "refresh" => Command::Refresh,
        "logout" => Command::Logout,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => bail!("unknown command '{other}'; type `help`"),
    };
    if words.next().is_some() {
        bail!("unexpected arguments after '{verb}'");
    }
    Ok(command)
}

struct Prompt {
    lines: Lines<BufReader<Stdin>>,
}

impl Prompt {
    fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    async fn ask(&mut self, label: &str) -> Result<Option<String>> {
        print!("{label}: ");
        std::io::stdout().flush()?;
        Ok(self
            .lines
            .next_line()
            .await?
            .map(|line| line.trim().to_string()))
    }
}

pub async fn run(controller: Arc<ViewController>) -> Result<()> {
    let printer = spawn_event_printer(controller.subscribe_events());
    let mut prompt = Prompt::new();

    controller.load_menu().await;
    println!("{}", render::view(&controller.snapshot().await));

    loop {
        let Some(line) = prompt.ask(">").await? else {
            break;
        };
        if line.is_empty() {
            continue;
        }
        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(err) => {
                println!("{err}");
                continue;
            }
        };
        debug!(?command, "dispatching command");

        match command {
            Command::Quit => break,
            Command::Help => {
                println!("{HELP}");
                continue;
            }
            command if command.runs_in_background() => {
                spawn_background(controller.clone(), command);
                continue;
            }
            command => {
                if !dispatch(&controller, &mut prompt, command).await? {
                    break;
                }
            }
        }

        println!("{}", render::view(&controller.snapshot().await));
    }

    printer.abort();
    Ok(())
}

fn spawn_background(controller: Arc<ViewController>, command: Command) {
    tokio::spawn(async move {
        let result = match command {
            Command::Order(product_id) => controller.place_order_by_id(&product_id).await,
            _ => {
                refresh(&controller).await;
                Ok(())
            }
        };
        match result {
            Ok(()) => println!("{}", render::view(&controller.snapshot().await)),
            Err(err) => println!("{err}"),
        }
    });
}

async fn refresh(controller: &ViewController) {
    controller.load_menu().await;
    if let Some(profile) = controller.snapshot().await.session {
        controller.load_orders(&profile.email).await;
    }
}

/// Returns `false` once stdin is exhausted mid-form.
async fn dispatch(
    controller: &ViewController,
    prompt: &mut Prompt,
    command: Command,
) -> Result<bool> {
    let result = match command {
        Command::Login => {
            if !enter_auth_view(controller, ViewState::Login).await {
                return Ok(true);
            }
            let Some(email) = prompt.ask("Email").await? else {
                return Ok(false);
            };
            let Some(passcode) = prompt.ask("Passcode").await? else {
                return Ok(false);
            };
            controller.set_draft_email(email).await;
            controller.set_draft_passcode(passcode).await;
            controller.submit_login().await;
            Ok(())
        }
        Command::Signup => {
            if !enter_auth_view(controller, ViewState::Signup).await {
                return Ok(true);
            }
            let Some(name) = prompt.ask("Full Name").await? else {
                return Ok(false);
            };
            let Some(email) = prompt.ask("Email").await? else {
                return Ok(false);
            };
            let Some(passcode) = prompt.ask("Passcode").await? else {
                return Ok(false);
            };
            controller.set_draft_name(name).await;
            controller.set_draft_email(email).await;
            controller.set_draft_passcode(passcode).await;
            controller.submit_signup().await;
            Ok(())
        }
        Command::Toggle => controller.toggle_auth_view().await.map(|_| ()),
        Command::Menu => controller.show_menu().await,
        Command::History => controller.show_history().await,
        Command::Home => {
            controller.go_home().await;
            Ok(())
        }
        Command::Order(product_id) => controller.place_order_by_id(&product_id).await,
        Command::Refresh => {
            refresh(controller).await;
            Ok(())
        }
        Command::Logout => {
            controller.logout().await;
            Ok(())
        }
        Command::Help | Command::Quit => Ok(()),
    };

    if let Err(err) = result {
        println!("{err}");
    }
    Ok(true)
}

/// Moves to `target` if needed. `false` when signed in.
async fn enter_auth_view(controller: &ViewController, target: ViewState) -> bool {
    let snapshot = controller.snapshot().await;
    if snapshot.session.is_some() {
        println!("already signed in; use `logout` first");
        return false;
    }
    if snapshot.view != target {
        if let Err(err) = controller.toggle_auth_view().await {
            println!("{err}");
            return false;
        }
    }
    true
}

/// Notices are printed as they arrive; displayed errors render with the view.
fn event_line(event: &ControllerEvent) -> Option<String> {
    match event {
        ControllerEvent::Notice(message) => Some(format!("* {message}")),
        _ => None,
    }
}

fn spawn_event_printer(mut events: broadcast::Receiver<ControllerEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Some(line) = event_line(&event) {
                        println!("{line}");
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event listener lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}
