//! A terminal chat client built on the `nebula` library.

#[macro_use]
extern crate tracing;

use std::io::Write as _;
use std::pin::pin;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use nebula::core::{ChatSnapshot, SendOutcome};
use nebula::model::{ChatMessage, Mode, Role};
use nebula::{Config, LoadProgress, Session, SessionBuilder};
use owo_colors::OwoColorize;
use tokio::io::{self, AsyncBufReadExt};
use tokio::select;
use tokio::sync::mpsc;
use tokio::time::sleep;

const BAR_CHAR: &str = "▎";

enum Command<'a> {
    Mode(Option<&'a str>),
    Clear,
    Engine,
    History,
    Quit,
    Send(&'a str),
}

impl<'a> Command<'a> {
    fn parse(line: &'a str) -> Self {
        let line = line.trim();
        let (name, arg) = match line.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, Some(arg.trim())),
            None => (line, None),
        };
        match name {
            "/mode" => Command::Mode(arg.filter(|arg| !arg.is_empty())),
            "/clear" => Command::Clear,
            "/engine" => Command::Engine,
            "/history" => Command::History,
            "/quit" | "/exit" => Command::Quit,
            _ => Command::Send(line),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return;
        }
    };
    debug!("loaded config: {config:?}");

    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
    let session = SessionBuilder::with_config(config)
        .on_progress(move |progress| {
            progress_tx.send(progress.clone()).ok();
        })
        .build();

    println!(
        "{} {} mode, {} messages in memory. Type /quit to leave.",
        "Nebula".bright_magenta().bold(),
        session.mode(),
        session.messages().len()
    );

    // Ctrl-C cancels a running send, and leaves at the prompt.
    let mut interrupt_rx = forward_interrupts(tokio::signal::ctrl_c);

    let spinner_style = ProgressStyle::with_template("{spinner} {wide_msg}")
        .unwrap()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
    let loading_style =
        ProgressStyle::with_template("{bar:30.magenta} {pos:>3}% {wide_msg}")
            .unwrap();

    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let line = select! {
            line = read_line() => line,
            Some(()) = interrupt_rx.recv() => None,
        };
        let Some(line) = line else {
            println!();
            break;
        };
        match Command::parse(&line) {
            Command::Quit => break,
            Command::Mode(None) => {
                for mode in Mode::ALL {
                    let marker = if mode == session.mode() { "*" } else { " " };
                    println!("{marker} {}", mode.name());
                }
            }
            Command::Mode(Some(name)) => match name.parse::<Mode>() {
                Ok(mode) => {
                    session.set_mode(mode).await;
                    println!("Switched to {} mode.", mode.bright_white());
                }
                Err(err) => println!("{}", err.bright_red()),
            },
            Command::Clear => {
                session.clear_memory().await;
                println!("Memory cleared.");
            }
            Command::Engine => match session.engine_name() {
                Some(name) => println!("Active engine: {}", name.bright_white()),
                None => println!("No engine has been resolved yet."),
            },
            Command::History => {
                for msg in session.messages() {
                    print_message(&msg);
                }
            }
            Command::Send("") => {}
            Command::Send(text) => {
                let channels = (&mut progress_rx, &mut interrupt_rx);
                let style = (&spinner_style, &loading_style);
                converse(&session, text, channels, style).await;
            }
        }
    }
}

async fn converse(
    session: &Session,
    text: &str,
    (progress_rx, interrupt_rx): (
        &mut mpsc::UnboundedReceiver<LoadProgress>,
        &mut mpsc::UnboundedReceiver<()>,
    ),
    (spinner_style, loading_style): (&ProgressStyle, &ProgressStyle),
) {
    let mut snapshots = session.subscribe();
    let mut send = pin!(session.send_message(text));

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(spinner_style.clone());
    spinner.set_message("Thinking...");
    let mut loading: Option<ProgressBar> = None;
    let mut printed = String::new();
    let mut streaming = false;

    let outcome = loop {
        select! {
            outcome = &mut send => break outcome,
            changed = snapshots.changed() => {
                if changed.is_err() {
                    continue;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                let Some(delta) = new_text(&snapshot, &printed) else {
                    continue;
                };
                if !streaming {
                    spinner.finish_and_clear();
                    if let Some(loading) = loading.take() {
                        loading.finish_and_clear();
                    }
                    print!("{}🤖 ", BAR_CHAR.bright_cyan());
                    streaming = true;
                }
                print!("{}", delta.bright_white());
                std::io::stdout().flush().ok();
                printed.push_str(&delta);
            }
            Some(progress) = progress_rx.recv() => {
                let bar = loading.get_or_insert_with(|| {
                    spinner.finish_and_clear();
                    let bar = ProgressBar::new(100);
                    bar.set_style(loading_style.clone());
                    bar
                });
                if let Some(percent) = progress.percent {
                    bar.set_position(percent.into());
                }
                bar.set_message(progress.text);
            }
            Some(()) = interrupt_rx.recv() => {
                session.cancel();
            }
            _ = sleep(Duration::from_millis(100)) => {
                if !streaming && loading.is_none() {
                    spinner.inc(1);
                }
            }
        }
    };
    spinner.finish_and_clear();
    if let Some(loading) = loading {
        loading.finish_and_clear();
    }

    // The settled turn may have been replaced by a fallback or an error
    // message instead of the streamed text.
    let settled = session
        .messages()
        .last()
        .filter(|msg| msg.role == Role::Assistant)
        .map(|msg| msg.content.clone())
        .unwrap_or_default();
    match outcome {
        SendOutcome::Completed if settled == printed => println!(),
        SendOutcome::Completed => {
            if streaming {
                println!();
            }
            println!("{}🤖 {}", BAR_CHAR.bright_cyan(), settled.bright_white());
        }
        SendOutcome::Failed(failure) => {
            if streaming {
                println!();
            }
            debug!("send failed: {failure:?}");
            println!("{}{}", BAR_CHAR.bright_red(), settled.bright_red());
        }
        SendOutcome::Rejected(reason) => {
            println!("{}", format!("Ignored: {reason:?}").bright_yellow());
        }
    }
}

/// Forwards every interrupt reported by `signal` until it fails.
fn forward_interrupts<F, Fut>(mut signal: F) -> mpsc::UnboundedReceiver<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = std::io::Result<()>> + Send,
{
    let (interrupt_tx, interrupt_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while signal().await.is_ok() {
            if interrupt_tx.send(()).is_err() {
                break;
            }
        }
    });
    interrupt_rx
}

/// Returns the text of the streamed turn that has not been printed yet.
fn new_text(snapshot: &ChatSnapshot, printed: &str) -> Option<String> {
    if !snapshot.is_typing {
        return None;
    }
    let last = snapshot.messages.last()?;
    if last.role != Role::Assistant {
        return None;
    }
    let delta = last.content.strip_prefix(printed)?;
    (!delta.is_empty()).then(|| delta.to_owned())
}

fn print_message(msg: &ChatMessage) {
    match msg.role {
        Role::User => println!("{}{}", BAR_CHAR.bright_green(), msg.content),
        Role::Assistant => println!(
            "{}🤖 {}",
            BAR_CHAR.bright_cyan(),
            msg.content.bright_white()
        ),
        Role::System => {
            println!("{}{}", BAR_CHAR.dimmed(), msg.content.dimmed())
        }
    }
}

async fn read_line() -> Option<String> {
    let mut stdin = io::BufReader::new(io::stdin());
    let mut line = String::new();

    match stdin.read_line(&mut line).await {
        Ok(0) => None,
        Ok(_) => Some(line),
        Err(err) => {
            error!("error reading input: {}", err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_forward_interrupts() {
        let mut remaining = 2;
        let mut interrupts = forward_interrupts(move || {
            let result = if remaining > 0 {
                remaining -= 1;
                Ok(())
            } else {
                Err(std::io::Error::other("listener closed"))
            };
            async move { result }
        });
        // Every interrupt arrives, not only the first one.
        assert_eq!(interrupts.recv().await, Some(()));
        assert_eq!(interrupts.recv().await, Some(()));
        assert_eq!(interrupts.recv().await, None);
    }

    #[test]
    fn test_parse_command() {
        assert!(matches!(Command::parse("/mode"), Command::Mode(None)));
        assert!(matches!(
            Command::parse("/mode  stealth "),
            Command::Mode(Some("stealth"))
        ));
        assert!(matches!(Command::parse("/exit"), Command::Quit));
        assert!(matches!(
            Command::parse(" hi there\n"),
            Command::Send("hi there")
        ));
    }
}
