//! Line-oriented operator console on stdin.
//!
//! ```text
//! start <image> <x> <y>   start a run
//! stop                    stop the run or cancel a pending resume
//! status                  connection and run state
//! tunables                current knob values
//! active <n>              credentials in rotation
//! threshold <f>           similarity threshold
//! divisor <n>             pacing divisor
//! tokens                  reload and list credentials
//! images                  list target images
//! token <uid> <paste>     issue a token
//! quit                    shut the agent down
//! ```

use std::io::BufRead;
use std::str::FromStr;

use tokio::sync::mpsc;
use tracing::warn;

use easel_core::{AgentHandle, PaintError};

use crate::tokens::TokenIssuer;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start { image: String, x: u16, y: u16 },
    Stop,
    Status,
    Tunables,
    Active(usize),
    Threshold(f64),
    Divisor(u32),
    Tokens,
    Images,
    Token { uid: u32, paste: String },
    Help,
    Quit,
}

fn arg<T: FromStr>(words: &[&str], index: usize, name: &str) -> Result<T, String> {
    let word = words
        .get(index)
        .ok_or_else(|| format!("missing <{name}>"))?;
    word.parse()
        .map_err(|_| format!("invalid <{name}>: {word}"))
}

impl FromStr for Command {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some(&verb) = words.first() else {
            return Err("empty command".into());
        };
        let command = match verb {
            "start" => Command::Start {
                image: arg(&words, 1, "image")?,
                x: arg(&words, 2, "x")?,
                y: arg(&words, 3, "y")?,
            },
            "stop" => Command::Stop,
            "status" => Command::Status,
            "tunables" => Command::Tunables,
            "active" => Command::Active(arg(&words, 1, "n")?),
            "threshold" => Command::Threshold(arg(&words, 1, "f")?),
            "divisor" => Command::Divisor(arg(&words, 1, "n")?),
            "tokens" => Command::Tokens,
            "images" => Command::Images,
            "token" => Command::Token {
                uid: arg(&words, 1, "uid")?,
                paste: arg(&words, 2, "paste")?,
            },
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => return Err(format!("unknown command: {other}")),
        };
        Ok(command)
    }
}

/// Run one command and return the text to show the operator.
pub async fn execute(
    command: Command,
    handle: &AgentHandle,
    issuer: &TokenIssuer,
) -> Result<String, PaintError> {
    let out = match command {
        Command::Start { image, x, y } => {
            handle.start_run(image.clone(), x, y).await?;
            format!("started {image} at ({x}, {y})")
        }
        Command::Stop => {
            handle.stop_run().await?;
            "stopping".into()
        }
        Command::Status => serde_json::to_string_pretty(&handle.status().await?)?,
        Command::Tunables => serde_json::to_string_pretty(&handle.tunables().await?)?,
        Command::Active(n) => {
            handle.set_active_count(n).await?;
            format!("active count = {n}")
        }
        Command::Threshold(f) => {
            handle.set_threshold(f).await?;
            format!("threshold = {f}")
        }
        Command::Divisor(n) => {
            handle.set_pacing_divisor(n).await?;
            format!("pacing divisor = {n}")
        }
        Command::Tokens => {
            let creds = handle.reload_credentials().await?;
            let mut out = format!("{} credentials", creds.len());
            for c in &creds {
                out.push_str(&format!("\n  {:>8}  {}", c.uid, c.token));
            }
            out
        }
        Command::Images => handle.list_images().await?.join("\n"),
        Command::Token { uid, paste } => {
            let credential = issuer.issue(uid, &paste).await?;
            format!("token for uid {} saved, run `tokens` to load it", credential.uid)
        }
        Command::Help => HELP.into(),
        Command::Quit => {
            handle.shutdown().await?;
            "shutting down".into()
        }
    };
    Ok(out)
}

const HELP: &str = "commands: start <image> <x> <y> | stop | status | tunables | \
active <n> | threshold <f> | divisor <n> | tokens | images | token <uid> <paste> | quit";

/// Read commands from stdin until `quit` or end of input.
///
/// Lines are read on a plain thread so a pending read never holds up
/// runtime shutdown.
pub async fn run(handle: AgentHandle, issuer: TokenIssuer) {
    let (tx, mut lines) = mpsc::unbounded_channel::<String>();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("stdin read failed: {e}");
                    break;
                }
            }
        }
    });

    while let Some(line) = lines.recv().await {
        if line.trim().is_empty() {
            continue;
        }
        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(e) => {
                println!("{e}\n{HELP}");
                continue;
            }
        };
        let quit = command == Command::Quit;
        match execute(command, &handle, &issuer).await {
            Ok(out) => println!("{out}"),
            Err(e) => println!("error ({:?}): {e}", e.kind()),
        }
        if quit {
            break;
        }
    }
}
