//! Command line grammar
//!
//! A line typed by the operator is turned into a [`Command`] once, here. Anything
//! that does not parse is a [`CommandError`] and never reaches the device.

use std::{fmt, str::FromStr};

use crate::Tool;

pub const INSTALL_USAGE: &str = "install [killswitch|dumpdecrypted|open]";
pub const APP_USAGE: &str = "app [list|select <id>|info|decrypt|download|archive|launch]";

/// App-scoped sub-commands
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AppCommand {
    List,
    Select(String),
    Info,
    Decrypt,
    /// The main binary as it is, without decrypting it
    Download,
    Archive,
    Launch,
}

/// Everything the operator can ask for
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Install(Tool),
    Screenshot,
    App(AppCommand),
    Help,
    Exit,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandError {
    /// Nothing was typed
    Empty,
    /// A known command with a missing or unknown sub-verb
    Usage(&'static str),
    /// A verb this tool does not offer
    NotSupported(String),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Empty => Ok(()),
            CommandError::Usage(usage) => f.write_str(usage),
            CommandError::NotSupported(verb) => {
                write!(f, "Command {verb} is not supported for a device.")
            }
        }
    }
}

impl std::error::Error for CommandError {}

impl Command {
    /// Parses one line of operator input
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let mut tokens = line.split_whitespace();
        let verb = tokens.next().ok_or(CommandError::Empty)?;

        match verb {
            "install" => tokens
                .next()
                .and_then(|t| t.parse::<Tool>().ok())
                .map(Command::Install)
                .ok_or(CommandError::Usage(INSTALL_USAGE)),
            "screenshot" => Ok(Command::Screenshot),
            "app" => {
                let sub = match tokens.next() {
                    Some("list") => AppCommand::List,
                    Some("select") => match tokens.next() {
                        Some(id) => AppCommand::Select(id.to_string()),
                        None => return Err(CommandError::Usage(APP_USAGE)),
                    },
                    Some("info") => AppCommand::Info,
                    Some("decrypt") => AppCommand::Decrypt,
                    Some("download") => AppCommand::Download,
                    Some("archive") => AppCommand::Archive,
                    Some("launch") => AppCommand::Launch,
                    _ => return Err(CommandError::Usage(APP_USAGE)),
                };
                Ok(Command::App(sub))
            }
            "help" | "?" => Ok(Command::Help),
            "exit" | "quit" => Ok(Command::Exit),
            other => Err(CommandError::NotSupported(other.to_string())),
        }
    }

    /// One line per command, for `help`
    pub fn usage() -> Vec<&'static str> {
        vec![INSTALL_USAGE, "screenshot", APP_USAGE, "help", "exit"]
    }
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Command::parse(s)
    }
}
