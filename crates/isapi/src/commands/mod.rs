//! Command handlers that talk to a device.

pub mod config_cmd;
pub mod download;
pub mod request;
pub mod stream;

use isapi_api::Client;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Route a device command to its handler.
pub async fn dispatch(cmd: Command, client: &Client, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Get(args) => request::get(args, client, global).await,
        Command::Request(args) => request::handle(args, client, global).await,
        Command::Stream(args) => stream::handle(args, client, global).await,
        Command::Download(args) => download::handle(args, client, global).await,
        Command::Config(_) | Command::Completions(_) => Err(CliError::Validation {
            field: "command".into(),
            reason: "handled before connecting".into(),
        }),
    }
}
