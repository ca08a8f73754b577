//! `stream` handler: print multipart events as they arrive.

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use isapi_api::{Client, EventStream, RequestOptions, ReturnType};

use crate::cli::{GlobalOpts, StreamArgs};
use crate::error::CliError;
use crate::output;

pub async fn handle(args: StreamArgs, client: &Client, global: &GlobalOpts) -> Result<(), CliError> {
    let mut options = RequestOptions::get()
        .return_type(ReturnType::Stream)
        .present(output::presentation(global.output));
    if let Some(count) = args.count {
        options = options.max_events(count);
    }

    let handle = client.at(&args.path);
    info!(path = %handle, "following event stream");
    let events = handle
        .invoke(options)
        .await?
        .into_events()
        .ok_or_else(|| CliError::Validation {
            field: "path".into(),
            reason: "device did not answer with an event stream".into(),
        })?;

    print_events(events, global).await
}

/// Print events until the stream ends, the limit is hit, or Ctrl-C.
pub async fn print_events(events: EventStream, global: &GlobalOpts) -> Result<(), CliError> {
    let token = CancellationToken::new();
    let interrupt = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    let mut events = events.cancel_on(token.clone());
    let mut seen = 0usize;
    while let Some(event) = events.next().await {
        let rendered = output::render(global.output, event?)?;
        output::print_output(&rendered, global.quiet);
        seen += 1;
    }

    debug!(events = seen, interrupted = token.is_cancelled(), "event stream closed");
    Ok(())
}
