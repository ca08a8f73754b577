//! `get` and `request` handlers.

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;

use isapi_api::{Client, Method, Reply, RequestOptions, ReturnType};

use crate::cli::{GetArgs, GlobalOpts, RequestArgs, ReturnKind};
use crate::commands::stream::print_events;
use crate::error::CliError;
use crate::output;

pub async fn get(args: GetArgs, client: &Client, global: &GlobalOpts) -> Result<(), CliError> {
    let options = RequestOptions::get().present(output::presentation(global.output));
    let reply = client.at(&args.path).invoke(options).await?;
    print_reply(reply, global).await
}

pub async fn handle(args: RequestArgs, client: &Client, global: &GlobalOpts) -> Result<(), CliError> {
    let options = build_options(&args, global).await?;
    tracing::debug!(method = %args.method, path = %args.path, "issuing request");
    let reply = client.at(&args.path).invoke(options).await?;
    print_reply(reply, global).await
}

async fn build_options(args: &RequestArgs, global: &GlobalOpts) -> Result<RequestOptions, CliError> {
    let method = Method::from_bytes(args.method.to_ascii_uppercase().as_bytes()).map_err(|_| {
        CliError::Validation {
            field: "method".into(),
            reason: format!("'{}' is not an HTTP method", args.method),
        }
    })?;

    let mut options = RequestOptions::new(method)
        .present(output::presentation(global.output))
        .return_type(return_type(args.return_type));

    for (key, value) in &args.query {
        options = options.query(key, value);
    }
    for (name, value) in &args.headers {
        options = options.try_header(name, value)?;
    }

    if let Some(ref data) = args.data {
        options = options.body(data.clone());
    } else if let Some(ref path) = args.data_file {
        options = options.body(tokio::fs::read(path).await?);
    }

    if let Some(count) = args.count {
        options = options.max_events(count);
    }
    Ok(options)
}

fn return_type(kind: ReturnKind) -> ReturnType {
    match kind {
        ReturnKind::Buffered => ReturnType::Buffered,
        ReturnKind::Stream => ReturnType::Stream,
        ReturnKind::OpaqueData => ReturnType::OpaqueData,
    }
}

async fn print_reply(reply: Reply, global: &GlobalOpts) -> Result<(), CliError> {
    match reply {
        Reply::Body(body) => {
            output::print_output(&output::render(global.output, body)?, global.quiet);
            Ok(())
        }
        Reply::Events(events) => print_events(events, global).await,
        Reply::Opaque(mut chunks) => {
            let mut stdout = tokio::io::stdout();
            while let Some(chunk) = chunks.next().await {
                stdout.write_all(&chunk?).await?;
            }
            stdout.flush().await?;
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::cli::{Cli, Command};

    fn parse(argv: &[&str]) -> (RequestArgs, GlobalOpts) {
        let cli = Cli::try_parse_from(argv).unwrap();
        match cli.command {
            Command::Request(args) => (args, cli.global),
            other => panic!("expected request, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn request_flags_become_options() {
        let (args, global) = parse(&[
            "isapi",
            "request",
            "put",
            "System/time",
            "--data",
            "<Time/>",
            "--query",
            "format=json",
            "-H",
            "X-Trace: 7",
            "--type",
            "opaque_data",
        ]);
        let options = build_options(&args, &global).await.unwrap();
        assert_eq!(options.method, Some(Method::PUT));
        assert_eq!(options.return_type, ReturnType::OpaqueData);
        assert_eq!(options.transport.query, vec![("format".to_owned(), "json".to_owned())]);
        assert_eq!(options.transport.headers["x-trace"], "7");
        assert_eq!(options.transport.body.as_deref(), Some(b"<Time/>".as_slice()));
    }

    #[tokio::test]
    async fn bad_method_is_rejected() {
        let (args, global) = parse(&["isapi", "request", "GE T", "System/status"]);
        let err = build_options(&args, &global).await.unwrap_err();
        assert!(matches!(err, CliError::Validation { ref field, .. } if field == "method"));
    }
}
