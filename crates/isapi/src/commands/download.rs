//! `download` handler: opaque GET written to a file.

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use isapi_api::Client;

use crate::cli::{DownloadArgs, GlobalOpts};
use crate::error::CliError;

pub async fn handle(args: DownloadArgs, client: &Client, global: &GlobalOpts) -> Result<(), CliError> {
    let mut chunks = client.at(&args.path).opaque().await?;
    debug!(content_type = ?chunks.content_type(), out = %args.out.display(), "downloading");

    let mut file = tokio::fs::File::create(&args.out).await?;
    let mut written = 0usize;
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len();
    }
    file.flush().await?;

    if !global.quiet {
        eprintln!("✓ Wrote {written} bytes to {}", args.out.display());
    }
    Ok(())
}
