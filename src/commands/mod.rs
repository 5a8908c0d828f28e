pub mod auth;
pub mod dashboard;
pub mod init;
pub mod issues;
pub mod report;
pub mod workers;

use std::io::{self, Write};

use serde_json::Value;

use crate::error::Result;
use crate::store::DataStore;

/// Print `label` and read one trimmed line from stdin.
pub(crate) fn prompt(label: &str) -> Result<String> {
    print!("{label}");
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

/// Subscribe to `path` and re-render on every snapshot until the stream
/// ends or Ctrl-C is pressed. The subscription is cancelled on exit.
pub(crate) async fn watch<F>(store: &dyn DataStore, path: &str, mut render: F) -> Result<()>
where
    F: FnMut(Value) -> Result<()>,
{
    let mut subscription = store.subscribe(path).await?;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                tracing::debug!(path, "interrupted");
                break;
            }
            next = subscription.next() => match next {
                Some(Ok(value)) => render(value)?,
                Some(Err(e)) => return Err(e),
                None => break,
            },
        }
    }
    subscription.cancel();
    Ok(())
}
