//! Re-run a tool until its result changes.

use std::future::Future;
use std::time::Duration;

use proto::{ToolError, WATCH_FIELD};
use serde_json::Value;
use tracing::debug;

/// Removes the reserved `watch` field from call arguments.
///
/// Returns the remaining arguments and the polling interval when `watch`
/// is a positive number; zero or negative values disable watching.
pub fn split_watch(args: Value) -> Result<(Value, Option<Duration>), ToolError> {
    let Value::Object(mut map) = args else {
        return Ok((args, None));
    };
    let interval = match map.remove(WATCH_FIELD) {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => n
            .as_f64()
            .filter(|secs| secs.is_finite() && *secs > 0.0)
            .map(Duration::from_secs_f64),
        Some(_) => {
            return Err(ToolError::InvalidArgs(format!(
                "field '{WATCH_FIELD}' must be of type number"
            )));
        }
    };
    Ok((Value::Object(map), interval))
}

fn as_json(output: String) -> Value {
    serde_json::from_str(&output).unwrap_or(Value::String(output))
}

/// Calls `call` once for a baseline, then every `interval` until the result differs.
///
/// Returns `{"previous": .., "current": ..}`. There is no upper bound on the
/// number of checks; callers that need one should wrap this in a timeout.
pub async fn watch_until_changed<F, Fut>(interval: Duration, mut call: F) -> Result<String, ToolError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<String, ToolError>>,
{
    let previous = call().await?;
    let mut checks: u64 = 0;
    loop {
        tokio::time::sleep(interval).await;
        checks += 1;
        let current = call().await?;
        if current != previous {
            debug!(checks, "Watched result changed");
            let diff = serde_json::json!({
                "previous": as_json(previous),
                "current": as_json(current),
            });
            return Ok(diff.to_string());
        }
    }
}
