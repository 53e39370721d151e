// src/cancellation.rs

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::errors::{EngineError, EngineResult};

/// Fails fast when the caller already gave up.
pub fn ensure_not_cancelled(token: &CancellationToken) -> EngineResult<()> {
    if token.is_cancelled() {
        Err(EngineError::Cancelled)
    } else {
        Ok(())
    }
}

/// Races `future` against the token. Cancellation wins ties.
pub async fn run_cancellable<F, T>(token: &CancellationToken, future: F) -> EngineResult<T>
where
    F: Future<Output = T>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(EngineError::Cancelled),
        output = future => Ok(output),
    }
}
