//! Call provenance for outbound reads.
//!
//! Code entering a sanctioned data-access path wraps its future in
//! [`in_origin`], pushing a named frame onto a task-local stack. The access
//! guard reads that stack when an outbound call reaches the remote service.
//!
//! Frames only follow the future they were scoped around. Work handed to
//! `tokio::spawn` starts with an empty stack and must be wrapped again.
//! Treat the stack as a best-effort annotation, never as an identity.

use std::future::Future;

tokio::task_local! {
    static ORIGIN_FRAMES: Vec<String>;
}

/// Run `fut` with `origin` pushed onto the provenance stack.
pub async fn in_origin<F>(origin: impl Into<String>, fut: F) -> F::Output
where
    F: Future,
{
    let mut frames = current_origins();
    frames.push(origin.into());
    ORIGIN_FRAMES.scope(frames, fut).await
}

/// Snapshot of the provenance stack, outermost frame first.
pub fn current_origins() -> Vec<String> {
    ORIGIN_FRAMES
        .try_with(|frames| frames.clone())
        .unwrap_or_default()
}
