//! Best-effort attribution of outbound calls.
//!
//! A [`CallSite`] is assembled from the task-local origin frames and,
//! optionally, a captured backtrace. It is a guess, not an identity:
//! anonymous futures and inlined frames can hide the real caller.

use std::backtrace::Backtrace;

use serde::{Deserialize, Serialize};
use warden_core::current_origins;

/// Frames from these crates never name a caller.
const RUNTIME_FRAME_PREFIXES: &[&str] = &[
    "std::",
    "core::",
    "alloc::",
    "tokio::",
    "futures_util::",
    "futures_core::",
    "async_trait::",
    "warden_guard::",
    "<",
    "__rust",
    "_start",
    "main",
];

/// Where an outbound call came from, as far as we can tell.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSite {
    /// Origin frames, outermost first
    pub origins: Vec<String>,
    /// Symbolised backtrace frames, innermost first, runtime frames removed
    pub frames: Vec<String>,
}

impl CallSite {
    /// Capture the current call site. Backtrace capture is slow; only ask
    /// for it when origin frames are not enough.
    pub fn capture(inspect_backtrace: bool) -> Self {
        let frames = if inspect_backtrace {
            parse_backtrace(&Backtrace::force_capture().to_string())
        } else {
            Vec::new()
        };
        Self {
            origins: current_origins(),
            frames,
        }
    }

    pub fn from_origins(origins: Vec<String>) -> Self {
        Self {
            origins,
            frames: Vec::new(),
        }
    }

    /// True when any origin or frame contains one of `allowed`.
    pub fn matches_any(&self, allowed: &[String]) -> bool {
        self.origins
            .iter()
            .chain(self.frames.iter())
            .any(|frame| allowed.iter().any(|a| frame.contains(a.as_str())))
    }

    /// Innermost origin frame, else the innermost application frame.
    pub fn caller(&self) -> String {
        self.origins
            .last()
            .or_else(|| self.frames.first())
            .cloned()
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// Extract function names from a `std::backtrace::Backtrace` rendering.
///
/// Frame lines look like `  12: crate::module::function`; `at file:line`
/// lines and runtime frames are dropped. Symbol hashes are trimmed.
pub fn parse_backtrace(rendered: &str) -> Vec<String> {
    rendered
        .lines()
        .filter_map(|line| {
            let (index, symbol) = line.trim().split_once(": ")?;
            if index.is_empty() || !index.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            let symbol = strip_hash(symbol.trim());
            if symbol.is_empty()
                || RUNTIME_FRAME_PREFIXES
                    .iter()
                    .any(|prefix| symbol.starts_with(prefix))
            {
                return None;
            }
            Some(symbol.to_string())
        })
        .collect()
}

fn strip_hash(symbol: &str) -> &str {
    match symbol.rsplit_once("::h") {
        Some((head, hash)) if hash.len() == 16 && hash.chars().all(|c| c.is_ascii_hexdigit()) => {
            head
        }
        _ => symbol,
    }
}
