// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Optional per-fiber stack-trace recording (spec §4.7), gated by
//! [`crate::FibraConfig::trace_recording`]. Off by default: capturing a
//! backtrace on every pending `Promise` is not free.

use std::backtrace::Backtrace;

/// One recorded call-site, captured when a `Promise` guarded by a fiber
/// with trace recording on was constructed.
#[derive(Debug)]
pub struct TraceFrame {
    pub(crate) backtrace: Backtrace,
}

impl TraceFrame {
    #[must_use]
    pub fn capture() -> Self {
        Self {
            backtrace: Backtrace::capture(),
        }
    }
}

impl std::fmt::Display for TraceFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.backtrace)
    }
}

/// Snapshot a fiber's recorded frames, most-recent-first, de-duplicating
/// adjacent frames that render identically (spec §4.7's
/// `Fiber.getStackTrace()`). Slots already popped (`None`, a promise that
/// has since settled) are skipped rather than rendered.
#[must_use]
pub fn snapshot(slots: &[Option<TraceFrame>]) -> Vec<String> {
    let mut rendered: Vec<String> = slots.iter().rev().flatten().map(ToString::to_string).collect();
    rendered.dedup();
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn popped_slots_are_skipped() {
        let slots = vec![Some(TraceFrame::capture()), None, Some(TraceFrame::capture())];
        assert_eq!(snapshot(&slots).len(), 2);
    }

    #[test]
    fn empty_stack_snapshots_empty() {
        let slots: Vec<Option<TraceFrame>> = Vec::new();
        assert!(snapshot(&slots).is_empty());
    }
}
