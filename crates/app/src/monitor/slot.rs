//! Latest-wins handoff cell between the worker and presentation consumers.

use std::sync::{Arc, Mutex, PoisonError};

use crate::monitor::data::PipelineResult;

/// Capacity-1 result queue: `put` never blocks and displaces any unread
/// value; `get_nowait` consumes the slot. Cloned handles share the same cell,
/// so the slot is constructed once and handed to both sides by the embedding
/// code rather than living as a global.
#[derive(Clone, Default)]
pub struct ResultSlot {
    cell: Arc<Mutex<Option<PipelineResult>>>,
}

impl ResultSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `result`, displacing any unread predecessor. Returns whether a
    /// value was displaced.
    pub fn put(&self, result: PipelineResult) -> bool {
        // The cell is a plain Option; a poisoned lock cannot leave it
        // inconsistent.
        let mut guard = self.cell.lock().unwrap_or_else(PoisonError::into_inner);
        let displaced = guard.is_some();
        *guard = Some(result);
        displaced
    }

    /// Take the most recent unread result, if any.
    pub fn get_nowait(&self) -> Option<PipelineResult> {
        let mut guard = self.cell.lock().unwrap_or_else(PoisonError::into_inner);
        guard.take()
    }
}
