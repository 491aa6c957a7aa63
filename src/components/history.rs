use egui::Pos2;
use image::Rgba;
use std::collections::VecDeque;
use std::fmt;

use crate::ops::strokes::Ink;
use crate::raster::Raster;

/// Retained operations. Older entries are evicted, together with their
/// checkpoints, once the window is full.
pub const HISTORY_WINDOW: usize = 10;

// ============================================================================
// OPERATIONS
// ============================================================================

/// One atomic drawing action, replayable onto a raster.
#[derive(Clone, Debug, PartialEq)]
pub enum Operation {
    /// Polyline in image space. `is_first` mirrors the owning entry's flag.
    Stroke {
        ink: Ink,
        width: f32,
        points: Vec<Pos2>,
        is_first: bool,
    },
    ScanlineFill { color: Rgba<u8>, seed: (i64, i64) },
    /// Paint-fill result blitted with its top-left corner at `anchor`.
    PaintFillPatch { anchor: (i64, i64), result: Raster },
}

impl Operation {
    pub fn stroke(ink: Ink, width: f32, start: Pos2) -> Self {
        Operation::Stroke {
            ink,
            width,
            points: vec![start],
            is_first: false,
        }
    }

    pub fn description(&self) -> String {
        match self {
            Operation::Stroke { ink: Ink::Erase, points, .. } => {
                format!("Erase ({} points)", points.len())
            }
            Operation::Stroke { points, .. } => format!("Stroke ({} points)", points.len()),
            Operation::ScanlineFill { seed, .. } => format!("Fill at ({}, {})", seed.0, seed.1),
            Operation::PaintFillPatch { anchor, result } => format!(
                "Paint fill {}x{} at ({}, {})",
                result.width(),
                result.height(),
                anchor.0,
                anchor.1
            ),
        }
    }

    pub fn memory_size(&self) -> usize {
        match self {
            Operation::Stroke { points, .. } => points.len() * std::mem::size_of::<Pos2>(),
            Operation::ScanlineFill { .. } => 0,
            Operation::PaintFillPatch { result, .. } => result.memory_bytes(),
        }
    }
}

/// An operation plus the raster snapshot taken right after it was drawn.
#[derive(Clone, Debug)]
pub struct HistoryEntry {
    pub op: Operation,
    checkpoint: Option<Raster>,
    is_first: bool,
}

impl HistoryEntry {
    pub fn checkpoint(&self) -> Option<&Raster> {
        self.checkpoint.as_ref()
    }

    /// `true` when the history was empty at the moment this entry was added.
    pub fn is_first(&self) -> bool {
        self.is_first
    }
}

// ============================================================================
// ERRORS / OUTCOMES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryError {
    /// The entry that should become current has no snapshot to restore.
    MissingCheckpoint { index: usize },
}

impl fmt::Display for HistoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryError::MissingCheckpoint { index } => {
                write!(f, "history entry {} has no checkpoint to restore", index)
            }
        }
    }
}

impl std::error::Error for HistoryError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndoOutcome {
    /// Nothing was undone.
    Ignored,
    /// The raster was restored from the new last entry's checkpoint.
    Restored,
    /// The history is now empty; the raster was cleared and needs a full
    /// render to bring the base image back.
    Cleared,
}

// ============================================================================
// HISTORY
// ============================================================================

/// Append-only operation log with checkpointed undo.
pub struct History {
    entries: VecDeque<HistoryEntry>,
    max_history_size: usize,
    /// Set by every mutation; drives the save-state indicator.
    dirty: bool,
}

impl Default for History {
    fn default() -> Self {
        Self::new(HISTORY_WINDOW)
    }
}

impl History {
    pub fn new(max_history_size: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(max_history_size + 1),
            max_history_size: max_history_size.max(1),
            dirty: false,
        }
    }

    /// Snapshot `raster` into the current last entry, trim the window, then
    /// push `op` without a checkpoint of its own.
    pub fn append(&mut self, mut op: Operation, raster: &Raster) {
        let is_first = self.entries.is_empty();
        if let Operation::Stroke { is_first: flag, .. } = &mut op {
            *flag = is_first;
        }

        if let Some(last) = self.entries.back_mut() {
            last.checkpoint = Some(raster.clone());
        }
        self.prune();

        self.entries.push_back(HistoryEntry {
            op,
            checkpoint: None,
            is_first,
        });
        self.dirty = true;
    }

    /// Drop the oldest entries so one more fits. The just-checkpointed last
    /// entry is never dropped.
    fn prune(&mut self) {
        while self.entries.len() >= self.max_history_size && self.entries.len() > 1 {
            if let Some(evicted) = self.entries.pop_front() {
                crate::log_info!(
                    "history: evicted '{}' (checkpoint {} bytes)",
                    evicted.op.description(),
                    evicted.checkpoint.as_ref().map_or(0, Raster::memory_bytes)
                );
            }
        }
    }

    /// Add a point to the in-progress stroke. Returns `false` when the last
    /// entry is not a stroke.
    pub fn extend_last_stroke(&mut self, point: Pos2) -> bool {
        match self.entries.back_mut() {
            Some(HistoryEntry {
                op: Operation::Stroke { points, .. },
                ..
            }) => {
                points.push(point);
                self.dirty = true;
                true
            }
            _ => false,
        }
    }

    /// Remove the last operation and restore `raster` to the state right
    /// after the operation before it.
    ///
    /// A lone entry that was not the first one ever appended is kept: the
    /// state before it was evicted from the window.
    pub fn undo(&mut self, raster: &mut Raster) -> Result<UndoOutcome, HistoryError> {
        let len = self.entries.len();
        if len == 0 {
            return Ok(UndoOutcome::Ignored);
        }
        if len == 1 && !self.entries[0].is_first {
            crate::log_info!("history: undo ignored, earlier state is outside the window");
            return Ok(UndoOutcome::Ignored);
        }

        if len >= 2 && self.entries[len - 2].checkpoint.is_none() {
            return Err(HistoryError::MissingCheckpoint { index: len - 2 });
        }

        let removed = self.entries.pop_back();
        self.dirty = true;
        if let Some(removed) = &removed {
            crate::log_info!("history: undo '{}'", removed.op.description());
        }

        match self.entries.back().and_then(|e| e.checkpoint.as_ref()) {
            Some(checkpoint) => {
                *raster = checkpoint.clone();
                Ok(UndoOutcome::Restored)
            }
            None => {
                raster.clear();
                Ok(UndoOutcome::Cleared)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&Operation> {
        self.entries.back().map(|e| &e.op)
    }

    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// Operations in append order.
    pub fn iter(&self) -> impl Iterator<Item = &Operation> {
        self.entries.iter().map(|e| &e.op)
    }

    pub fn can_undo(&self) -> bool {
        match self.entries.len() {
            0 => false,
            1 => self.entries[0].is_first,
            _ => true,
        }
    }

    /// Bytes held by checkpoints and operation payloads.
    pub fn memory_usage(&self) -> usize {
        self.entries
            .iter()
            .map(|e| e.op.memory_size() + e.checkpoint.as_ref().map_or(0, Raster::memory_bytes))
            .sum()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.dirty = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

    fn fill(seed: i64) -> Operation {
        Operation::ScanlineFill {
            color: RED,
            seed: (seed, 0),
        }
    }

    /// Raster whose pixel (0,0) encodes `n`, standing in for "state after n ops".
    fn state(n: u8) -> Raster {
        let mut r = Raster::new(2, 2);
        r.put_pixel(0, 0, Rgba([n, 0, 0, 255]));
        r
    }

    /// Append `count` ops, each "rendered" by replacing the raster.
    fn build(count: u8) -> (History, Raster) {
        let mut history = History::default();
        let mut raster = state(0);
        for n in 1..=count {
            history.append(fill(n as i64), &raster);
            raster = state(n);
        }
        (history, raster)
    }

    #[test]
    fn append_then_undo_restores_prior_raster() {
        let (mut history, before) = build(3);
        history.append(fill(99), &before);
        let mut raster = state(42);
        assert_eq!(history.undo(&mut raster), Ok(UndoOutcome::Restored));
        assert_eq!(raster, before);
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn only_last_entry_lacks_checkpoint() {
        let (history, _) = build(4);
        let with_cp: Vec<bool> = history.entries().map(|e| e.checkpoint().is_some()).collect();
        assert_eq!(with_cp, vec![true, true, true, false]);
    }

    #[test]
    fn first_stroke_is_flagged() {
        let mut history = History::default();
        let r = Raster::new(2, 2);
        history.append(Operation::stroke(Ink::Color(RED), 2.0, Pos2::ZERO), &r);
        history.append(Operation::stroke(Ink::Erase, 2.0, Pos2::ZERO), &r);
        let flags: Vec<bool> = history
            .iter()
            .map(|op| match op {
                Operation::Stroke { is_first, .. } => *is_first,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(flags, vec![true, false]);
    }

    #[test]
    fn undo_of_only_first_entry_clears() {
        let (mut history, mut raster) = build(1);
        assert!(history.can_undo());
        assert_eq!(history.undo(&mut raster), Ok(UndoOutcome::Cleared));
        assert!(history.is_empty());
        assert_eq!(raster, Raster::new(2, 2));
        assert_eq!(history.undo(&mut raster), Ok(UndoOutcome::Ignored));
    }

    #[test]
    fn window_is_bounded() {
        let (history, _) = build(25);
        assert_eq!(history.len(), HISTORY_WINDOW);
        let seeds: Vec<i64> = history
            .iter()
            .map(|op| match op {
                Operation::ScanlineFill { seed, .. } => seed.0,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(seeds, (16..=25).collect::<Vec<_>>());
    }

    #[test]
    fn undo_stops_at_window_edge() {
        let (mut history, mut raster) = build(12);
        let mut restored = 0;
        loop {
            match history.undo(&mut raster) {
                Ok(UndoOutcome::Restored) => restored += 1,
                Ok(UndoOutcome::Ignored) => break,
                other => panic!("unexpected {:?}", other),
            }
        }
        assert_eq!(restored, HISTORY_WINDOW - 1);
        assert_eq!(history.len(), 1);
        assert!(!history.can_undo());
        // Oldest retained op is #3; its checkpoint is the state after it.
        assert_eq!(raster, state(3));
    }

    #[test]
    fn extend_last_stroke_only_touches_strokes() {
        let mut history = History::default();
        let r = Raster::new(2, 2);
        assert!(!history.extend_last_stroke(Pos2::new(1.0, 1.0)));
        history.append(fill(0), &r);
        assert!(!history.extend_last_stroke(Pos2::new(1.0, 1.0)));
        history.append(Operation::stroke(Ink::Color(RED), 1.0, Pos2::ZERO), &r);
        assert!(history.extend_last_stroke(Pos2::new(1.0, 1.0)));
        match history.last() {
            Some(Operation::Stroke { points, .. }) => assert_eq!(points.len(), 2),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn memory_usage_counts_checkpoints() {
        let (history, _) = build(3);
        // Two checkpoints of a 2x2 RGBA raster.
        assert_eq!(history.memory_usage(), 2 * 16);
    }

    #[test]
    fn mutations_mark_dirty() {
        let (mut history, mut raster) = build(2);
        assert!(history.is_dirty());
        history.mark_clean();
        history.undo(&mut raster).unwrap();
        assert!(history.is_dirty());
    }
}
