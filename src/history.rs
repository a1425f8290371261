use std::collections::VecDeque;

use ndarray::{Array2, Array3};

use crate::enums::Orientation;
use crate::roi::Roi;

/// Snapshot sufficient to restore either one 2D slice or the full 3D raster
/// of the active ROI.
#[derive(Clone, Debug, PartialEq)]
pub enum Snapshot {
    Slice {
        orientation: Orientation,
        index: usize,
        data: Array2<u8>,
    },
    Volume {
        data: Array3<u8>,
    },
}

impl Snapshot {
    pub fn capture_slice(roi: &Roi, orientation: Orientation, index: usize) -> Self {
        Snapshot::Slice {
            orientation,
            index,
            data: roi.slice(orientation, index).to_owned(),
        }
    }

    pub fn capture_volume(roi: &Roi) -> Self {
        Snapshot::Volume {
            data: roi.data.clone(),
        }
    }

    /// Snapshot of the current raster at the same granularity as `self`.
    pub fn capture_matching(&self, roi: &Roi) -> Self {
        match self {
            Snapshot::Slice {
                orientation, index, ..
            } => Self::capture_slice(roi, *orientation, *index),
            Snapshot::Volume { .. } => Self::capture_volume(roi),
        }
    }

    pub fn restore(&self, roi: &mut Roi) {
        match self {
            Snapshot::Slice {
                orientation,
                index,
                data,
            } => roi.slice_mut(*orientation, *index).assign(data),
            Snapshot::Volume { data } => roi.data.assign(data),
        }
    }
}

const DEFAULT_CAPACITY: usize = 32;

/// Undo/redo LIFO over ROI snapshots.
///
/// Slice and volume snapshots coexist on one stack in completion order; the
/// stacks are cleared by the dispatcher whenever the active ROI changes
/// identity. The oldest entries are dropped once the capacity is reached.
pub struct EditHistory {
    undo: VecDeque<Snapshot>,
    redo: Vec<Snapshot>,
    pub enabled: bool,
    capacity: usize,
}

impl Default for EditHistory {
    fn default() -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            enabled: true,
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl EditHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            ..Self::default()
        }
    }

    /// Record a pre-edit snapshot. Any pending redo entries become
    /// unreachable and are dropped.
    pub fn push(&mut self, snapshot: Snapshot) {
        if !self.enabled {
            return;
        }
        self.redo.clear();
        if self.undo.len() == self.capacity {
            let _ = self.undo.pop_front();
        }
        self.undo.push_back(snapshot);
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Restore the most recent snapshot and stash the pre-undo state on the
    /// redo stack. Returns false when there is nothing to undo.
    pub fn undo(&mut self, roi: &mut Roi) -> bool {
        let Some(snapshot) = self.undo.pop_back() else {
            return false;
        };
        self.redo.push(snapshot.capture_matching(roi));
        snapshot.restore(roi);
        true
    }

    /// Mirror of [`undo`](Self::undo).
    pub fn redo(&mut self, roi: &mut Roi) -> bool {
        let Some(snapshot) = self.redo.pop() else {
            return false;
        };
        if self.undo.len() == self.capacity {
            let _ = self.undo.pop_front();
        }
        self.undo.push_back(snapshot.capture_matching(roi));
        snapshot.restore(roi);
        true
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}
