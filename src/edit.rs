use crate::enums::Orientation;
use crate::error::{Error, Result};
use crate::history::{EditHistory, Snapshot};
use crate::progress::ProgressReporter;
use crate::raster::{self, Clipboard, Domain, MorphKind};
use crate::roi::RoiSet;
use crate::volume::Volume;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BrushShape {
    Disk,
    Sphere,
}

/// Whether an operator works on the displayed slice or the whole raster.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dim {
    TwoD,
    ThreeD,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlobOp {
    Copy,
    Cut,
    Paste,
    Remove,
    KeepOnly,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WholeOp {
    Erode,
    Dilate,
    Open,
    Close,
    SegmentForeground,
    SegmentBackground,
    Invert,
    Clear,
}

/// The currently enabled editing operator.
///
/// A tagged enum instead of one flag per operator: setting a new mode
/// replaces the previous one, so mutual exclusivity holds by construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditMode {
    Brush(BrushShape),
    /// Brush constrained to the intensity window.
    ThresholdBrush(BrushShape),
    BlobMorph(MorphKind, Dim),
    Blob(BlobOp, Dim),
    /// Keep only blob voxels inside the intensity window.
    BlobThreshold(Dim),
    FloodFill(Dim),
    RegionGrow(Dim),
    ConfidenceGrow(Dim),
    EuclideanExpand,
    EuclideanShrink,
    ActiveContour,
    Whole(WholeOp, Dim),
}

impl EditMode {
    /// Operators that can touch more than the displayed slice get a
    /// whole-volume undo snapshot.
    pub fn is_3d(self) -> bool {
        match self {
            EditMode::Brush(shape) | EditMode::ThresholdBrush(shape) => {
                shape == BrushShape::Sphere
            }
            EditMode::BlobMorph(_, dim)
            | EditMode::Blob(_, dim)
            | EditMode::BlobThreshold(dim)
            | EditMode::FloodFill(dim)
            | EditMode::RegionGrow(dim)
            | EditMode::ConfidenceGrow(dim)
            | EditMode::Whole(_, dim) => dim == Dim::ThreeD,
            EditMode::EuclideanExpand | EditMode::EuclideanShrink | EditMode::ActiveContour => {
                true
            }
        }
    }
}

/// Brush and operator parameters, mutated through validated setters.
#[derive(Clone, Debug)]
pub struct BrushSettings {
    radius: u32,
    pub morph_radius: u32,
    /// Intensity window for threshold-constrained operators.
    pub window: (f32, f32),
    pub confidence_multiplier: f32,
    pub confidence_iterations: u32,
    pub contour_iterations: u32,
    /// Euclidean expand/shrink distance, voxels.
    pub euclidean_radius: f32,
}

impl Default for BrushSettings {
    fn default() -> Self {
        Self {
            radius: 3,
            morph_radius: 1,
            window: (0.0, f32::MAX),
            confidence_multiplier: 2.5,
            confidence_iterations: 4,
            contour_iterations: 10,
            euclidean_radius: 2.0,
        }
    }
}

impl BrushSettings {
    pub fn radius(&self) -> u32 {
        self.radius
    }

    pub fn set_radius(&mut self, radius: u32) -> Result<()> {
        if radius == 0 {
            return Err(Error::InvalidBrushRadius(radius));
        }
        self.radius = radius;
        Ok(())
    }

    pub fn step_radius(&mut self, delta: i32) {
        let next = (self.radius as i64 + delta as i64).clamp(1, 128);
        self.radius = next as u32;
    }
}

struct Gesture {
    snapshot: Snapshot,
    changed: bool,
}

/// Routes a clicked/dragged voxel to exactly one enabled operator and
/// maintains the undo/redo log of the active ROI.
pub struct RasterDispatcher {
    mode: Option<EditMode>,
    pub settings: BrushSettings,
    history: EditHistory,
    clipboard: Option<Clipboard>,
    gesture: Option<Gesture>,
    last_identity: Option<u64>,
}

impl Default for RasterDispatcher {
    fn default() -> Self {
        Self {
            mode: None,
            settings: BrushSettings::default(),
            history: EditHistory::default(),
            clipboard: None,
            gesture: None,
            last_identity: None,
        }
    }
}

impl RasterDispatcher {
    pub fn mode(&self) -> Option<EditMode> {
        self.mode
    }

    /// Enable an operator, disabling whichever was active before.
    pub fn set_mode(&mut self, mode: Option<EditMode>) {
        self.mode = mode;
    }

    pub fn set_undo_enabled(&mut self, enabled: bool) {
        self.history.enabled = enabled;
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Stale snapshots referencing a different raster must never be applied:
    /// drop both stacks when the active ROI's identity changed.
    fn sync_identity(&mut self, rois: &RoiSet) {
        let identity = rois.active_identity();
        if identity != self.last_identity {
            self.history.clear();
            self.last_identity = identity;
        }
    }

    /// Capture the pre-edit snapshot of a starting gesture.
    pub fn begin_gesture(
        &mut self,
        rois: &RoiSet,
        orientation: Orientation,
        slice_index: usize,
    ) -> Result<()> {
        self.sync_identity(rois);
        let Some(mode) = self.mode else {
            return Ok(());
        };
        let roi = rois.active()?;
        let snapshot = if mode.is_3d() {
            Snapshot::capture_volume(roi)
        } else {
            Snapshot::capture_slice(roi, orientation, slice_index)
        };
        self.gesture = Some(Gesture {
            snapshot,
            changed: false,
        });
        Ok(())
    }

    /// Push one undo entry if the completed gesture changed the raster.
    pub fn end_gesture(&mut self, rois: &RoiSet) {
        self.sync_identity(rois);
        if let Some(gesture) = self.gesture.take() {
            if gesture.changed {
                self.history.push(gesture.snapshot);
            }
        }
    }

    /// Invoke exactly the operator matching the enabled mode at a voxel.
    ///
    /// 2D operators receive the through-plane slice index, 3D operators do
    /// not. Degenerate outcomes ("no blob at seed") are logged no-ops.
    pub fn apply(
        &mut self,
        rois: &mut RoiSet,
        volume: &Volume,
        voxel: [usize; 3],
        orientation: Orientation,
        slice_index: usize,
        progress: &mut dyn ProgressReporter,
    ) -> Result<bool> {
        self.sync_identity(rois);
        let Some(mode) = self.mode else {
            return Ok(false);
        };
        let one_shot = self.gesture.is_none();
        if one_shot {
            self.begin_gesture(rois, orientation, slice_index)?;
        }

        let settings = self.settings.clone();
        let domain = |dim: Dim| match dim {
            Dim::TwoD => Domain::Slice(orientation, slice_index),
            Dim::ThreeD => Domain::Volume,
        };

        let mut clipboard_update = None;
        let changed = {
            let roi = rois.active_mut()?;
            match mode {
                EditMode::Brush(BrushShape::Disk) => raster::stamp_disk(
                    roi,
                    orientation,
                    slice_index,
                    voxel,
                    settings.radius(),
                    false,
                ),
                EditMode::Brush(BrushShape::Sphere) => {
                    raster::stamp_sphere(roi, voxel, settings.radius(), false)
                }
                EditMode::ThresholdBrush(BrushShape::Disk) => raster::stamp_disk_threshold(
                    roi,
                    volume,
                    orientation,
                    slice_index,
                    voxel,
                    settings.radius(),
                    settings.window,
                    false,
                ),
                EditMode::ThresholdBrush(BrushShape::Sphere) => raster::stamp_sphere_threshold(
                    roi,
                    volume,
                    voxel,
                    settings.radius(),
                    settings.window,
                    false,
                ),
                EditMode::BlobMorph(kind, dim) => raster::morph_blob(
                    roi,
                    domain(dim),
                    voxel,
                    kind,
                    settings.morph_radius as usize,
                ),
                EditMode::Blob(BlobOp::Copy, dim) => {
                    clipboard_update = raster::blob_copy(roi, domain(dim), voxel, false);
                    false
                }
                EditMode::Blob(BlobOp::Cut, dim) => {
                    clipboard_update = raster::blob_copy(roi, domain(dim), voxel, true);
                    clipboard_update.is_some()
                }
                EditMode::Blob(BlobOp::Paste, dim) => match &self.clipboard {
                    Some(clipboard) => raster::blob_paste(roi, clipboard, domain(dim)),
                    None => false,
                },
                EditMode::Blob(BlobOp::Remove, dim) => {
                    raster::blob_remove(roi, domain(dim), voxel)
                }
                EditMode::Blob(BlobOp::KeepOnly, dim) => {
                    raster::blob_keep_only(roi, domain(dim), voxel)
                }
                EditMode::BlobThreshold(dim) => raster::blob_interior_threshold(
                    roi,
                    volume,
                    domain(dim),
                    voxel,
                    settings.window,
                ),
                EditMode::FloodFill(dim) => raster::flood_fill(roi, domain(dim), voxel),
                EditMode::RegionGrow(dim) => {
                    raster::region_grow(roi, volume, domain(dim), voxel, settings.window)
                }
                EditMode::ConfidenceGrow(dim) => raster::confidence_grow(
                    roi,
                    volume,
                    domain(dim),
                    voxel,
                    settings.confidence_multiplier,
                    settings.confidence_iterations,
                    progress,
                ),
                EditMode::EuclideanExpand => {
                    raster::euclidean_expand(roi, voxel, settings.euclidean_radius)
                }
                EditMode::EuclideanShrink => {
                    raster::euclidean_shrink(roi, voxel, settings.euclidean_radius)
                }
                EditMode::ActiveContour => raster::active_contour(
                    roi,
                    volume,
                    voxel,
                    settings.contour_iterations,
                    progress,
                ),
                EditMode::Whole(op, dim) => match op {
                    WholeOp::Erode => raster::morph_whole(
                        roi,
                        domain(dim),
                        MorphKind::Erode,
                        settings.morph_radius as usize,
                    ),
                    WholeOp::Dilate => raster::morph_whole(
                        roi,
                        domain(dim),
                        MorphKind::Dilate,
                        settings.morph_radius as usize,
                    ),
                    WholeOp::Open => raster::morph_whole(
                        roi,
                        domain(dim),
                        MorphKind::Open,
                        settings.morph_radius as usize,
                    ),
                    WholeOp::Close => raster::morph_whole(
                        roi,
                        domain(dim),
                        MorphKind::Close,
                        settings.morph_radius as usize,
                    ),
                    WholeOp::SegmentForeground => {
                        raster::segment_foreground(roi, volume, domain(dim))
                    }
                    WholeOp::SegmentBackground => {
                        raster::segment_background(roi, volume, domain(dim))
                    }
                    WholeOp::Invert => raster::invert(roi, domain(dim)),
                    WholeOp::Clear => raster::clear(roi, domain(dim)),
                },
            }
        };

        if let Some(clipboard) = clipboard_update {
            self.clipboard = Some(clipboard);
        }
        if !changed && matches!(mode, EditMode::Blob(..) | EditMode::FloodFill(_)) {
            log::warn!("{mode:?} at {voxel:?}: nothing to do");
        }
        if let Some(gesture) = &mut self.gesture {
            gesture.changed |= changed;
        }
        if one_shot {
            self.end_gesture(rois);
        }
        Ok(changed)
    }

    pub fn undo(&mut self, rois: &mut RoiSet) -> Result<bool> {
        self.sync_identity(rois);
        let roi = rois.active_mut()?;
        Ok(self.history.undo(roi))
    }

    pub fn redo(&mut self, rois: &mut RoiSet) -> Result<bool> {
        self.sync_identity(rois);
        let roi = rois.active_mut()?;
        Ok(self.history.redo(roi))
    }
}
