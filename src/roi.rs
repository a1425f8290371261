use std::sync::atomic::{AtomicU64, Ordering};

use ndarray::{Array3, ArrayView2, ArrayViewMut2, s};

use crate::enums::Orientation;
use crate::error::{Error, Result};
use crate::volume::Volume;

static NEXT_ROI_ID: AtomicU64 = AtomicU64::new(1);

/// Label raster co-registered with the reference volume: same size, spacing
/// and origin. Voxels are 0 (background) or a label value.
pub struct Roi {
    id: u64,
    pub name: String,
    pub data: Array3<u8>,
    pub color: [u8; 3],
    pub opacity: f32,
    pub visible: bool,
}

impl Roi {
    /// Empty raster matching the reference volume's grid.
    pub fn new(name: impl Into<String>, volume: &Volume) -> Self {
        Self {
            id: NEXT_ROI_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            data: Array3::zeros(volume.dim()),
            color: [255, 0, 0],
            opacity: 0.5,
            visible: true,
        }
    }

    /// Raster identity; a save-under-new-name or reload produces a new one.
    pub fn identity(&self) -> u64 {
        self.id
    }

    pub fn slice(&self, orientation: Orientation, index: usize) -> ArrayView2<'_, u8> {
        match orientation {
            Orientation::Axial => self.data.slice(s![index, .., ..]),
            Orientation::Coronal => self.data.slice(s![.., index, ..]),
            Orientation::Sagittal => self.data.slice(s![.., .., index]),
        }
    }

    pub fn slice_mut(&mut self, orientation: Orientation, index: usize) -> ArrayViewMut2<'_, u8> {
        match orientation {
            Orientation::Axial => self.data.slice_mut(s![index, .., ..]),
            Orientation::Coronal => self.data.slice_mut(s![.., index, ..]),
            Orientation::Sagittal => self.data.slice_mut(s![.., .., index]),
        }
    }
}

/// All ROIs of a session. Exactly one may be active (receiving edits) at a
/// time; all visible ones are blended for display. Names are unique.
#[derive(Default)]
pub struct RoiSet {
    rois: Vec<Roi>,
    active: Option<usize>,
}

impl RoiSet {
    pub fn add(&mut self, roi: Roi) -> Result<()> {
        if self.rois.iter().any(|existing| existing.name == roi.name) {
            return Err(Error::DuplicateRoiName(roi.name.clone()));
        }
        self.rois.push(roi);
        // a freshly added ROI becomes the active one
        self.active = Some(self.rois.len() - 1);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Result<Roi> {
        let index = self
            .rois
            .iter()
            .position(|roi| roi.name == name)
            .ok_or_else(|| Error::UnknownRoi(name.to_string()))?;
        let removed = self.rois.remove(index);
        self.active = match self.active {
            Some(active) if active == index => None,
            Some(active) if active > index => Some(active - 1),
            other => other,
        };
        Ok(removed)
    }

    pub fn set_active(&mut self, name: &str) -> Result<()> {
        let index = self
            .rois
            .iter()
            .position(|roi| roi.name == name)
            .ok_or_else(|| Error::UnknownRoi(name.to_string()))?;
        self.active = Some(index);
        Ok(())
    }

    pub fn active(&self) -> Result<&Roi> {
        self.active
            .and_then(|index| self.rois.get(index))
            .ok_or(Error::NoActiveRoi)
    }

    pub fn active_mut(&mut self) -> Result<&mut Roi> {
        match self.active {
            Some(index) => self.rois.get_mut(index).ok_or(Error::NoActiveRoi),
            None => Err(Error::NoActiveRoi),
        }
    }

    /// Identity of the active raster, if any. The dispatcher compares this
    /// across edits to know when to clear the undo/redo stacks.
    pub fn active_identity(&self) -> Option<u64> {
        self.active
            .and_then(|index| self.rois.get(index))
            .map(Roi::identity)
    }

    pub fn rename(&mut self, from: &str, to: impl Into<String>) -> Result<()> {
        let to = to.into();
        if self.rois.iter().any(|roi| roi.name == to) {
            return Err(Error::DuplicateRoiName(to));
        }
        let roi = self
            .rois
            .iter_mut()
            .find(|roi| roi.name == from)
            .ok_or_else(|| Error::UnknownRoi(from.to_string()))?;
        roi.name = to;
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Roi> {
        self.rois.iter()
    }

    pub fn len(&self) -> usize {
        self.rois.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rois.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn volume() -> Volume {
        Volume::new(Array3::zeros((8, 8, 8)), [1.0; 3])
    }

    #[test]
    fn names_are_unique() {
        let volume = volume();
        let mut set = RoiSet::default();
        set.add(Roi::new("lesion", &volume)).unwrap();
        assert!(matches!(
            set.add(Roi::new("lesion", &volume)),
            Err(Error::DuplicateRoiName(_))
        ));
    }

    #[test]
    fn newest_roi_becomes_active() {
        let volume = volume();
        let mut set = RoiSet::default();
        set.add(Roi::new("a", &volume)).unwrap();
        set.add(Roi::new("b", &volume)).unwrap();
        assert_eq!(set.active().unwrap().name, "b");
        set.set_active("a").unwrap();
        assert_eq!(set.active().unwrap().name, "a");
    }

    #[test]
    fn removing_the_active_roi_leaves_none_active() {
        let volume = volume();
        let mut set = RoiSet::default();
        set.add(Roi::new("a", &volume)).unwrap();
        set.remove("a").unwrap();
        assert!(matches!(set.active(), Err(Error::NoActiveRoi)));
        assert!(set.active_identity().is_none());
    }

    #[test]
    fn identity_changes_across_instances() {
        let volume = volume();
        let a = Roi::new("a", &volume);
        let b = Roi::new("b", &volume);
        assert_ne!(a.identity(), b.identity());
    }

    #[test]
    fn slice_views_address_the_right_axis() {
        let volume = volume();
        let mut roi = Roi::new("r", &volume);
        roi.data[[3, 2, 1]] = 1; // (x=1, y=2, z=3)
        assert_eq!(roi.slice(Orientation::Axial, 3)[[2, 1]], 1);
        assert_eq!(roi.slice(Orientation::Coronal, 2)[[3, 1]], 1);
        assert_eq!(roi.slice(Orientation::Sagittal, 1)[[3, 2]], 1);
    }
}
