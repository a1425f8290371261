use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use ndarray::{Array3, ArrayView2, s};

use crate::enums::Orientation;
use crate::render::LookupTable;
use crate::transform::Transform;

static NEXT_VOLUME_ID: AtomicU64 = AtomicU64::new(1);

/// Session-unique identity of a volume, used to key reference-frame links.
pub type VolumeId = u64;

/// Statistical-map kind carried by an acquisition descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatMapKind {
    TStatistic,
    ZStatistic,
    PValue,
    Correlation,
}

/// Optional acquisition metadata attached to a volume.
#[derive(Clone, Debug, Default)]
pub struct Acquisition {
    pub unit: Option<String>,
    pub label_map: Option<HashMap<u16, String>>,
    pub stat_map: Option<StatMapKind>,
    pub degrees_of_freedom: Option<u32>,
}

/// 3D scalar grid, immutable during display.
///
/// Data is stored `[z, y, x]` (depth, height, width); the public voxel
/// coordinate order everywhere else in the crate is `(x, y, z)`. Spacing is
/// mm per voxel, origin the world position of voxel (0, 0, 0).
pub struct Volume {
    id: VolumeId,
    data: Array3<f32>,
    spacing: [f32; 3],
    origin: [f32; 3],
    pub lut: LookupTable,
    pub acquisition: Option<Acquisition>,
    links: HashMap<VolumeId, Transform>,
}

impl Volume {
    pub fn new(data: Array3<f32>, spacing: [f32; 3]) -> Self {
        let lut = LookupTable::from_data(&data);
        Self {
            id: NEXT_VOLUME_ID.fetch_add(1, Ordering::Relaxed),
            data,
            spacing,
            origin: [0.0; 3],
            lut,
            acquisition: None,
            links: HashMap::new(),
        }
    }

    pub fn with_origin(mut self, origin: [f32; 3]) -> Self {
        self.origin = origin;
        self
    }

    pub fn id(&self) -> VolumeId {
        self.id
    }

    /// Dimensions in storage order (depth, height, width).
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    /// Voxel counts in coordinate order (x, y, z).
    pub fn size(&self) -> [usize; 3] {
        let (d, h, w) = self.data.dim();
        [w, h, d]
    }

    pub fn spacing(&self) -> [f32; 3] {
        self.spacing
    }

    pub fn origin(&self) -> [f32; 3] {
        self.origin
    }

    pub fn is_default_origin(&self) -> bool {
        self.origin.iter().all(|o| o.abs() < 1e-6)
    }

    /// Physical extent per axis: `size * spacing`.
    pub fn field_of_view(&self) -> [f32; 3] {
        let size = self.size();
        [
            size[0] as f32 * self.spacing[0],
            size[1] as f32 * self.spacing[1],
            size[2] as f32 * self.spacing[2],
        ]
    }

    pub fn has_same_field_of_view(&self, other: &Volume) -> bool {
        let a = self.field_of_view();
        let b = other.field_of_view();
        a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() < 1e-3)
    }

    /// Geometric center of the field of view in world coordinates.
    pub fn get_center(&self) -> [f32; 3] {
        let fov = self.field_of_view();
        [
            self.origin[0] + fov[0] / 2.0,
            self.origin[1] + fov[1] / 2.0,
            self.origin[2] + fov[2] / 2.0,
        ]
    }

    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Array3<f32> {
        &mut self.data
    }

    /// Scalar at a voxel coordinate (x, y, z), bounds-checked.
    pub fn value_at(&self, voxel: [usize; 3]) -> Option<f32> {
        self.data.get([voxel[2], voxel[1], voxel[0]]).copied()
    }

    /// Scalar at a world point, after rounding to the nearest voxel.
    pub fn value_at_world(&self, world: [f32; 3]) -> Option<f32> {
        let v = self.world_to_voxel_continuous(world);
        if v.iter().any(|c| *c < -0.5) {
            return None;
        }
        self.value_at([
            v[0].round() as usize,
            v[1].round() as usize,
            v[2].round() as usize,
        ])
    }

    pub fn voxel_to_world(&self, voxel: [f32; 3]) -> [f32; 3] {
        [
            self.origin[0] + voxel[0] * self.spacing[0],
            self.origin[1] + voxel[1] * self.spacing[1],
            self.origin[2] + voxel[2] * self.spacing[2],
        ]
    }

    pub fn world_to_voxel_continuous(&self, world: [f32; 3]) -> [f32; 3] {
        [
            (world[0] - self.origin[0]) / self.spacing[0],
            (world[1] - self.origin[1]) / self.spacing[1],
            (world[2] - self.origin[2]) / self.spacing[2],
        ]
    }

    /// Axis-aligned slice at `index` along the through-plane axis of the
    /// given orientation.
    pub fn get_slice_from_axis(
        &self,
        index: usize,
        orientation: Orientation,
    ) -> Option<ArrayView2<'_, f32>> {
        if !self.is_valid_index(index, orientation) {
            return None;
        }
        let slice = match orientation {
            Orientation::Axial => self.data.slice(s![index, .., ..]),
            Orientation::Coronal => self.data.slice(s![.., index, ..]),
            Orientation::Sagittal => self.data.slice(s![.., .., index]),
        };
        Some(slice)
    }

    pub fn is_valid_index(&self, index: usize, orientation: Orientation) -> bool {
        index < self.size()[orientation.through_axis()]
    }

    /// Number of slices along the through-plane axis of an orientation.
    pub fn slice_count(&self, orientation: Orientation) -> usize {
        self.size()[orientation.through_axis()]
    }

    pub fn set_transform(&mut self, id: VolumeId, transform: Transform) {
        let _ = self.links.insert(id, transform);
    }

    pub fn get_transform_from_id(&self, id: VolumeId) -> Option<&Transform> {
        self.links.get(&id)
    }

    pub fn has_transform(&self, id: VolumeId) -> bool {
        self.links.contains_key(&id)
    }
}
