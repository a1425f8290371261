use crate::enums::Orientation;
use crate::error::Result;
use crate::volume::Volume;

/// Distance from the focal point at which the camera sits along the plane
/// normal. Large enough that the whole field of view is always in front.
pub const CAMERA_DISTANCE: f32 = 1000.0;

/// Default clip factor `k`: the displayed slice thickness never exceeds
/// `2k` voxels regardless of zoom.
pub const DEFAULT_CLIP_FACTOR: f32 = 2.0;

/// Per-axis rotation sign applied to the crop/registration box actor.
///
/// The box intentionally rotates opposite to the reslice cursor on the x and
/// z axes so the geometric field-of-view box stays visually consistent with
/// the oriented 2D cursor. This is a convention, not a bug.
pub const BOX_ROTATION_SIGN: [f32; 3] = [-1.0, 1.0, -1.0];

/// Parallel-projection camera state of one view.
#[derive(Clone, Debug, PartialEq)]
pub struct Camera {
    pub position: [f32; 3],
    pub focal_point: [f32; 3],
    pub view_up: [f32; 3],
    /// Half the height of the viewport in world units.
    pub parallel_scale: f32,
    pub clipping_range: [f32; 2],
}

impl Camera {
    /// Camera centered on the volume, sized so the full in-plane field of
    /// view fits vertically.
    pub fn fitted(volume: &Volume, orientation: Orientation) -> Self {
        let (_, v_axis) = orientation.in_plane_axes();
        let fov = volume.field_of_view();
        Self {
            position: [0.0; 3],
            focal_point: volume.get_center(),
            view_up: orientation.view_up(),
            parallel_scale: fov[v_axis] / 2.0,
            clipping_range: [0.0, 1.0],
        }
    }
}

/// Owns a view's orientation state and derives the camera from it.
///
/// `plane_axes` permutes which principal plane of the stored data each
/// requested plane displays, so that "axial" keeps meaning the same displayed
/// content for volumes stored in a different native orientation.
#[derive(Clone, Debug)]
pub struct OrientationController {
    orientation: Orientation,
    plane_axes: [Orientation; 3],
    clip_factor: f32,
}

impl Default for OrientationController {
    fn default() -> Self {
        Self {
            orientation: Orientation::Axial,
            plane_axes: [
                Orientation::Axial,
                Orientation::Coronal,
                Orientation::Sagittal,
            ],
            clip_factor: DEFAULT_CLIP_FACTOR,
        }
    }
}

impl OrientationController {
    pub fn new(orientation: Orientation) -> Self {
        Self {
            orientation,
            ..Self::default()
        }
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Cutting plane actually sliced after the anatomy permutation.
    pub fn effective_orientation(&self) -> Orientation {
        self.plane_axes[self.orientation.index()]
    }

    pub fn clip_factor(&self) -> f32 {
        self.clip_factor
    }

    pub fn set_clip_factor(&mut self, factor: f32) {
        self.clip_factor = factor;
    }

    pub fn set_orientation(&mut self, orientation: Orientation) {
        self.orientation = orientation;
    }

    /// Orientation request by raw index; anything outside {0, 1, 2} is
    /// rejected without touching the state.
    pub fn set_orientation_index(&mut self, index: usize) -> Result<()> {
        self.orientation = Orientation::from_index(index)?;
        Ok(())
    }

    /// Permute the mapping between principal planes and the volume's native
    /// anatomical axes.
    pub fn cycle_anatomy(&mut self) {
        self.plane_axes.rotate_left(1);
    }

    /// Recompute position, up-vector and clipping range from the focal point.
    ///
    /// Called after every orientation or focal-depth change; unconditionally
    /// applied, there is no partial-failure state.
    pub fn apply(&self, camera: &mut Camera, volume: &Volume) {
        let orientation = self.effective_orientation();
        let normal = orientation.normal();
        for axis in 0..3 {
            camera.position[axis] = camera.focal_point[axis] + normal[axis] * CAMERA_DISTANCE;
        }
        camera.view_up = orientation.view_up();
        let sp = volume.spacing()[orientation.through_axis()];
        camera.clipping_range = [
            CAMERA_DISTANCE - self.clip_factor * sp,
            CAMERA_DISTANCE + self.clip_factor * sp,
        ];
    }

    /// Move the focal point along the through-plane axis and re-derive the
    /// camera.
    pub fn set_focal_depth(&self, camera: &mut Camera, volume: &Volume, depth: f32) {
        camera.focal_point[self.effective_orientation().through_axis()] = depth;
        self.apply(camera, volume);
    }

    /// Displayed slice index, a pure function of the camera state.
    pub fn slice_index(&self, camera: &Camera, volume: &Volume) -> usize {
        let orientation = self.effective_orientation();
        let axis = orientation.through_axis();
        let depth = camera.focal_point[axis];
        let continuous = (depth - volume.origin()[axis]) / volume.spacing()[axis];
        let last = volume.slice_count(orientation).saturating_sub(1);
        (continuous.round().max(0.0) as usize).min(last)
    }

    /// Focal depth clamped to the through-plane field of view.
    pub fn clamp_depth(&self, volume: &Volume, depth: f32) -> f32 {
        let axis = self.effective_orientation().through_axis();
        let lo = volume.origin()[axis];
        let hi = lo + volume.field_of_view()[axis];
        depth.clamp(lo, hi)
    }
}
