use crate::camera::BOX_ROTATION_SIGN;
use crate::coords::SliceProjection;
use crate::enums::Orientation;
use crate::error::{Error, Result};
use crate::volume::Volume;

/// Axis-aligned world-space box, origin plus extents.
///
/// The box is the single source of truth for crop and registration regions;
/// the on-screen rectangle of any view is a projection of it, re-derived
/// after every zoom, pan, slice or orientation change.
#[derive(Clone, Debug, PartialEq)]
pub struct WorldBox {
    pub origin: [f32; 3],
    pub extents: [f32; 3],
}

impl WorldBox {
    /// Box spanning the volume's full field of view.
    pub fn full(volume: &Volume) -> Self {
        Self {
            origin: volume.origin(),
            extents: volume.field_of_view(),
        }
    }

    /// Build from a normalized-viewport rectangle drawn on a view.
    ///
    /// The in-plane edges come from the rectangle; the through-plane pair is
    /// pinned to the volume's full field of view.
    pub fn from_viewport_rect(
        projection: &SliceProjection,
        volume: &Volume,
        min_uv: [f32; 2],
        max_uv: [f32; 2],
    ) -> Result<Self> {
        if (max_uv[0] - min_uv[0]).abs() < 1e-6 || (max_uv[1] - min_uv[1]).abs() < 1e-6 {
            return Err(Error::DegenerateRegion("zero-extent viewport rectangle"));
        }
        let [ax, ay] = projection.normalized_viewport_to_display(min_uv[0], min_uv[1]);
        let [bx, by] = projection.normalized_viewport_to_display(max_uv[0], max_uv[1]);
        let a = projection.display_to_world(ax, ay);
        let b = projection.display_to_world(bx, by);

        let orientation = projection.orientation();
        let (u_axis, v_axis) = orientation.in_plane_axes();
        let through = orientation.through_axis();

        let mut origin = [0.0f32; 3];
        let mut extents = [0.0f32; 3];
        origin[u_axis] = a[u_axis].min(b[u_axis]);
        extents[u_axis] = (a[u_axis] - b[u_axis]).abs();
        origin[v_axis] = a[v_axis].min(b[v_axis]);
        extents[v_axis] = (a[v_axis] - b[v_axis]).abs();
        origin[through] = volume.origin()[through];
        extents[through] = volume.field_of_view()[through];
        Ok(Self { origin, extents })
    }

    /// Normalized-viewport rectangle of the box on a view, min then max.
    pub fn viewport_rect(&self, projection: &SliceProjection) -> ([f32; 2], [f32; 2]) {
        let max_corner = [
            self.origin[0] + self.extents[0],
            self.origin[1] + self.extents[1],
            self.origin[2] + self.extents[2],
        ];
        let [ax, ay] = projection.world_to_display(self.origin);
        let [bx, by] = projection.world_to_display(max_corner);
        let [au, av] = projection.display_to_normalized_viewport(ax, ay);
        let [bu, bv] = projection.display_to_normalized_viewport(bx, by);
        (
            [au.min(bu), av.min(bv)],
            [au.max(bu), av.max(bv)],
        )
    }

    pub fn center(&self) -> [f32; 3] {
        [
            self.origin[0] + self.extents[0] / 2.0,
            self.origin[1] + self.extents[1] / 2.0,
            self.origin[2] + self.extents[2] / 2.0,
        ]
    }

    pub fn contains_world(&self, p: [f32; 3]) -> bool {
        (0..3).all(|axis| {
            p[axis] >= self.origin[axis] && p[axis] <= self.origin[axis] + self.extents[axis]
        })
    }

    /// Voxel sextuple `(x1, x2, y1, y2, z1, z2)` of the box, clamped to
    /// `[1, size - 2]` per axis so the window never touches the true edge.
    pub fn voxel_window(&self, volume: &Volume) -> [usize; 6] {
        let size = volume.size();
        let mut window = [0usize; 6]; // x1 x2 y1 y2 z1 z2
        for axis in 0..3 {
            let lo = (self.origin[axis] - volume.origin()[axis]) / volume.spacing()[axis];
            let hi = lo + self.extents[axis] / volume.spacing()[axis];
            let max = (size[axis] as i64 - 2).max(1);
            let mut lo = (lo.round() as i64).clamp(1, max);
            let mut hi = (hi.round() as i64).clamp(1, max);
            if lo > hi {
                std::mem::swap(&mut lo, &mut hi);
            }
            window[axis * 2] = lo as usize;
            window[axis * 2 + 1] = hi as usize;
        }
        window
    }
}

/// Display rotation of the box actor for a given reslice-cursor rotation.
///
/// Uses the per-axis sign table: the box rotates opposite to the cursor on
/// two of the axes.
pub fn box_actor_rotation(orientation: Orientation, reslice_rotation_deg: f32) -> f32 {
    BOX_ROTATION_SIGN[orientation.through_axis()] * reslice_rotation_deg
}

/// Crop region of interest: the overlay is blended inside the window, the
/// reference volume shows through outside it.
#[derive(Clone, Debug)]
pub struct CropBox {
    pub world: WorldBox,
    pub enabled: bool,
}

impl CropBox {
    pub fn new(volume: &Volume) -> Self {
        Self {
            world: WorldBox::full(volume),
            enabled: false,
        }
    }
}

/// Sub-area restricting a registration computation. Geometry only; the
/// registration itself happens elsewhere.
#[derive(Clone, Debug)]
pub struct RegistrationBox {
    pub world: WorldBox,
    pub visible: bool,
}

impl RegistrationBox {
    pub fn new(volume: &Volume) -> Self {
        Self {
            world: WorldBox::full(volume),
            visible: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{Camera, OrientationController};
    use ndarray::Array3;

    fn setup(orientation: Orientation) -> (SliceProjection, Volume) {
        let volume = Volume::new(Array3::zeros((64, 64, 64)), [1.0; 3]);
        let controller = OrientationController::new(orientation);
        let mut camera = Camera::fitted(&volume, orientation);
        controller.apply(&mut camera, &volume);
        (
            SliceProjection::new(&camera, orientation, [512, 512], &volume),
            volume,
        )
    }

    #[test]
    fn viewport_rect_round_trip() {
        let (projection, volume) = setup(Orientation::Axial);
        let world =
            WorldBox::from_viewport_rect(&projection, &volume, [0.25, 0.25], [0.75, 0.75])
                .unwrap();
        let (min_uv, max_uv) = world.viewport_rect(&projection);
        assert!((min_uv[0] - 0.25).abs() < 1e-3);
        assert!((min_uv[1] - 0.25).abs() < 1e-3);
        assert!((max_uv[0] - 0.75).abs() < 1e-3);
        assert!((max_uv[1] - 0.75).abs() < 1e-3);
    }

    #[test]
    fn through_plane_extent_is_pinned_to_the_fov() {
        let (projection, volume) = setup(Orientation::Coronal);
        let world =
            WorldBox::from_viewport_rect(&projection, &volume, [0.1, 0.1], [0.5, 0.5]).unwrap();
        assert_eq!(world.origin[1], 0.0);
        assert_eq!(world.extents[1], 64.0);
    }

    #[test]
    fn voxel_window_never_touches_the_edge() {
        let volume = Volume::new(Array3::zeros((64, 64, 64)), [1.0; 3]);
        let oversized = WorldBox {
            origin: [-100.0; 3],
            extents: [500.0; 3],
        };
        let [x1, x2, y1, y2, z1, z2] = oversized.voxel_window(&volume);
        assert_eq!([x1, y1, z1], [1, 1, 1]);
        assert_eq!([x2, y2, z2], [62, 62, 62]);
    }

    #[test]
    fn voxel_window_is_ordered() {
        let volume = Volume::new(Array3::zeros((64, 64, 64)), [1.0; 3]);
        let world = WorldBox {
            origin: [10.0, 20.0, 30.0],
            extents: [5.0, 5.0, 5.0],
        };
        let [x1, x2, y1, y2, z1, z2] = world.voxel_window(&volume);
        assert!(x1 <= x2 && y1 <= y2 && z1 <= z2);
        assert_eq!([x1, x2], [10, 15]);
        assert_eq!([y1, y2], [20, 25]);
        assert_eq!([z1, z2], [30, 35]);
    }

    #[test]
    fn degenerate_rectangle_is_rejected() {
        let (projection, volume) = setup(Orientation::Axial);
        assert!(matches!(
            WorldBox::from_viewport_rect(&projection, &volume, [0.5, 0.2], [0.5, 0.8]),
            Err(Error::DegenerateRegion(_))
        ));
    }

    #[test]
    fn box_rotation_flips_per_axis() {
        assert_eq!(box_actor_rotation(Orientation::Axial, 30.0), -30.0);
        assert_eq!(box_actor_rotation(Orientation::Coronal, 30.0), 30.0);
        assert_eq!(box_actor_rotation(Orientation::Sagittal, 30.0), -30.0);
    }
}
