use crate::camera::Camera;
use crate::enums::{CursorRounding, Orientation};
use crate::volume::Volume;

/// Stateless conversion between world, display (pixel), normalized-viewport
/// and voxel coordinate spaces for one view's camera.
///
/// All conversions are pure functions of the captured camera state. Display
/// coordinates have the pixel origin at the top-left with y growing
/// downward; normalized-viewport coordinates have the origin at the
/// bottom-left with v growing upward.
#[derive(Clone, Debug)]
pub struct SliceProjection {
    orientation: Orientation,
    focal_point: [f32; 3],
    parallel_scale: f32,
    viewport: [u32; 2],
    origin: [f32; 3],
    spacing: [f32; 3],
}

impl SliceProjection {
    pub fn new(
        camera: &Camera,
        orientation: Orientation,
        viewport: [u32; 2],
        volume: &Volume,
    ) -> Self {
        Self {
            orientation,
            focal_point: camera.focal_point,
            parallel_scale: camera.parallel_scale,
            viewport,
            origin: volume.origin(),
            spacing: volume.spacing(),
        }
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn viewport(&self) -> [u32; 2] {
        self.viewport
    }

    /// World units per display pixel.
    pub fn world_per_pixel(&self) -> f32 {
        2.0 * self.parallel_scale / self.viewport[1] as f32
    }

    pub fn world_to_display(&self, p: [f32; 3]) -> [f32; 2] {
        let (u_axis, v_axis) = self.orientation.in_plane_axes();
        let scale = 1.0 / self.world_per_pixel();
        let w = self.viewport[0] as f32;
        let h = self.viewport[1] as f32;
        [
            (p[u_axis] - self.focal_point[u_axis]) * scale + w / 2.0,
            h / 2.0 - (p[v_axis] - self.focal_point[v_axis]) * scale,
        ]
    }

    /// Inverse of [`world_to_display`]; the through-plane component is the
    /// focal depth.
    ///
    /// [`world_to_display`]: Self::world_to_display
    pub fn display_to_world(&self, x: f32, y: f32) -> [f32; 3] {
        let (u_axis, v_axis) = self.orientation.in_plane_axes();
        let per_pixel = self.world_per_pixel();
        let w = self.viewport[0] as f32;
        let h = self.viewport[1] as f32;
        let mut p = self.focal_point;
        p[u_axis] = (x - w / 2.0) * per_pixel + self.focal_point[u_axis];
        p[v_axis] = (h / 2.0 - y) * per_pixel + self.focal_point[v_axis];
        p
    }

    pub fn display_to_normalized_viewport(&self, x: f32, y: f32) -> [f32; 2] {
        [
            x / self.viewport[0] as f32,
            1.0 - y / self.viewport[1] as f32,
        ]
    }

    pub fn normalized_viewport_to_display(&self, u: f32, v: f32) -> [f32; 2] {
        [
            u * self.viewport[0] as f32,
            (1.0 - v) * self.viewport[1] as f32,
        ]
    }

    /// World point to voxel coordinate under the cursor rounding policy.
    ///
    /// `Rounded` snaps every component to the nearest voxel; `SubVoxel`
    /// keeps the in-plane components fractional and snaps only the
    /// through-plane component to the displayed slice.
    pub fn world_to_voxel(&self, p: [f32; 3], rounding: CursorRounding) -> [f32; 3] {
        let mut voxel = [
            (p[0] - self.origin[0]) / self.spacing[0],
            (p[1] - self.origin[1]) / self.spacing[1],
            (p[2] - self.origin[2]) / self.spacing[2],
        ];
        match rounding {
            CursorRounding::Rounded => {
                voxel = voxel.map(f32::round);
            }
            CursorRounding::SubVoxel => {
                let through = self.orientation.through_axis();
                voxel[through] = ((self.focal_point[through] - self.origin[through])
                    / self.spacing[through])
                    .round();
            }
        }
        voxel
    }

    pub fn voxel_to_world(&self, i: usize, j: usize, k: usize) -> [f32; 3] {
        [
            self.origin[0] + i as f32 * self.spacing[0],
            self.origin[1] + j as f32 * self.spacing[1],
            self.origin[2] + k as f32 * self.spacing[2],
        ]
    }

    /// Display position to an integer voxel coordinate, bounds-unchecked.
    pub fn display_to_voxel(&self, x: f32, y: f32) -> [f32; 3] {
        self.world_to_voxel(self.display_to_world(x, y), CursorRounding::Rounded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::OrientationController;
    use ndarray::Array3;

    fn projection(orientation: Orientation) -> (SliceProjection, Volume) {
        let volume = Volume::new(Array3::zeros((64, 64, 64)), [1.0, 1.0, 1.0]);
        let controller = OrientationController::new(orientation);
        let mut camera = Camera::fitted(&volume, orientation);
        controller.apply(&mut camera, &volume);
        let projection = SliceProjection::new(&camera, orientation, [512, 512], &volume);
        (projection, volume)
    }

    #[test]
    fn voxel_round_trip_is_exact() {
        let (projection, _) = projection(Orientation::Axial);
        for &(i, j, k) in &[(0usize, 0usize, 0usize), (10, 20, 30), (63, 1, 62)] {
            let world = projection.voxel_to_world(i, j, k);
            let voxel = projection.world_to_voxel(world, CursorRounding::Rounded);
            assert_eq!(voxel, [i as f32, j as f32, k as f32]);
        }
    }

    #[test]
    fn display_round_trip_within_one_pixel() {
        for orientation in [
            Orientation::Axial,
            Orientation::Coronal,
            Orientation::Sagittal,
        ] {
            let (projection, _) = projection(orientation);
            let p = [12.25, 40.5, 7.75];
            let [x, y] = projection.world_to_display(p);
            let q = projection.display_to_world(x, y);
            let (u, v) = orientation.in_plane_axes();
            let tolerance = projection.world_per_pixel();
            assert!((p[u] - q[u]).abs() <= tolerance);
            assert!((p[v] - q[v]).abs() <= tolerance);
            assert_eq!(q[orientation.through_axis()], 32.0);
        }
    }

    #[test]
    fn normalized_viewport_round_trip() {
        let (projection, _) = projection(Orientation::Coronal);
        let [u, v] = projection.display_to_normalized_viewport(128.0, 384.0);
        assert!((u - 0.25).abs() < 1e-6);
        assert!((v - 0.25).abs() < 1e-6);
        let [x, y] = projection.normalized_viewport_to_display(u, v);
        assert!((x - 128.0).abs() < 1e-3);
        assert!((y - 384.0).abs() < 1e-3);
    }

    #[test]
    fn sub_voxel_rounding_keeps_in_plane_fractions() {
        let (projection, _) = projection(Orientation::Axial);
        let voxel = projection.world_to_voxel([10.4, 20.6, 9.0], CursorRounding::SubVoxel);
        assert_eq!(voxel[0], 10.4);
        assert_eq!(voxel[1], 20.6);
        // through-plane always snaps to the focal slice
        assert_eq!(voxel[2], 32.0);
        let rounded = projection.world_to_voxel([10.4, 20.6, 9.0], CursorRounding::Rounded);
        assert_eq!(rounded, [10.0, 21.0, 9.0]);
    }
}
