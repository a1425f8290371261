use std::collections::HashMap;

use crate::camera::{Camera, OrientationController};
use crate::coords::SliceProjection;
use crate::enums::Orientation;
use crate::overlay::Overlay;
use crate::volume::Volume;

/// Stable identity of a view within its session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ViewId(usize);

impl ViewId {
    pub fn new(raw: usize) -> Self {
        ViewId(raw)
    }

    pub fn raw(self) -> usize {
        self.0
    }
}

/// Keys of the renderable primitives a view owns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActorKey {
    Cursor,
    ResliceIndicator,
    CropBox,
    RegistrationBox,
    BrushIndicator,
    Isolines,
}

/// Display-space 2D geometry of a renderable primitive.
#[derive(Clone, Debug, PartialEq)]
pub enum ActorGeometry {
    /// Cursor cross centered at a display position.
    Cross { center: [f32; 2] },
    /// Circle outline, radius in display pixels.
    Circle { center: [f32; 2], radius: f32 },
    /// Rectangle with a display-space rotation in degrees.
    Rect {
        min: [f32; 2],
        max: [f32; 2],
        rotation_deg: f32,
    },
    /// Polyline segments (isolines, markers).
    Lines(Vec<[[f32; 2]; 2]>),
}

#[derive(Clone, Debug)]
pub struct Actor {
    pub visible: bool,
    pub geometry: ActorGeometry,
}

/// One rendering surface of a session.
///
/// Owns its orientation controller, camera, overlay list and an arena of
/// renderable primitives keyed by [`ActorKey`]. Created when a volume is
/// assigned, destroyed (and unregistered from the bus) on tear-down.
pub struct View {
    id: ViewId,
    pub controller: OrientationController,
    pub camera: Camera,
    /// Integer slice offset for multi-slice mosaics.
    pub slice_offset: i32,
    pub cursor_visible: bool,
    pub slice_nav_enabled: bool,
    pub sync_enabled: bool,
    pub viewport: [u32; 2],
    pub overlays: Vec<Overlay>,
    /// Reslice-cursor rotation, degrees, about the through-plane axis.
    pub reslice_rotation_deg: f32,
    pub reslice_center: [f32; 3],
    actors: HashMap<ActorKey, Actor>,
}

impl View {
    pub fn new(id: ViewId, volume: &Volume, orientation: Orientation, viewport: [u32; 2]) -> Self {
        let controller = OrientationController::new(orientation);
        let mut camera = Camera::fitted(volume, controller.effective_orientation());
        controller.apply(&mut camera, volume);
        let mut actors = HashMap::new();
        let _ = actors.insert(
            ActorKey::Cursor,
            Actor {
                visible: true,
                geometry: ActorGeometry::Cross { center: [0.0; 2] },
            },
        );
        let _ = actors.insert(
            ActorKey::ResliceIndicator,
            Actor {
                visible: false,
                geometry: ActorGeometry::Lines(Vec::new()),
            },
        );
        Self {
            id,
            controller,
            camera,
            slice_offset: 0,
            cursor_visible: true,
            slice_nav_enabled: true,
            sync_enabled: true,
            viewport,
            overlays: Vec::new(),
            reslice_rotation_deg: 0.0,
            reslice_center: volume.get_center(),
            actors,
        }
    }

    pub fn id(&self) -> ViewId {
        self.id
    }

    pub fn orientation(&self) -> Orientation {
        self.controller.effective_orientation()
    }

    pub fn projection(&self, volume: &Volume) -> SliceProjection {
        SliceProjection::new(&self.camera, self.orientation(), self.viewport, volume)
    }

    pub fn slice_index(&self, volume: &Volume) -> usize {
        self.controller.slice_index(&self.camera, volume)
    }

    pub fn focal_depth(&self) -> f32 {
        self.camera.focal_point[self.orientation().through_axis()]
    }

    /// Step the displayed slice by whole spacing units, clamped to the
    /// through-plane field of view. A no-op while slice navigation is
    /// disabled.
    pub fn step_slice(&mut self, volume: &Volume, steps: i32) {
        if !self.slice_nav_enabled {
            return;
        }
        let axis = self.orientation().through_axis();
        let depth = self.focal_depth() + steps as f32 * volume.spacing()[axis];
        let depth = self.controller.clamp_depth(volume, depth);
        self.controller
            .set_focal_depth(&mut self.camera, volume, depth);
    }

    pub fn zoom(&mut self, factor: f32) {
        if factor > 0.0 {
            self.camera.parallel_scale = (self.camera.parallel_scale * factor).max(1e-3);
        }
    }

    /// Pan the camera in the cutting plane by a display-pixel delta.
    pub fn pan(&mut self, volume: &Volume, dx: f32, dy: f32) {
        let per_pixel = 2.0 * self.camera.parallel_scale / self.viewport[1] as f32;
        let (u_axis, v_axis) = self.orientation().in_plane_axes();
        self.camera.focal_point[u_axis] -= dx * per_pixel;
        self.camera.focal_point[v_axis] += dy * per_pixel;
        self.controller.apply(&mut self.camera, volume);
    }

    pub fn actor(&self, key: ActorKey) -> Option<&Actor> {
        self.actors.get(&key)
    }

    pub fn ensure_actor(&mut self, key: ActorKey, geometry: ActorGeometry) -> &mut Actor {
        self.actors.entry(key).or_insert(Actor {
            visible: true,
            geometry,
        })
    }

    pub fn set_actor_geometry(&mut self, key: ActorKey, geometry: ActorGeometry) {
        let actor = self.ensure_actor(key, geometry.clone());
        actor.geometry = geometry;
    }

    pub fn set_actor_visible(&mut self, key: ActorKey, visible: bool) {
        if let Some(actor) = self.actors.get_mut(&key) {
            actor.visible = visible;
        }
    }

    pub fn remove_actor(&mut self, key: ActorKey) {
        let _ = self.actors.remove(&key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn volume() -> Volume {
        Volume::new(Array3::zeros((64, 64, 64)), [1.0, 1.0, 1.0])
    }

    #[test]
    fn slice_stepping_is_clamped_to_the_fov() {
        let volume = volume();
        let mut view = View::new(ViewId::new(0), &volume, Orientation::Axial, [512, 512]);
        assert_eq!(view.slice_index(&volume), 32);
        view.step_slice(&volume, 1000);
        assert_eq!(view.slice_index(&volume), 63);
        view.step_slice(&volume, -1000);
        assert_eq!(view.slice_index(&volume), 0);
    }

    #[test]
    fn stepping_disabled_views_stay_put() {
        let volume = volume();
        let mut view = View::new(ViewId::new(0), &volume, Orientation::Axial, [512, 512]);
        view.slice_nav_enabled = false;
        view.step_slice(&volume, 5);
        assert_eq!(view.slice_index(&volume), 32);
    }

    #[test]
    fn pan_moves_the_focal_point_in_plane() {
        let volume = volume();
        let mut view = View::new(ViewId::new(0), &volume, Orientation::Axial, [512, 512]);
        let before = view.camera.focal_point;
        view.pan(&volume, 64.0, 0.0);
        assert!(view.camera.focal_point[0] < before[0]);
        assert_eq!(view.camera.focal_point[2], before[2]);
    }

    #[test]
    fn actor_arena_lifecycle() {
        let volume = volume();
        let mut view = View::new(ViewId::new(0), &volume, Orientation::Axial, [512, 512]);
        assert!(view.actor(ActorKey::Cursor).is_some());
        assert!(view.actor(ActorKey::BrushIndicator).is_none());
        view.set_actor_geometry(
            ActorKey::BrushIndicator,
            ActorGeometry::Circle {
                center: [10.0, 10.0],
                radius: 3.0,
            },
        );
        assert!(view.actor(ActorKey::BrushIndicator).is_some());
        view.remove_actor(ActorKey::BrushIndicator);
        assert!(view.actor(ActorKey::BrushIndicator).is_none());
    }
}
