use crate::boxes::{CropBox, RegistrationBox, WorldBox, box_actor_rotation};
use crate::cursor::Cursor;
use crate::edit::{EditMode, RasterDispatcher};
use crate::enums::{CursorRounding, Orientation};
use crate::error::{Error, Result};
use crate::interaction::{
    DragKind, InteractionState, Mode, Modifiers, ToolFlags, WheelAction, classify_arrow,
    classify_wheel,
};
use crate::overlay::Overlay;
use crate::progress::{NullProgress, ProgressReporter};
use crate::roi::{Roi, RoiSet};
use crate::sync::SyncBus;
use crate::tools::MarkerSet;
use crate::transform::Transform;
use crate::view::{ActorGeometry, ActorKey, View, ViewId};
use crate::volume::Volume;

/// Session-wide display preferences.
#[derive(Clone, Copy, Debug)]
pub struct ViewSettings {
    pub rounded_cursor: bool,
    pub center_alignment: bool,
    /// World distance within which a marker is drawn on a slice.
    pub marker_tolerance: f32,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            rounded_cursor: true,
            center_alignment: true,
            marker_tolerance: 1.0,
        }
    }
}

/// Align a view's camera with the shared cursor.
///
/// In-plane focal components follow the cursor; the focal depth is the
/// cursor's through-plane component plus the view's slice offset in spacing
/// units, clamped to the field of view.
fn sync_view_cursor(view: &mut View, cursor: &Cursor, volume: &Volume) {
    let orientation = view.orientation();
    let (u_axis, v_axis) = orientation.in_plane_axes();
    let through = orientation.through_axis();
    let p = cursor.position();
    view.camera.focal_point[u_axis] = p[u_axis];
    view.camera.focal_point[v_axis] = p[v_axis];
    let depth = p[through] + view.slice_offset as f32 * volume.spacing()[through];
    let depth = view.controller.clamp_depth(volume, depth);
    view.controller
        .set_focal_depth(&mut view.camera, volume, depth);

    let projection = view.projection(volume);
    let center = projection.world_to_display(p);
    view.set_actor_geometry(ActorKey::Cursor, ActorGeometry::Cross { center });
}

/// Move the rectangle corner nearest to `uv` onto it, keeping min/max order
/// per component.
fn drag_rect_corner(min_uv: [f32; 2], max_uv: [f32; 2], uv: [f32; 2]) -> ([f32; 2], [f32; 2]) {
    let mut min = min_uv;
    let mut max = max_uv;
    for axis in 0..2 {
        if (uv[axis] - min[axis]).abs() <= (uv[axis] - max[axis]).abs() {
            min[axis] = uv[axis];
        } else {
            max[axis] = uv[axis];
        }
        if min[axis] > max[axis] {
            std::mem::swap(&mut min[axis], &mut max[axis]);
        }
    }
    (min, max)
}

/// One viewing session: the reference volume, its views, the shared cursor,
/// the ROI set and the editing dispatcher.
///
/// All mutation is synchronous and single-threaded; cross-view propagation
/// happens through the bus fan-out before the triggering call returns.
pub struct Session {
    volume: Option<Volume>,
    views: Vec<View>,
    bus: SyncBus,
    cursor: Cursor,
    pub rois: RoiSet,
    pub dispatcher: RasterDispatcher,
    pub markers: MarkerSet,
    pub crop: Option<CropBox>,
    pub registration: Option<RegistrationBox>,
    pub settings: ViewSettings,
    pub tool_flags: ToolFlags,
    interaction: InteractionState,
    active_view: Option<ViewId>,
    next_view: usize,
    progress: Box<dyn ProgressReporter>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            volume: None,
            views: Vec::new(),
            bus: SyncBus::default(),
            cursor: Cursor::new([0.0; 3]),
            rois: RoiSet::default(),
            dispatcher: RasterDispatcher::default(),
            markers: MarkerSet::default(),
            crop: None,
            registration: None,
            settings: ViewSettings::default(),
            tool_flags: ToolFlags::default(),
            interaction: InteractionState::default(),
            active_view: None,
            next_view: 0,
            progress: Box::new(NullProgress),
        }
    }
}

impl Session {
    pub fn new(volume: Volume) -> Self {
        let mut session = Self::default();
        session.set_volume(volume);
        session
    }

    /// Attach the reference volume. The cursor starts at its center; crop
    /// and registration boxes span its full field of view.
    pub fn set_volume(&mut self, volume: Volume) {
        self.cursor = Cursor::new(volume.get_center());
        self.cursor.rounding = if self.settings.rounded_cursor {
            CursorRounding::Rounded
        } else {
            CursorRounding::SubVoxel
        };
        self.crop = Some(CropBox::new(&volume));
        self.registration = Some(RegistrationBox::new(&volume));
        self.volume = Some(volume);
        log::info!("volume attached");
    }

    pub fn volume(&self) -> Result<&Volume> {
        self.volume.as_ref().ok_or(Error::NoVolume)
    }

    pub fn volume_mut(&mut self) -> Result<&mut Volume> {
        self.volume.as_mut().ok_or(Error::NoVolume)
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    pub fn set_progress_reporter(&mut self, reporter: Box<dyn ProgressReporter>) {
        self.progress = reporter;
    }

    pub fn set_rounded_cursor(&mut self, rounded: bool) {
        self.settings.rounded_cursor = rounded;
        self.cursor.rounding = if rounded {
            CursorRounding::Rounded
        } else {
            CursorRounding::SubVoxel
        };
    }

    fn find_mut(views: &mut [View], id: ViewId) -> Result<&mut View> {
        views
            .iter_mut()
            .find(|view| view.id() == id)
            .ok_or(Error::UnknownView(id.raw()))
    }

    pub fn view(&self, id: ViewId) -> Result<&View> {
        self.views
            .iter()
            .find(|view| view.id() == id)
            .ok_or(Error::UnknownView(id.raw()))
    }

    pub fn view_mut(&mut self, id: ViewId) -> Result<&mut View> {
        Self::find_mut(&mut self.views, id)
    }

    pub fn views(&self) -> impl Iterator<Item = &View> {
        self.views.iter()
    }

    /// Create a view of the attached volume and register it on the bus.
    pub fn add_view(&mut self, orientation: Orientation, viewport: [u32; 2]) -> Result<ViewId> {
        let volume = self.volume.as_ref().ok_or(Error::NoVolume)?;
        let id = ViewId::new(self.next_view);
        self.next_view += 1;
        let mut view = View::new(id, volume, orientation, viewport);
        sync_view_cursor(&mut view, &self.cursor, volume);
        self.views.push(view);
        self.bus.register(id);
        Ok(id)
    }

    /// Unregister from the bus, then drop the view.
    pub fn remove_view(&mut self, id: ViewId) -> Result<()> {
        let index = self
            .views
            .iter()
            .position(|view| view.id() == id)
            .ok_or(Error::UnknownView(id.raw()))?;
        self.bus.unregister(id);
        let _ = self.views.remove(index);
        Ok(())
    }

    /// Move the shared cursor from `origin`'s interaction.
    ///
    /// With `broadcast` set and the origin sync-enabled, every other
    /// sync-enabled view follows before this call returns.
    pub fn set_cursor_world_position(
        &mut self,
        origin: ViewId,
        p: [f32; 3],
        broadcast: bool,
    ) -> Result<()> {
        let volume = self.volume.as_ref().ok_or(Error::NoVolume)?;
        self.cursor.set_world_position(p, volume);
        let view = Self::find_mut(&mut self.views, origin)?;
        sync_view_cursor(view, &self.cursor, volume);
        let origin_synced = view.sync_enabled;
        if broadcast && origin_synced {
            for target in self.bus.fanout(origin) {
                if let Ok(view) = Self::find_mut(&mut self.views, target) {
                    if view.sync_enabled {
                        sync_view_cursor(view, &self.cursor, volume);
                    }
                }
            }
        }
        self.refresh_derived_geometry();
        Ok(())
    }

    /// Move `origin`'s camera focal point; synchronized views pan along.
    pub fn set_camera_plane_position(
        &mut self,
        origin: ViewId,
        focal: [f32; 3],
        broadcast: bool,
    ) -> Result<()> {
        let volume = self.volume.as_ref().ok_or(Error::NoVolume)?;
        let view = Self::find_mut(&mut self.views, origin)?;
        view.camera.focal_point = focal;
        view.controller.apply(&mut view.camera, volume);
        let origin_synced = view.sync_enabled;
        if broadcast && origin_synced {
            for target in self.bus.fanout(origin) {
                if let Ok(view) = Self::find_mut(&mut self.views, target) {
                    if view.sync_enabled {
                        let through = view.orientation().through_axis();
                        let mut focal = focal;
                        focal[through] = view.controller.clamp_depth(volume, focal[through]);
                        view.camera.focal_point = focal;
                        view.controller.apply(&mut view.camera, volume);
                    }
                }
            }
        }
        self.refresh_derived_geometry();
        Ok(())
    }

    /// Replace the placement of overlay `index` on every synchronized view.
    pub fn apply_transform(
        &mut self,
        origin: ViewId,
        index: usize,
        transform: &Transform,
        broadcast: bool,
    ) -> Result<()> {
        let reference = self.volume.as_mut().ok_or(Error::NoVolume)?;
        let view = Self::find_mut(&mut self.views, origin)?;
        let overlay = view.overlays.get_mut(index).ok_or(Error::NoOverlay(index))?;
        overlay.placement = transform.clone();
        reference.set_transform(overlay.volume.id(), transform.get_inverse_transform());
        let origin_synced = view.sync_enabled;
        if broadcast && origin_synced {
            for target in self.bus.fanout(origin) {
                if let Ok(view) = Self::find_mut(&mut self.views, target) {
                    if view.sync_enabled {
                        if let Some(overlay) = view.overlays.get_mut(index) {
                            overlay.placement = transform.clone();
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Toggle cursor visibility, fanned out to synchronized views.
    pub fn set_visibility(&mut self, origin: ViewId, visible: bool, broadcast: bool) -> Result<()> {
        let view = Self::find_mut(&mut self.views, origin)?;
        view.cursor_visible = visible;
        view.set_actor_visible(ActorKey::Cursor, visible);
        let origin_synced = view.sync_enabled;
        if broadcast && origin_synced {
            for target in self.bus.fanout(origin) {
                if let Ok(view) = Self::find_mut(&mut self.views, target) {
                    if view.sync_enabled {
                        view.cursor_visible = visible;
                        view.set_actor_visible(ActorKey::Cursor, visible);
                    }
                }
            }
        }
        Ok(())
    }

    /// Set overlay opacity, rejected outside `[0, 1]`.
    pub fn set_opacity(
        &mut self,
        origin: ViewId,
        index: usize,
        opacity: f32,
        broadcast: bool,
    ) -> Result<()> {
        if !(0.0..=1.0).contains(&opacity) {
            return Err(Error::OpacityOutOfRange(opacity));
        }
        let view = Self::find_mut(&mut self.views, origin)?;
        let overlay = view.overlays.get_mut(index).ok_or(Error::NoOverlay(index))?;
        overlay.opacity = opacity;
        let origin_synced = view.sync_enabled;
        if broadcast && origin_synced {
            for target in self.bus.fanout(origin) {
                if let Ok(view) = Self::find_mut(&mut self.views, target) {
                    if view.sync_enabled {
                        if let Some(overlay) = view.overlays.get_mut(index) {
                            overlay.opacity = opacity;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Replace the crop box; every view re-projects its rectangle.
    ///
    /// The box is session-global, not per-view state, so this mutator has no
    /// `broadcast` flag: the change always reaches every view through the
    /// re-projection. `_origin` is kept for signature symmetry with the
    /// per-view mutators.
    pub fn set_crop_box(&mut self, _origin: ViewId, world: WorldBox, enabled: bool) -> Result<()> {
        let _ = self.volume.as_ref().ok_or(Error::NoVolume)?;
        self.crop = Some(CropBox { world, enabled });
        self.refresh_derived_geometry();
        Ok(())
    }

    /// Replace the registration box. Session-global like the crop box; no
    /// `broadcast` flag, every view re-projects.
    pub fn set_registration_box(
        &mut self,
        _origin: ViewId,
        world: WorldBox,
        visible: bool,
    ) -> Result<()> {
        let _ = self.volume.as_ref().ok_or(Error::NoVolume)?;
        self.registration = Some(RegistrationBox { world, visible });
        self.refresh_derived_geometry();
        Ok(())
    }

    /// Re-derive every view's projected geometry from world-space state.
    ///
    /// The world boxes and markers are the source of truth; the display
    /// rectangles and segments are projections re-computed after any zoom,
    /// pan, slice or orientation change.
    pub fn refresh_derived_geometry(&mut self) {
        let Some(volume) = self.volume.as_ref() else {
            return;
        };
        for view in &mut self.views {
            let projection = view.projection(volume);
            let orientation = view.orientation();
            let rotation = box_actor_rotation(orientation, view.reslice_rotation_deg);

            if let Some(crop) = &self.crop {
                let (min_uv, max_uv) = crop.world.viewport_rect(&projection);
                let min = projection.normalized_viewport_to_display(min_uv[0], max_uv[1]);
                let max = projection.normalized_viewport_to_display(max_uv[0], min_uv[1]);
                view.set_actor_geometry(
                    ActorKey::CropBox,
                    ActorGeometry::Rect {
                        min,
                        max,
                        rotation_deg: rotation,
                    },
                );
                view.set_actor_visible(ActorKey::CropBox, crop.enabled);
            }
            if let Some(registration) = &self.registration {
                let (min_uv, max_uv) = registration.world.viewport_rect(&projection);
                let min = projection.normalized_viewport_to_display(min_uv[0], max_uv[1]);
                let max = projection.normalized_viewport_to_display(max_uv[0], min_uv[1]);
                view.set_actor_geometry(
                    ActorKey::RegistrationBox,
                    ActorGeometry::Rect {
                        min,
                        max,
                        rotation_deg: rotation,
                    },
                );
                view.set_actor_visible(ActorKey::RegistrationBox, registration.visible);
            }

            let segments = self.markers.display_segments(
                &projection,
                view.focal_depth(),
                self.settings.marker_tolerance,
            );
            view.set_actor_geometry(ActorKey::Isolines, ActorGeometry::Lines(segments));

            // reslice cursor: two crossing lines through the reslice center,
            // rotated with the drag, shown while the reslice tool is active
            let center = projection.world_to_display(view.reslice_center);
            let half = view.viewport[0].max(view.viewport[1]) as f32;
            let (sin, cos) = view.reslice_rotation_deg.to_radians().sin_cos();
            let cross = [[cos, sin], [-sin, cos]]
                .iter()
                .map(|d| {
                    [
                        [center[0] - d[0] * half, center[1] - d[1] * half],
                        [center[0] + d[0] * half, center[1] + d[1] * half],
                    ]
                })
                .collect();
            view.set_actor_geometry(ActorKey::ResliceIndicator, ActorGeometry::Lines(cross));
            view.set_actor_visible(ActorKey::ResliceIndicator, self.tool_flags.reslice_drag);
        }
    }

    /// Change a view's displayed plane. The world-space cursor stays put;
    /// the camera is re-derived around it.
    pub fn set_view_orientation(&mut self, id: ViewId, index: usize) -> Result<()> {
        let volume = self.volume.as_ref().ok_or(Error::NoVolume)?;
        let view = Self::find_mut(&mut self.views, id)?;
        view.controller.set_orientation_index(index)?;
        let (_, v_axis) = view.orientation().in_plane_axes();
        view.camera.parallel_scale = volume.field_of_view()[v_axis] / 2.0;
        view.camera.view_up = view.orientation().view_up();
        sync_view_cursor(view, &self.cursor, volume);
        self.refresh_derived_geometry();
        Ok(())
    }

    pub fn step_slice(&mut self, id: ViewId, steps: i32) -> Result<()> {
        let volume = self.volume.as_ref().ok_or(Error::NoVolume)?;
        let view = Self::find_mut(&mut self.views, id)?;
        view.step_slice(volume, steps);
        self.refresh_derived_geometry();
        Ok(())
    }

    /// Attach an overlay volume to a view, deriving its placement through
    /// the alignment chain.
    pub fn add_overlay(&mut self, id: ViewId, volume: Volume) -> Result<usize> {
        let reference = self.volume.as_mut().ok_or(Error::NoVolume)?;
        let overlay = Overlay::attach(reference, volume, self.settings.center_alignment);
        let view = Self::find_mut(&mut self.views, id)?;
        view.overlays.push(overlay);
        Ok(view.overlays.len() - 1)
    }

    /// New empty ROI matching the volume grid; it becomes the active one.
    pub fn add_roi(&mut self, name: impl Into<String>) -> Result<()> {
        let volume = self.volume.as_ref().ok_or(Error::NoVolume)?;
        self.rois.add(Roi::new(name, volume))
    }

    pub fn undo(&mut self) -> Result<bool> {
        self.dispatcher.undo(&mut self.rois)
    }

    pub fn redo(&mut self) -> Result<bool> {
        self.dispatcher.redo(&mut self.rois)
    }

    fn voxel_under(&self, id: ViewId, x: f32, y: f32) -> Result<Option<[usize; 3]>> {
        let volume = self.volume.as_ref().ok_or(Error::NoVolume)?;
        let view = self.view(id)?;
        let projection = view.projection(volume);
        let voxel = projection.display_to_voxel(x, y);
        let size = volume.size();
        let inside = (0..3).all(|axis| voxel[axis] >= 0.0 && (voxel[axis] as usize) < size[axis]);
        Ok(inside.then(|| [voxel[0] as usize, voxel[1] as usize, voxel[2] as usize]))
    }

    /// Scalar under the pointer: topmost overlay that covers the point,
    /// else the reference volume.
    pub fn value_under_pointer(&self, id: ViewId, x: f32, y: f32) -> Result<Option<f32>> {
        let volume = self.volume.as_ref().ok_or(Error::NoVolume)?;
        let view = self.view(id)?;
        let world = view.projection(volume).display_to_world(x, y);
        for overlay in view.overlays.iter().rev().filter(|o| o.visible) {
            if let Some(value) = overlay.probe_value(world) {
                return Ok(Some(value));
            }
        }
        Ok(volume.value_at_world(world))
    }

    /// Pointer press on a view. Selects the interaction mode and performs
    /// the press-time action of that mode.
    pub fn pointer_down(
        &mut self,
        id: ViewId,
        x: f32,
        y: f32,
        modifiers: Modifiers,
    ) -> Result<Mode> {
        let volume = self.volume.as_ref().ok_or(Error::NoVolume)?;
        let view = self.view(id)?;
        let projection = view.projection(volume);
        let world = projection.display_to_world(x, y);
        let center = view.reslice_center;
        let (u_axis, v_axis) = view.orientation().in_plane_axes();
        let distance = ((world[u_axis] - center[u_axis]).powi(2)
            + (world[v_axis] - center[v_axis]).powi(2))
        .sqrt();
        let fov = volume.field_of_view()[v_axis];
        let cursor_visible = view.cursor_visible;

        let mode =
            self.interaction
                .pointer_down(modifiers, self.tool_flags, distance, fov, cursor_visible);
        self.active_view = Some(id);

        match mode {
            Mode::ResliceCursorDrag(DragKind::Rotate) => {
                self.set_visibility(id, false, true)?;
            }
            Mode::CursorFollow => {
                self.set_cursor_world_position(id, world, true)?;
            }
            Mode::RasterEdit => {
                let slice_index = {
                    let view = self.view(id)?;
                    view.slice_index(self.volume.as_ref().ok_or(Error::NoVolume)?)
                };
                let orientation = self.view(id)?.orientation();
                self.dispatcher
                    .begin_gesture(&self.rois, orientation, slice_index)?;
                self.edit_at(id, x, y)?;
            }
            _ => {}
        }
        Ok(mode)
    }

    fn edit_at(&mut self, id: ViewId, x: f32, y: f32) -> Result<bool> {
        let Some(voxel) = self.voxel_under(id, x, y)? else {
            return Ok(false);
        };
        let volume = self.volume.as_ref().ok_or(Error::NoVolume)?;
        let view = self
            .views
            .iter()
            .find(|view| view.id() == id)
            .ok_or(Error::UnknownView(id.raw()))?;
        let orientation = view.orientation();
        let slice_index = view.slice_index(volume);
        self.dispatcher.apply(
            &mut self.rois,
            volume,
            voxel,
            orientation,
            slice_index,
            self.progress.as_mut(),
        )
    }

    /// Pointer drag; `dx`/`dy` are display-pixel deltas since the last event.
    pub fn pointer_move(&mut self, id: ViewId, x: f32, y: f32, dx: f32, dy: f32) -> Result<()> {
        if self.active_view != Some(id) {
            return Ok(());
        }
        match self.interaction.mode() {
            Mode::Pan => {
                let volume = self.volume.as_ref().ok_or(Error::NoVolume)?;
                let view = Self::find_mut(&mut self.views, id)?;
                view.pan(volume, dx, dy);
                self.refresh_derived_geometry();
            }
            Mode::Zoom => {
                let view = Self::find_mut(&mut self.views, id)?;
                view.zoom(1.0 + dy * 0.01);
                self.refresh_derived_geometry();
            }
            Mode::WindowLevel => {
                let volume = self.volume.as_mut().ok_or(Error::NoVolume)?;
                let window = (volume.lut.window() + dx).max(1e-3);
                let level = volume.lut.level() + dy;
                volume.lut.set_window_level(window, level);
            }
            Mode::CursorFollow => {
                let volume = self.volume.as_ref().ok_or(Error::NoVolume)?;
                let view = self.view(id)?;
                let world = view.projection(volume).display_to_world(x, y);
                self.set_cursor_world_position(id, world, true)?;
            }
            Mode::ResliceCursorDrag(DragKind::Rotate) => {
                let view = Self::find_mut(&mut self.views, id)?;
                view.reslice_rotation_deg += dx * 0.5;
                self.refresh_derived_geometry();
            }
            Mode::ResliceCursorDrag(DragKind::Translate) => {
                let volume = self.volume.as_ref().ok_or(Error::NoVolume)?;
                let view = Self::find_mut(&mut self.views, id)?;
                let world = view.projection(volume).display_to_world(x, y);
                view.reslice_center = world;
                self.set_cursor_world_position(id, world, true)?;
            }
            Mode::RasterEdit => {
                self.update_brush_indicator(id, x, y)?;
                let _ = self.edit_at(id, x, y)?;
            }
            Mode::OverlayDrag(kind) => {
                let volume = self.volume.as_ref().ok_or(Error::NoVolume)?;
                let view = self.view(id)?;
                let Some(index) = view.overlays.len().checked_sub(1) else {
                    return Ok(());
                };
                let placement = &view.overlays[index].placement;
                let mut translation = placement.get_translations();
                let mut rotation = placement.get_rotations(true);
                let mut center = placement.center();
                let projection = view.projection(volume);
                match kind {
                    DragKind::Translate => {
                        // both points sit at the focal depth, so the delta
                        // is purely in-plane
                        let from = projection.display_to_world(x - dx, y - dy);
                        let to = projection.display_to_world(x, y);
                        for axis in 0..3 {
                            translation[axis] += to[axis] - from[axis];
                        }
                    }
                    DragKind::Rotate => {
                        rotation[view.orientation().through_axis()] += dx * 0.5;
                        center = view.reslice_center;
                    }
                }
                let mut transform = Transform::new(translation, rotation);
                transform.set_center(center);
                self.apply_transform(id, index, &transform, true)?;
            }
            Mode::CropBoxResize => {
                let Some(crop) = self.crop.clone() else {
                    return Ok(());
                };
                if let Some(world) = self.resized_box(id, &crop.world, x, y)? {
                    self.set_crop_box(id, world, crop.enabled)?;
                }
            }
            Mode::RegistrationBoxResize => {
                let Some(registration) = self.registration.clone() else {
                    return Ok(());
                };
                if let Some(world) = self.resized_box(id, &registration.world, x, y)? {
                    self.set_registration_box(id, world, registration.visible)?;
                }
            }
            Mode::Idle => {}
        }
        Ok(())
    }

    /// Project the box into the dragged view, pull its nearest corner onto
    /// the pointer and rebuild the world box. `None` when the rectangle
    /// would collapse; the caller keeps the previous box.
    fn resized_box(
        &self,
        id: ViewId,
        world: &WorldBox,
        x: f32,
        y: f32,
    ) -> Result<Option<WorldBox>> {
        let volume = self.volume.as_ref().ok_or(Error::NoVolume)?;
        let view = self.view(id)?;
        let projection = view.projection(volume);
        let (min_uv, max_uv) = world.viewport_rect(&projection);
        let uv = projection.display_to_normalized_viewport(x, y);
        let (min_uv, max_uv) = drag_rect_corner(min_uv, max_uv, uv);
        Ok(WorldBox::from_viewport_rect(&projection, volume, min_uv, max_uv).ok())
    }

    /// Pointer release: restore cursor state and close any edit gesture.
    pub fn pointer_up(&mut self, id: ViewId) -> Result<()> {
        let up = self.interaction.pointer_up();
        if let Some(visible) = up.restore_cursor {
            self.set_visibility(id, visible, true)?;
        }
        if up.edit_completed {
            self.dispatcher.end_gesture(&self.rois);
        }
        self.active_view = None;
        Ok(())
    }

    fn update_brush_indicator(&mut self, id: ViewId, x: f32, y: f32) -> Result<()> {
        let Some(mode) = self.dispatcher.mode() else {
            return Ok(());
        };
        if !matches!(mode, EditMode::Brush(_) | EditMode::ThresholdBrush(_)) {
            return Ok(());
        }
        let volume = self.volume.as_ref().ok_or(Error::NoVolume)?;
        let radius = self.dispatcher.settings.radius();
        let view = Self::find_mut(&mut self.views, id)?;
        let through = view.orientation().through_axis();
        let projection = view.projection(volume);
        let world_radius = radius as f32 * volume.spacing()[through];
        view.set_actor_geometry(
            ActorKey::BrushIndicator,
            ActorGeometry::Circle {
                center: [x, y],
                radius: world_radius / projection.world_per_pixel(),
            },
        );
        Ok(())
    }

    /// Scroll wheel on a view, `delta` in notches.
    pub fn wheel(&mut self, id: ViewId, delta: i32, modifiers: Modifiers) -> Result<()> {
        let brush_active = matches!(
            self.dispatcher.mode(),
            Some(EditMode::Brush(_) | EditMode::ThresholdBrush(_))
        );
        match classify_wheel(modifiers, brush_active) {
            WheelAction::SliceStep => self.step_slice(id, delta)?,
            WheelAction::Zoom => {
                let view = Self::find_mut(&mut self.views, id)?;
                view.zoom(if delta > 0 { 0.9 } else { 1.1 });
                self.refresh_derived_geometry();
            }
            WheelAction::BrushRadius => {
                self.dispatcher.settings.step_radius(delta);
            }
        }
        Ok(())
    }

    /// Arrow keys mirror the wheel.
    pub fn arrow(&mut self, id: ViewId, delta: i32, modifiers: Modifiers) -> Result<()> {
        match classify_arrow(modifiers) {
            WheelAction::SliceStep => self.step_slice(id, delta)?,
            WheelAction::Zoom => {
                let view = Self::find_mut(&mut self.views, id)?;
                view.zoom(if delta > 0 { 0.9 } else { 1.1 });
                self.refresh_derived_geometry();
            }
            WheelAction::BrushRadius => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit::BrushShape;
    use ndarray::Array3;

    fn session() -> Session {
        let volume = Volume::new(Array3::zeros((64, 64, 64)), [1.0; 3]);
        Session::new(volume)
    }

    #[test]
    fn missing_volume_is_a_precondition_error() {
        let mut session = Session::default();
        assert!(matches!(
            session.add_view(Orientation::Axial, [512, 512]),
            Err(Error::NoVolume)
        ));
        assert!(matches!(session.add_roi("r"), Err(Error::NoVolume)));
    }

    #[test]
    fn cursor_broadcast_reaches_every_other_view_once() {
        let mut session = session();
        let a = session.add_view(Orientation::Axial, [512, 512]).unwrap();
        let b = session.add_view(Orientation::Coronal, [512, 512]).unwrap();
        let c = session.add_view(Orientation::Sagittal, [512, 512]).unwrap();

        session
            .set_cursor_world_position(a, [10.0, 20.0, 30.0], true)
            .unwrap();
        assert_eq!(session.cursor().position(), [10.0, 20.0, 30.0]);
        for id in [a, b, c] {
            let view = session.view(id).unwrap();
            let (u, v) = view.orientation().in_plane_axes();
            let focal = view.camera.focal_point;
            assert_eq!(focal[u], session.cursor().position()[u]);
            assert_eq!(focal[v], session.cursor().position()[v]);
        }
    }

    #[test]
    fn sync_disabled_views_ignore_the_broadcast() {
        let mut session = session();
        let a = session.add_view(Orientation::Axial, [512, 512]).unwrap();
        let b = session.add_view(Orientation::Axial, [512, 512]).unwrap();
        session.view_mut(b).unwrap().sync_enabled = false;
        let before = session.view(b).unwrap().camera.focal_point;
        session
            .set_cursor_world_position(a, [5.0, 6.0, 7.0], true)
            .unwrap();
        assert_eq!(session.view(b).unwrap().camera.focal_point, before);
    }

    #[test]
    fn orientation_switch_leaves_the_world_cursor_unchanged() {
        let mut session = session();
        let id = session.add_view(Orientation::Axial, [512, 512]).unwrap();
        session
            .set_cursor_world_position(id, [32.0, 32.0, 32.0], true)
            .unwrap();
        let cursor_before = session.cursor().position();

        session.set_view_orientation(id, 1).unwrap();
        assert_eq!(session.cursor().position(), cursor_before);
        let view = session.view(id).unwrap();
        assert_eq!(view.orientation(), Orientation::Coronal);
        let (u, v) = view.orientation().in_plane_axes();
        assert_eq!(view.camera.focal_point[u], cursor_before[u]);
        assert_eq!(view.camera.focal_point[v], cursor_before[v]);
    }

    #[test]
    fn slice_offset_shifts_the_focal_depth() {
        let mut session = session();
        let id = session.add_view(Orientation::Axial, [512, 512]).unwrap();
        session.view_mut(id).unwrap().slice_offset = 3;
        session
            .set_cursor_world_position(id, [32.0, 32.0, 20.0], true)
            .unwrap();
        assert_eq!(session.view(id).unwrap().focal_depth(), 23.0);
    }

    #[test]
    fn raster_gesture_through_the_pointer_path() {
        let mut session = session();
        let id = session.add_view(Orientation::Axial, [512, 512]).unwrap();
        session.add_roi("lesion").unwrap();
        session.tool_flags.raster_edit = true;
        session
            .dispatcher
            .set_mode(Some(EditMode::Brush(BrushShape::Disk)));

        let mode = session
            .pointer_down(id, 256.0, 256.0, Modifiers::default())
            .unwrap();
        assert_eq!(mode, Mode::RasterEdit);
        session.pointer_up(id).unwrap();

        assert!(session.dispatcher.can_undo());
        let labeled: u32 = session
            .rois
            .active()
            .unwrap()
            .data
            .iter()
            .map(|&v| v as u32)
            .sum();
        assert!(labeled > 0);
        assert!(session.undo().unwrap());
        let labeled: u32 = session
            .rois
            .active()
            .unwrap()
            .data
            .iter()
            .map(|&v| v as u32)
            .sum();
        assert_eq!(labeled, 0);
    }

    #[test]
    fn opacity_is_validated() {
        let mut session = session();
        let id = session.add_view(Orientation::Axial, [512, 512]).unwrap();
        let overlay = Volume::new(Array3::zeros((32, 32, 32)), [1.0; 3]);
        let index = session.add_overlay(id, overlay).unwrap();
        assert!(matches!(
            session.set_opacity(id, index, 1.5, false),
            Err(Error::OpacityOutOfRange(_))
        ));
        session.set_opacity(id, index, 0.8, false).unwrap();
        assert_eq!(session.view(id).unwrap().overlays[index].opacity, 0.8);
    }

    #[test]
    fn removing_a_view_unregisters_it() {
        let mut session = session();
        let a = session.add_view(Orientation::Axial, [512, 512]).unwrap();
        let b = session.add_view(Orientation::Coronal, [512, 512]).unwrap();
        session.remove_view(a).unwrap();
        assert!(session.view(a).is_err());
        // the survivor still broadcasts without error
        session
            .set_cursor_world_position(b, [1.0, 2.0, 3.0], true)
            .unwrap();
    }

    #[test]
    fn crop_box_projects_into_every_view() {
        let mut session = session();
        let a = session.add_view(Orientation::Axial, [512, 512]).unwrap();
        let b = session.add_view(Orientation::Coronal, [512, 512]).unwrap();
        let world = WorldBox {
            origin: [10.0, 10.0, 10.0],
            extents: [20.0, 20.0, 20.0],
        };
        session.set_crop_box(a, world, true).unwrap();
        for id in [a, b] {
            let actor = session.view(id).unwrap().actor(ActorKey::CropBox).unwrap();
            assert!(actor.visible);
            assert!(matches!(actor.geometry, ActorGeometry::Rect { .. }));
        }
    }

    #[test]
    fn window_level_drag_recenters_the_lut() {
        let mut session = session();
        let id = session.add_view(Orientation::Axial, [512, 512]).unwrap();
        let shift = Modifiers {
            shift: true,
            ..Modifiers::default()
        };
        let mode = session.pointer_down(id, 100.0, 100.0, shift).unwrap();
        assert_eq!(mode, Mode::WindowLevel);
        let level_before = session.volume().unwrap().lut.level();
        session.pointer_move(id, 110.0, 120.0, 10.0, 20.0).unwrap();
        let level_after = session.volume().unwrap().lut.level();
        assert!((level_after - level_before - 20.0).abs() < 1e-3);
        session.pointer_up(id).unwrap();
    }

    #[test]
    fn crop_resize_drag_reshapes_the_box() {
        let mut session = session();
        let a = session.add_view(Orientation::Axial, [512, 512]).unwrap();
        session.tool_flags.crop_resize = true;
        let before = session.crop.as_ref().unwrap().world.clone();

        let mode = session
            .pointer_down(a, 400.0, 400.0, Modifiers::default())
            .unwrap();
        assert_eq!(mode, Mode::CropBoxResize);
        session.pointer_move(a, 320.0, 320.0, -80.0, -80.0).unwrap();
        session.pointer_up(a).unwrap();

        let after = &session.crop.as_ref().unwrap().world;
        assert_ne!(*after, before);
        // nearest corner pulled onto the pointer at 0.625 of the viewport
        assert!((after.extents[0] - 40.0).abs() < 1e-2);
        assert!((after.extents[1] - 40.0).abs() < 1e-2);
        // through-plane pair stays pinned to the full field of view
        assert_eq!(after.extents[2], 64.0);
    }

    #[test]
    fn registration_resize_drag_reshapes_the_box() {
        let mut session = session();
        let a = session.add_view(Orientation::Axial, [512, 512]).unwrap();
        session.tool_flags.registration_resize = true;
        let before = session.registration.as_ref().unwrap().world.clone();

        let mode = session
            .pointer_down(a, 400.0, 400.0, Modifiers::default())
            .unwrap();
        assert_eq!(mode, Mode::RegistrationBoxResize);
        session.pointer_move(a, 320.0, 320.0, -80.0, -80.0).unwrap();
        session.pointer_up(a).unwrap();

        let registration = session.registration.as_ref().unwrap();
        assert_ne!(registration.world, before);
        assert!((registration.world.extents[0] - 40.0).abs() < 1e-2);
        // visibility is preserved across the resize
        assert!(!registration.visible);
    }

    #[test]
    fn overlay_drag_near_the_center_translates_the_placement() {
        let mut session = session();
        let a = session.add_view(Orientation::Axial, [512, 512]).unwrap();
        let moving = Volume::new(Array3::zeros((64, 64, 64)), [1.0; 3]);
        let index = session.add_overlay(a, moving).unwrap();
        let overlay_id = session.view(a).unwrap().overlays[index].volume.id();
        session.tool_flags.overlay_drag = true;

        let mode = session
            .pointer_down(a, 260.0, 256.0, Modifiers::default())
            .unwrap();
        assert_eq!(mode, Mode::OverlayDrag(DragKind::Translate));
        // 80 px at 0.125 world units per pixel
        session.pointer_move(a, 340.0, 256.0, 80.0, 0.0).unwrap();
        session.pointer_up(a).unwrap();

        let placement = &session.view(a).unwrap().overlays[index].placement;
        let t = placement.get_translations();
        assert!((t[0].abs() - 10.0).abs() < 1e-2);
        assert_eq!(t[1], 0.0);
        assert_eq!(t[2], 0.0);
        // inverse recorded on the reference for probing
        assert!(session.volume().unwrap().has_transform(overlay_id));
    }

    #[test]
    fn overlay_drag_far_from_the_center_rotates_the_placement() {
        let mut session = session();
        let a = session.add_view(Orientation::Axial, [512, 512]).unwrap();
        let moving = Volume::new(Array3::zeros((64, 64, 64)), [1.0; 3]);
        let index = session.add_overlay(a, moving).unwrap();
        session.tool_flags.overlay_drag = true;

        let mode = session
            .pointer_down(a, 500.0, 256.0, Modifiers::default())
            .unwrap();
        assert_eq!(mode, Mode::OverlayDrag(DragKind::Rotate));
        session.pointer_move(a, 540.0, 256.0, 40.0, 0.0).unwrap();
        session.pointer_up(a).unwrap();

        let placement = &session.view(a).unwrap().overlays[index].placement;
        let rotation = placement.get_rotations(true);
        assert!((rotation[2] - 20.0).abs() < 1e-3);
        assert_eq!(rotation[0], 0.0);
        assert_eq!(rotation[1], 0.0);
    }

    #[test]
    fn reslice_indicator_follows_the_rotation_drag() {
        let mut session = session();
        let a = session.add_view(Orientation::Axial, [512, 512]).unwrap();
        session.tool_flags.reslice_drag = true;

        let mode = session
            .pointer_down(a, 500.0, 256.0, Modifiers::default())
            .unwrap();
        assert_eq!(mode, Mode::ResliceCursorDrag(DragKind::Rotate));
        session.pointer_move(a, 520.0, 256.0, 20.0, 0.0).unwrap();
        session.pointer_up(a).unwrap();

        let actor = session
            .view(a)
            .unwrap()
            .actor(ActorKey::ResliceIndicator)
            .unwrap();
        assert!(actor.visible);
        match &actor.geometry {
            ActorGeometry::Lines(segments) => {
                assert_eq!(segments.len(), 2);
                // a 10 degree rotation tilts the first line off the axis
                assert!((segments[0][0][1] - segments[0][1][1]).abs() > 1.0);
            }
            other => panic!("expected lines, got {other:?}"),
        }
    }
}
