/// Modifier keys held during a pointer or key event.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Modifiers {
    /// Control on most platforms, command on macOS.
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
}

/// Persistent tool flags toggled from the toolbar. At most one is expected
/// to be set; the pointer-down priority order settles ties.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ToolFlags {
    pub move_tool: bool,
    pub reslice_drag: bool,
    pub overlay_drag: bool,
    pub crop_resize: bool,
    pub registration_resize: bool,
    pub raster_edit: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DragKind {
    Translate,
    Rotate,
}

/// Active interaction mode of a view, mutually exclusive by construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Idle,
    CursorFollow,
    Pan,
    Zoom,
    WindowLevel,
    ResliceCursorDrag(DragKind),
    OverlayDrag(DragKind),
    CropBoxResize,
    RegistrationBoxResize,
    RasterEdit,
}

/// Fraction of the field of view below which a drag near the rotation
/// center translates instead of rotating.
pub const TRANSLATE_FRACTION: f32 = 0.25;

fn classify_drag(distance_to_center: f32, fov_extent: f32) -> DragKind {
    if distance_to_center < fov_extent * TRANSLATE_FRACTION {
        DragKind::Translate
    } else {
        DragKind::Rotate
    }
}

/// Pointer-down mode selection.
///
/// Modifier keys win over persistent tool flags; the remaining order is
/// fixed. `distance_to_center` and `fov_extent` are in world units and only
/// consulted for the translate-versus-rotate split.
pub fn classify_pointer_down(
    modifiers: Modifiers,
    flags: ToolFlags,
    distance_to_center: f32,
    fov_extent: f32,
) -> Mode {
    if modifiers.ctrl {
        Mode::Zoom
    } else if modifiers.alt {
        Mode::Pan
    } else if modifiers.shift {
        Mode::WindowLevel
    } else if flags.move_tool {
        Mode::Pan
    } else if flags.reslice_drag {
        Mode::ResliceCursorDrag(classify_drag(distance_to_center, fov_extent))
    } else if flags.overlay_drag {
        Mode::OverlayDrag(classify_drag(distance_to_center, fov_extent))
    } else if flags.crop_resize {
        Mode::CropBoxResize
    } else if flags.registration_resize {
        Mode::RegistrationBoxResize
    } else if flags.raster_edit {
        Mode::RasterEdit
    } else {
        Mode::CursorFollow
    }
}

/// What the scroll wheel controls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WheelAction {
    SliceStep,
    Zoom,
    BrushRadius,
}

/// Plain wheel slices; the zoom modifier rescales; the alternate modifier
/// resizes the brush while a raster brush is active.
pub fn classify_wheel(modifiers: Modifiers, brush_active: bool) -> WheelAction {
    if modifiers.ctrl {
        WheelAction::Zoom
    } else if brush_active && modifiers.alt {
        WheelAction::BrushRadius
    } else {
        WheelAction::SliceStep
    }
}

/// Arrow keys mirror the wheel, minus the brush shortcut.
pub fn classify_arrow(modifiers: Modifiers) -> WheelAction {
    if modifiers.ctrl {
        WheelAction::Zoom
    } else {
        WheelAction::SliceStep
    }
}

/// Effects the caller must apply after a pointer-up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PointerUp {
    /// Cursor visibility to restore.
    pub restore_cursor: Option<bool>,
    /// A raster edit gesture completed; close it on the dispatcher.
    pub edit_completed: bool,
}

/// Per-view interaction state between pointer-down and pointer-up.
#[derive(Debug, Default)]
pub struct InteractionState {
    mode: Option<Mode>,
    cursor_before: Option<bool>,
}

impl InteractionState {
    pub fn mode(&self) -> Mode {
        self.mode.unwrap_or(Mode::Idle)
    }

    pub fn is_dragging(&self) -> bool {
        self.mode.is_some()
    }

    /// Enter the mode selected for this press. The cursor is hidden while
    /// rotating the reslice cursor and restored on release.
    pub fn pointer_down(
        &mut self,
        modifiers: Modifiers,
        flags: ToolFlags,
        distance_to_center: f32,
        fov_extent: f32,
        cursor_visible: bool,
    ) -> Mode {
        let mode = classify_pointer_down(modifiers, flags, distance_to_center, fov_extent);
        if mode == Mode::ResliceCursorDrag(DragKind::Rotate) {
            self.cursor_before = Some(cursor_visible);
        }
        self.mode = Some(mode);
        mode
    }

    pub fn pointer_up(&mut self) -> PointerUp {
        let mode = self.mode.take();
        PointerUp {
            restore_cursor: self.cursor_before.take(),
            edit_completed: mode == Some(Mode::RasterEdit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modifier_priority_order() {
        let all = Modifiers {
            ctrl: true,
            alt: true,
            shift: true,
        };
        let flags = ToolFlags {
            raster_edit: true,
            ..ToolFlags::default()
        };
        assert_eq!(classify_pointer_down(all, flags, 0.0, 64.0), Mode::Zoom);
        let alt_shift = Modifiers {
            alt: true,
            shift: true,
            ..Modifiers::default()
        };
        assert_eq!(classify_pointer_down(alt_shift, flags, 0.0, 64.0), Mode::Pan);
        let shift = Modifiers {
            shift: true,
            ..Modifiers::default()
        };
        assert_eq!(
            classify_pointer_down(shift, flags, 0.0, 64.0),
            Mode::WindowLevel
        );
        // no modifier: the persistent flag decides
        assert_eq!(
            classify_pointer_down(Modifiers::default(), flags, 0.0, 64.0),
            Mode::RasterEdit
        );
        assert_eq!(
            classify_pointer_down(Modifiers::default(), ToolFlags::default(), 0.0, 64.0),
            Mode::CursorFollow
        );
    }

    #[test]
    fn reslice_drag_splits_on_quarter_fov() {
        let flags = ToolFlags {
            reslice_drag: true,
            ..ToolFlags::default()
        };
        assert_eq!(
            classify_pointer_down(Modifiers::default(), flags, 15.0, 64.0),
            Mode::ResliceCursorDrag(DragKind::Translate)
        );
        assert_eq!(
            classify_pointer_down(Modifiers::default(), flags, 17.0, 64.0),
            Mode::ResliceCursorDrag(DragKind::Rotate)
        );
    }

    #[test]
    fn rotation_hides_the_cursor_until_release() {
        let flags = ToolFlags {
            reslice_drag: true,
            ..ToolFlags::default()
        };
        let mut state = InteractionState::default();
        let mode = state.pointer_down(Modifiers::default(), flags, 50.0, 64.0, true);
        assert_eq!(mode, Mode::ResliceCursorDrag(DragKind::Rotate));
        let up = state.pointer_up();
        assert_eq!(up.restore_cursor, Some(true));
        assert!(!up.edit_completed);
        assert_eq!(state.mode(), Mode::Idle);
    }

    #[test]
    fn raster_gesture_signals_completion() {
        let flags = ToolFlags {
            raster_edit: true,
            ..ToolFlags::default()
        };
        let mut state = InteractionState::default();
        state.pointer_down(Modifiers::default(), flags, 0.0, 64.0, true);
        assert_eq!(state.mode(), Mode::RasterEdit);
        let up = state.pointer_up();
        assert!(up.edit_completed);
        assert_eq!(up.restore_cursor, None);
    }

    #[test]
    fn wheel_classification() {
        let ctrl = Modifiers {
            ctrl: true,
            ..Modifiers::default()
        };
        let alt = Modifiers {
            alt: true,
            ..Modifiers::default()
        };
        assert_eq!(classify_wheel(Modifiers::default(), false), WheelAction::SliceStep);
        assert_eq!(classify_wheel(ctrl, true), WheelAction::Zoom);
        assert_eq!(classify_wheel(alt, true), WheelAction::BrushRadius);
        assert_eq!(classify_wheel(alt, false), WheelAction::SliceStep);
        assert_eq!(classify_arrow(ctrl), WheelAction::Zoom);
        assert_eq!(classify_arrow(alt), WheelAction::SliceStep);
    }
}
