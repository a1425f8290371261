use image::{ImageBuffer, Luma, Rgba, RgbaImage};
use ndarray::Array3;
use rayon::prelude::*;

use crate::boxes::CropBox;
use crate::enums::Orientation;
use crate::overlay::Overlay;
use crate::raster::{plane_coords, voxel_from_plane};
use crate::roi::RoiSet;
use crate::view::{ActorGeometry, ActorKey, View};
use crate::volume::Volume;

/// Window/level mapping from scalar values to 8-bit display intensity.
#[derive(Clone, Debug, PartialEq)]
pub struct LookupTable {
    window_min: f32,
    window_max: f32,
}

impl LookupTable {
    pub fn new(window_min: f32, window_max: f32) -> Self {
        Self {
            window_min,
            window_max: window_max.max(window_min),
        }
    }

    /// Full-range table covering the data's scalar extent.
    pub fn from_data(data: &Array3<f32>) -> Self {
        let mut min = f32::MAX;
        let mut max = f32::MIN;
        for &v in data.iter() {
            min = min.min(v);
            max = max.max(v);
        }
        if min > max {
            (min, max) = (0.0, 1.0);
        }
        Self::new(min, max)
    }

    pub fn window(&self) -> f32 {
        self.window_max - self.window_min
    }

    pub fn level(&self) -> f32 {
        (self.window_max + self.window_min) / 2.0
    }

    /// Re-center the table; used by the window/level pointer drag.
    pub fn set_window_level(&mut self, window: f32, level: f32) {
        let half = window.abs().max(1e-6) / 2.0;
        self.window_min = level - half;
        self.window_max = level + half;
    }

    pub fn map(&self, value: f32) -> u8 {
        let span = self.window_max - self.window_min;
        if span <= 0.0 {
            return 0;
        }
        (((value - self.window_min) / span).clamp(0.0, 1.0) * 255.0) as u8
    }
}

/// Grayscale image of one axis-aligned slice through the lookup table.
pub fn slice_to_image(
    volume: &Volume,
    orientation: Orientation,
    index: usize,
) -> Option<ImageBuffer<Luma<u8>, Vec<u8>>> {
    let slice = volume.get_slice_from_axis(index, orientation)?;
    let (height, width) = slice.dim();
    let pixel_data: Vec<u8> = slice.into_par_iter().map(|&v| volume.lut.map(v)).collect();
    ImageBuffer::from_raw(width as u32, height as u32, pixel_data)
}

fn blend(base: [u8; 3], color: [u8; 3], alpha: f32) -> [u8; 3] {
    let a = alpha.clamp(0.0, 1.0);
    [
        (base[0] as f32 * (1.0 - a) + color[0] as f32 * a) as u8,
        (base[1] as f32 * (1.0 - a) + color[1] as f32 * a) as u8,
        (base[2] as f32 * (1.0 - a) + color[2] as f32 * a) as u8,
    ]
}

fn in_window(window: [usize; 6], voxel: [usize; 3]) -> bool {
    (0..3).all(|axis| voxel[axis] >= window[axis * 2] && voxel[axis] <= window[axis * 2 + 1])
}

/// Composite one slice: reference grayscale, overlays in layer order, then
/// ROI color blending.
///
/// With an enabled crop box the overlays are blended only inside its voxel
/// window; the reference shows through outside it.
pub fn compose_slice(
    volume: &Volume,
    orientation: Orientation,
    index: usize,
    overlays: &[Overlay],
    rois: &RoiSet,
    crop: Option<&CropBox>,
) -> Option<RgbaImage> {
    let slice = volume.get_slice_from_axis(index, orientation)?;
    let (height, width) = slice.dim();

    let mut layered: Vec<&Overlay> = overlays.iter().filter(|o| o.visible).collect();
    layered.sort_by_key(|o| o.layer);
    let placements: Vec<_> = layered
        .iter()
        .map(|o| o.placement.get_inverse_transform())
        .collect();
    let window = crop
        .filter(|c| c.enabled)
        .map(|c| c.world.voxel_window(volume));

    let pixel_data: Vec<u8> = (0..height)
        .into_par_iter()
        .flat_map(|row| {
            let mut line = Vec::with_capacity(width * 4);
            for col in 0..width {
                let voxel = voxel_from_plane(orientation, index, row, col);
                let gray = volume.lut.map(slice[[row, col]]);
                let mut rgb = [gray; 3];

                let overlay_allowed = window.map_or(true, |w| in_window(w, voxel));
                if overlay_allowed {
                    let world = volume.voxel_to_world([
                        voxel[0] as f32,
                        voxel[1] as f32,
                        voxel[2] as f32,
                    ]);
                    for (overlay, inverse) in layered.iter().zip(placements.iter()) {
                        let mapped = inverse.apply_to_point(world);
                        if let Some(value) = overlay.volume.value_at_world(mapped) {
                            let gray = overlay.volume.lut.map(value);
                            rgb = blend(rgb, [gray; 3], overlay.opacity);
                        }
                    }
                }

                for roi in rois.iter().filter(|r| r.visible) {
                    if roi.data[[voxel[2], voxel[1], voxel[0]]] != 0 {
                        rgb = blend(rgb, roi.color, roi.opacity);
                    }
                }

                line.extend_from_slice(&[rgb[0], rgb[1], rgb[2], 255]);
            }
            line
        })
        .collect();

    RgbaImage::from_raw(width as u32, height as u32, pixel_data)
}

const CURSOR_COLOR: Rgba<u8> = Rgba([0, 255, 0, 255]);
const INDICATOR_COLOR: Rgba<u8> = Rgba([255, 255, 0, 255]);
const BOX_COLOR: Rgba<u8> = Rgba([0, 255, 255, 255]);

fn put(image: &mut RgbaImage, x: i64, y: i64, color: Rgba<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < image.width() && (y as u32) < image.height() {
        image.put_pixel(x as u32, y as u32, color);
    }
}

fn draw_segment(image: &mut RgbaImage, a: [f32; 2], b: [f32; 2], color: Rgba<u8>) {
    let steps = ((b[0] - a[0]).abs().max((b[1] - a[1]).abs()).ceil() as usize).max(1);
    for s in 0..=steps {
        let t = s as f32 / steps as f32;
        let x = a[0] + (b[0] - a[0]) * t;
        let y = a[1] + (b[1] - a[1]) * t;
        put(image, x.round() as i64, y.round() as i64, color);
    }
}

fn draw_geometry(
    image: &mut RgbaImage,
    geometry: &ActorGeometry,
    color: Rgba<u8>,
    to_px: &dyn Fn([f32; 2]) -> [f32; 2],
) {
    match geometry {
        ActorGeometry::Cross { center } => {
            let c = to_px(*center);
            draw_segment(image, [c[0] - 6.0, c[1]], [c[0] + 6.0, c[1]], color);
            draw_segment(image, [c[0], c[1] - 6.0], [c[0], c[1] + 6.0], color);
        }
        ActorGeometry::Circle { center, radius } => {
            let c = to_px(*center);
            let edge = to_px([center[0] + radius, center[1]]);
            let r = (edge[0] - c[0]).abs().max(1.0);
            let steps = (r * 8.0) as usize + 8;
            let mut prev = [c[0] + r, c[1]];
            for s in 1..=steps {
                let angle = s as f32 / steps as f32 * std::f32::consts::TAU;
                let next = [c[0] + r * angle.cos(), c[1] + r * angle.sin()];
                draw_segment(image, prev, next, color);
                prev = next;
            }
        }
        ActorGeometry::Rect {
            min,
            max,
            rotation_deg,
        } => {
            let center = [(min[0] + max[0]) / 2.0, (min[1] + max[1]) / 2.0];
            let (sin, cos) = rotation_deg.to_radians().sin_cos();
            let corner = |x: f32, y: f32| {
                let dx = x - center[0];
                let dy = y - center[1];
                to_px([
                    center[0] + dx * cos - dy * sin,
                    center[1] + dx * sin + dy * cos,
                ])
            };
            let corners = [
                corner(min[0], min[1]),
                corner(max[0], min[1]),
                corner(max[0], max[1]),
                corner(min[0], max[1]),
            ];
            for i in 0..4 {
                draw_segment(image, corners[i], corners[(i + 1) % 4], color);
            }
        }
        ActorGeometry::Lines(segments) => {
            for [a, b] in segments {
                draw_segment(image, to_px(*a), to_px(*b), color);
            }
        }
    }
}

/// Composite the view's displayed slice and draw its visible actors on top.
pub fn render_view(
    volume: &Volume,
    view: &View,
    rois: &RoiSet,
    crop: Option<&CropBox>,
) -> Option<RgbaImage> {
    let orientation = view.orientation();
    let index = view.slice_index(volume);
    let mut image = compose_slice(volume, orientation, index, &view.overlays, rois, crop)?;

    let projection = view.projection(volume);
    let to_px = |display: [f32; 2]| -> [f32; 2] {
        let voxel = projection.display_to_voxel(display[0], display[1]);
        let [row, col] = plane_coords(
            orientation,
            [
                voxel[0].max(0.0) as usize,
                voxel[1].max(0.0) as usize,
                voxel[2].max(0.0) as usize,
            ],
        );
        [col as f32, row as f32]
    };

    for (key, color) in [
        (ActorKey::CropBox, BOX_COLOR),
        (ActorKey::RegistrationBox, BOX_COLOR),
        (ActorKey::Isolines, INDICATOR_COLOR),
        (ActorKey::BrushIndicator, INDICATOR_COLOR),
        (ActorKey::ResliceIndicator, CURSOR_COLOR),
        (ActorKey::Cursor, CURSOR_COLOR),
    ] {
        if key == ActorKey::Cursor && !view.cursor_visible {
            continue;
        }
        if let Some(actor) = view.actor(key) {
            if actor.visible {
                draw_geometry(&mut image, &actor.geometry, color, &to_px);
            }
        }
    }
    Some(image)
}
