use std::path::PathBuf;

use mpr_view::{
    BrushShape, CaptureOptions, EditMode, Modifiers, Orientation, Session, Volume, export_series,
};
use ndarray::Array3;

/// Synthetic sphere phantom: bright ball in a dark box.
fn phantom(size: usize) -> Volume {
    let c = size as f32 / 2.0;
    let r2 = (size as f32 / 4.0).powi(2);
    let data = Array3::from_shape_fn((size, size, size), |(z, y, x)| {
        let d2 = (x as f32 - c).powi(2) + (y as f32 - c).powi(2) + (z as f32 - c).powi(2);
        if d2 <= r2 { 100.0 } else { 10.0 }
    });
    Volume::new(data, [1.0, 1.0, 1.0])
}

fn main() {
    env_logger::init();

    let mut session = Session::new(phantom(64));
    let axial = session
        .add_view(Orientation::Axial, [512, 512])
        .expect("volume is attached");
    let _coronal = session
        .add_view(Orientation::Coronal, [512, 512])
        .expect("volume is attached");

    session.add_roi("lesion").expect("name is unique");
    session.tool_flags.raster_edit = true;
    session
        .dispatcher
        .set_mode(Some(EditMode::Brush(BrushShape::Sphere)));
    session
        .dispatcher
        .settings
        .set_radius(6)
        .expect("radius is valid");

    // paint a sphere at the view center and keep it
    session
        .pointer_down(axial, 256.0, 256.0, Modifiers::default())
        .expect("view exists");
    session.pointer_up(axial).expect("view exists");

    let volume = session.volume().expect("volume is attached");
    let overlays = &session.view(axial).expect("view exists").overlays;
    let written = export_series(
        volume,
        Orientation::Axial,
        overlays,
        &session.rois,
        session.crop.as_ref(),
        &PathBuf::from("capture/phantom.png"),
        CaptureOptions::default(),
    )
    .expect("capture directory is writable");
    println!("wrote {} slice captures", written.len());
}
