//! # Multi-planar slice viewing and voxel-raster editing
//!
//! This crate provides the core of a synchronized multi-view 2D slice
//! renderer and an interactive label-raster ("ROI") editing engine for 3D
//! scalar volumes.

//!
//! A [`Session`] owns one reference [`Volume`] and any number of [`View`]s,
//! each slicing the volume along one of the three medical axes:
//!  - Axial
//!  - Coronal
//!  - Sagittal
//!
//! Views stay consistent through a synchronization bus: moving the shared
//! cursor, panning the camera plane or changing overlay state in one view is
//! fanned out synchronously to every other registered view, with an explicit
//! broadcast flag preventing echo. Secondary volumes can be attached as
//! overlays and are placed through a fixed alignment priority chain
//! (registration link, origin alignment, center alignment, identity).
//!
//! Label rasters are edited through a dispatcher of mutually-exclusive
//! [`EditMode`]s covering brushes, binary morphology, connected-component
//! (blob) operators, flood fill, region and confidence-connected growing,
//! Euclidean expand/shrink and an active contour, all backed by a
//! slice-or-volume undo/redo log. Slices composite to images in parallel
//! using rayon and can be exported as numbered capture series.
//!
//!  Contributions are highly welcome!
//!
//! # Examples
//!
//! ## Painting a sphere through the pointer path
//!
//! ```no_run
//! # use mpr_view::{Session, Volume, Orientation, EditMode, BrushShape, Modifiers};
//! # use ndarray::Array3;
//! let volume = Volume::new(Array3::zeros((64, 64, 64)), [1.0, 1.0, 1.0]);
//! let mut session = Session::new(volume);
//! let view = session
//!     .add_view(Orientation::Axial, [512, 512])
//!     .expect("volume is attached");
//! session.add_roi("lesion").expect("name is unique");
//! session.tool_flags.raster_edit = true;
//! session
//!     .dispatcher
//!     .set_mode(Some(EditMode::Brush(BrushShape::Sphere)));
//! session
//!     .pointer_down(view, 256.0, 256.0, Modifiers::default())
//!     .expect("view exists");
//! session.pointer_up(view).expect("view exists");
//! ```

pub mod boxes;
pub mod camera;
pub mod capture;
pub mod coords;
pub mod cursor;
pub mod edit;
pub mod enums;
pub mod error;
pub mod history;
pub mod interaction;
pub mod overlay;
pub mod progress;
pub mod raster;
pub mod render;
pub mod roi;
pub mod session;
pub mod sync;
pub mod tools;
pub mod transform;
pub mod view;
pub mod volume;

pub use boxes::{CropBox, RegistrationBox, WorldBox};
pub use camera::{Camera, OrientationController};
pub use capture::{CaptureOptions, export_series};
pub use coords::SliceProjection;
pub use cursor::Cursor;
pub use edit::{BrushShape, Dim, EditMode, RasterDispatcher};
pub use enums::{CaptureFormat, CursorRounding, Orientation};
pub use error::{Error, Result};
pub use interaction::{Mode, Modifiers, ToolFlags};
pub use overlay::Overlay;
pub use progress::{LogProgress, NullProgress, ProgressReporter};
pub use roi::{Roi, RoiSet};
pub use session::{Session, ViewSettings};
pub use sync::{SyncBus, SyncEvent};
pub use tools::{MarkerSet, ToolMarker};
pub use transform::Transform;
pub use view::{View, ViewId};
pub use volume::Volume;
