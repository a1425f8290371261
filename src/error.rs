use thiserror::Error;

/// Crate-wide error taxonomy.
///
/// Invalid-argument variants abort only the offending call; missing-
/// precondition variants perform no mutation. Geometric degeneracy during an
/// edit is downgraded to a logged no-op at the dispatch layer and never
/// reaches the raster.
#[derive(Debug, Error)]
pub enum Error {
    #[error("orientation index {0} is outside {{0, 1, 2}}")]
    InvalidOrientation(usize),

    #[error("opacity {0} is outside [0, 1]")]
    OpacityOutOfRange(f32),

    #[error("brush radius must be at least 1, got {0}")]
    InvalidBrushRadius(u32),

    #[error("no volume attached")]
    NoVolume,

    #[error("no active ROI")]
    NoActiveRoi,

    #[error("ROI '{0}' does not exist")]
    UnknownRoi(String),

    #[error("ROI name '{0}' is already in use")]
    DuplicateRoiName(String),

    #[error("no overlay at index {0}")]
    NoOverlay(usize),

    #[error("marker '{0}' does not exist")]
    UnknownMarker(String),

    #[error("view {0} is not registered")]
    UnknownView(usize),

    #[error("degenerate region: {0}")]
    DegenerateRegion(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, Error>;
