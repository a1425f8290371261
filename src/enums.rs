use crate::error::Error;

/// Principal cutting plane through a volume, independent of how the volume is
/// stored. Indices follow the conventional ordering: 0 = Axial, 1 = Coronal,
/// 2 = Sagittal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Orientation {
    #[default]
    Axial,
    Coronal,
    Sagittal,
}

impl Orientation {
    pub fn from_index(index: usize) -> Result<Self, Error> {
        match index {
            0 => Ok(Orientation::Axial),
            1 => Ok(Orientation::Coronal),
            2 => Ok(Orientation::Sagittal),
            _ => Err(Error::InvalidOrientation(index)),
        }
    }

    pub fn index(self) -> usize {
        match self {
            Orientation::Axial => 0,
            Orientation::Coronal => 1,
            Orientation::Sagittal => 2,
        }
    }

    /// World axis (x = 0, y = 1, z = 2) perpendicular to the cutting plane.
    pub fn through_axis(self) -> usize {
        match self {
            Orientation::Axial => 2,
            Orientation::Coronal => 1,
            Orientation::Sagittal => 0,
        }
    }

    /// In-plane world axes as (horizontal, vertical) of the displayed slice.
    pub fn in_plane_axes(self) -> (usize, usize) {
        match self {
            Orientation::Axial => (0, 1),
            Orientation::Coronal => (0, 2),
            Orientation::Sagittal => (1, 2),
        }
    }

    /// Orientation whose through-plane axis is the given world axis.
    pub fn from_through_axis(axis: usize) -> Result<Self, Error> {
        match axis {
            2 => Ok(Orientation::Axial),
            1 => Ok(Orientation::Coronal),
            0 => Ok(Orientation::Sagittal),
            _ => Err(Error::InvalidOrientation(axis)),
        }
    }

    /// Unit normal of the cutting plane, pointing toward the camera.
    pub fn normal(self) -> [f32; 3] {
        let mut n = [0.0; 3];
        n[self.through_axis()] = 1.0;
        n
    }

    /// Fixed up-vector of the displayed slice.
    pub fn view_up(self) -> [f32; 3] {
        match self {
            Orientation::Axial => [0.0, 1.0, 0.0],
            Orientation::Coronal => [0.0, 0.0, 1.0],
            Orientation::Sagittal => [0.0, 0.0, 1.0],
        }
    }
}

/// Rounding policy for world-to-voxel conversion of the cursor.
///
/// `Rounded` snaps every component to the nearest voxel. `SubVoxel` keeps the
/// in-plane components fractional and snaps only the through-plane component
/// to the displayed slice.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CursorRounding {
    #[default]
    Rounded,
    SubVoxel,
}

/// Raster codec used by the slice-series export.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CaptureFormat {
    #[default]
    Png,
    Jpeg,
    Bmp,
    Tiff,
}

impl CaptureFormat {
    pub fn extension(self) -> &'static str {
        match self {
            CaptureFormat::Png => "png",
            CaptureFormat::Jpeg => "jpg",
            CaptureFormat::Bmp => "bmp",
            CaptureFormat::Tiff => "tiff",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orientation_index_round_trip() {
        for index in 0..3 {
            assert_eq!(Orientation::from_index(index).unwrap().index(), index);
        }
        assert!(Orientation::from_index(3).is_err());
    }

    #[test]
    fn axes_partition_the_world() {
        for orientation in [
            Orientation::Axial,
            Orientation::Coronal,
            Orientation::Sagittal,
        ] {
            let (u, v) = orientation.in_plane_axes();
            let w = orientation.through_axis();
            let mut axes = [u, v, w];
            axes.sort_unstable();
            assert_eq!(axes, [0, 1, 2]);
        }
    }
}
