use crate::enums::CursorRounding;
use crate::volume::Volume;

/// The single 3D world point conceptually shared by all views of a volume.
///
/// Mutated locally by the owning view and re-broadcast through the bus; the
/// stored point is snapped to voxel centers when the rounded-cursor toggle is
/// on.
#[derive(Clone, Debug)]
pub struct Cursor {
    position: [f32; 3],
    pub rounding: CursorRounding,
}

impl Cursor {
    pub fn new(position: [f32; 3]) -> Self {
        Self {
            position,
            rounding: CursorRounding::default(),
        }
    }

    pub fn position(&self) -> [f32; 3] {
        self.position
    }

    pub fn set_world_position(&mut self, p: [f32; 3], volume: &Volume) {
        self.position = match self.rounding {
            CursorRounding::Rounded => {
                let voxel = volume.world_to_voxel_continuous(p).map(f32::round);
                volume.voxel_to_world(voxel)
            }
            CursorRounding::SubVoxel => p,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn rounded_cursor_snaps_to_voxel_centers() {
        let volume = Volume::new(Array3::zeros((16, 16, 16)), [2.0, 2.0, 2.0]);
        let mut cursor = Cursor::new([0.0; 3]);
        cursor.set_world_position([3.1, 4.9, 6.0], &volume);
        assert_eq!(cursor.position(), [4.0, 4.0, 6.0]);

        cursor.rounding = CursorRounding::SubVoxel;
        cursor.set_world_position([3.1, 4.9, 6.0], &volume);
        assert_eq!(cursor.position(), [3.1, 4.9, 6.0]);
    }
}
