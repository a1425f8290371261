use crate::coords::SliceProjection;
use crate::error::{Error, Result};

/// Marker geometry in world coordinates.
#[derive(Clone, Debug, PartialEq)]
pub enum MarkerGeometry {
    Point([f32; 3]),
    /// Trajectory defined by an entry and a target point.
    Line {
        entry: [f32; 3],
        target: [f32; 3],
    },
}

/// Named point or trajectory marker. Lifecycle independent of ROIs.
#[derive(Clone, Debug)]
pub struct ToolMarker {
    pub name: String,
    pub geometry: MarkerGeometry,
    pub color: [u8; 3],
    pub visible: bool,
}

impl ToolMarker {
    pub fn point(name: impl Into<String>, position: [f32; 3]) -> Self {
        Self {
            name: name.into(),
            geometry: MarkerGeometry::Point(position),
            color: [255, 128, 0],
            visible: true,
        }
    }

    pub fn line(name: impl Into<String>, entry: [f32; 3], target: [f32; 3]) -> Self {
        Self {
            name: name.into(),
            geometry: MarkerGeometry::Line { entry, target },
            color: [255, 128, 0],
            visible: true,
        }
    }
}

#[derive(Default)]
pub struct MarkerSet {
    markers: Vec<ToolMarker>,
}

impl MarkerSet {
    pub fn add(&mut self, marker: ToolMarker) {
        self.markers.push(marker);
    }

    pub fn remove(&mut self, name: &str) -> Result<ToolMarker> {
        let index = self
            .markers
            .iter()
            .position(|marker| marker.name == name)
            .ok_or_else(|| Error::UnknownMarker(name.to_string()))?;
        Ok(self.markers.remove(index))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ToolMarker> {
        self.markers.iter()
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Display-space segments of the visible markers near the cutting plane.
    ///
    /// A marker contributes when its through-plane distance to the focal
    /// depth is within `tolerance` world units; points become small crosses.
    pub fn display_segments(
        &self,
        projection: &SliceProjection,
        focal_depth: f32,
        tolerance: f32,
    ) -> Vec<[[f32; 2]; 2]> {
        let through = projection.orientation().through_axis();
        let mut segments = Vec::new();
        for marker in self.markers.iter().filter(|m| m.visible) {
            match &marker.geometry {
                MarkerGeometry::Point(p) => {
                    if (p[through] - focal_depth).abs() > tolerance {
                        continue;
                    }
                    let [x, y] = projection.world_to_display(*p);
                    segments.push([[x - 4.0, y], [x + 4.0, y]]);
                    segments.push([[x, y - 4.0], [x, y + 4.0]]);
                }
                MarkerGeometry::Line { entry, target } => {
                    let near = (entry[through] - focal_depth).abs() <= tolerance
                        || (target[through] - focal_depth).abs() <= tolerance;
                    if !near {
                        continue;
                    }
                    segments
                        .push([projection.world_to_display(*entry), projection.world_to_display(*target)]);
                }
            }
        }
        segments
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{Camera, OrientationController};
    use crate::enums::Orientation;
    use crate::volume::Volume;
    use ndarray::Array3;

    fn projection() -> SliceProjection {
        let volume = Volume::new(Array3::zeros((64, 64, 64)), [1.0; 3]);
        let controller = OrientationController::new(Orientation::Axial);
        let mut camera = Camera::fitted(&volume, Orientation::Axial);
        controller.apply(&mut camera, &volume);
        SliceProjection::new(&camera, Orientation::Axial, [512, 512], &volume)
    }

    #[test]
    fn markers_far_from_the_plane_are_skipped() {
        let mut set = MarkerSet::default();
        set.add(ToolMarker::point("near", [32.0, 32.0, 32.5]));
        set.add(ToolMarker::point("far", [32.0, 32.0, 10.0]));
        let segments = set.display_segments(&projection(), 32.0, 1.0);
        // one cross = two segments
        assert_eq!(segments.len(), 2);
    }

    #[test]
    fn hidden_markers_contribute_nothing() {
        let mut set = MarkerSet::default();
        let mut marker = ToolMarker::line("t", [10.0, 10.0, 32.0], [50.0, 50.0, 32.0]);
        marker.visible = false;
        set.add(marker);
        assert!(set.display_segments(&projection(), 32.0, 1.0).is_empty());
    }

    #[test]
    fn removal_by_name() {
        let mut set = MarkerSet::default();
        set.add(ToolMarker::point("a", [0.0; 3]));
        assert!(set.remove("missing").is_err());
        assert_eq!(set.remove("a").unwrap().name, "a");
        assert!(set.is_empty());
    }
}
