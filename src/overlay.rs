use crate::transform::Transform;
use crate::volume::Volume;

/// How an overlay's placement transform was derived.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlacementKind {
    /// An explicit reference-frame link existed and was applied.
    Registered,
    /// Origins differed; a translation aligning them was used.
    OriginAligned,
    /// Fields of view differed; geometric centers were aligned.
    CenterAligned,
    /// No placement transform.
    Identity,
}

/// A secondary volume rendered against the reference, with display state.
pub struct Overlay {
    pub volume: Volume,
    pub opacity: f32,
    pub visible: bool,
    /// Layering order among the overlays of one view.
    pub layer: u32,
    pub placement: Transform,
    pub placement_kind: PlacementKind,
}

/// Compute the placement transform for rendering `overlay` against
/// `reference` and record its inverse on the reference (keyed by the
/// overlay's identity) for voxel-value probing.
///
/// Fixed priority chain, reproduced exactly: registration transform beats
/// origin alignment beats center alignment beats identity.
pub fn align(
    reference: &mut Volume,
    overlay: &Volume,
    center_alignment: bool,
) -> (Transform, PlacementKind) {
    // 1. explicit registration transform
    if let Some(link) = overlay.get_transform_from_id(reference.id()) {
        if !link.is_identity() {
            let mut placement = link.clone();
            placement.set_center([0.0; 3]);
            reference.set_transform(overlay.id(), placement.get_inverse_transform());
            return (placement, PlacementKind::Registered);
        }
    }

    // 2. origin alignment
    if !overlay.is_default_origin() || !reference.is_default_origin() {
        let r = reference.origin();
        let o = overlay.origin();
        let placement = Transform::from_translation([r[0] - o[0], r[1] - o[1], r[2] - o[2]]);
        reference.set_transform(overlay.id(), placement.get_inverse_transform());
        return (placement, PlacementKind::OriginAligned);
    }

    // 3. center alignment
    if !reference.has_same_field_of_view(overlay) && center_alignment {
        let r = reference.get_center();
        let o = overlay.get_center();
        let placement = Transform::from_translation([r[0] - o[0], r[1] - o[1], r[2] - o[2]]);
        reference.set_transform(overlay.id(), placement.get_inverse_transform());
        return (placement, PlacementKind::CenterAligned);
    }

    // 4. identity
    (Transform::identity(), PlacementKind::Identity)
}

impl Overlay {
    /// Attach `volume` as an overlay of `reference`, deriving its placement.
    pub fn attach(reference: &mut Volume, volume: Volume, center_alignment: bool) -> Self {
        let (placement, placement_kind) = align(reference, &volume, center_alignment);
        Self {
            volume,
            opacity: 0.5,
            visible: true,
            layer: 0,
            placement,
            placement_kind,
        }
    }

    /// Map a world point of the reference space into the overlay and probe
    /// the scalar there. Returns `None` outside the overlay.
    pub fn probe_value(&self, world: [f32; 3]) -> Option<f32> {
        let mapped = self.placement.get_inverse_transform().apply_to_point(world);
        self.volume.value_at_world(mapped)
    }
}
