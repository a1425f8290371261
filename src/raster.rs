//! CPU implementations of the voxel-level editing operators.
//!
//! All operators mutate the active ROI raster in place and leave it in a
//! self-consistent labeled state even on early termination. Every operator
//! returns whether it changed the raster; "no blob at seed" style degeneracy
//! is a `false` return, never a panic or partial write.
//!
//! Coordinate conventions: voxel coordinates are `(x, y, z)`, slice
//! coordinates `(row, col)` per the storage layout (`Axial` slices index
//! `[y, x]`, `Coronal` `[z, x]`, `Sagittal` `[z, y]`).

use std::collections::VecDeque;

use ndarray::{Array2, Array3};

use crate::enums::Orientation;
use crate::progress::ProgressReporter;
use crate::roi::Roi;
use crate::volume::Volume;

/// Label written by painting operators.
pub const LABEL: u8 = 1;

/// Where an operator runs: one slice of the raster, or the whole volume.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Domain {
    Slice(Orientation, usize),
    Volume,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MorphKind {
    Erode,
    Dilate,
    Open,
    Close,
}

/// Blob mask held between a copy/cut and a paste.
pub enum Clipboard {
    Slice {
        orientation: Orientation,
        mask: Array2<u8>,
    },
    Volume {
        mask: Array3<u8>,
    },
}

/// Slice (row, col) of a voxel under an orientation.
pub fn plane_coords(orientation: Orientation, voxel: [usize; 3]) -> [usize; 2] {
    match orientation {
        Orientation::Axial => [voxel[1], voxel[0]],
        Orientation::Coronal => [voxel[2], voxel[0]],
        Orientation::Sagittal => [voxel[2], voxel[1]],
    }
}

/// Voxel addressed by a slice (row, col) at `index` along the through axis.
pub fn voxel_from_plane(orientation: Orientation, index: usize, row: usize, col: usize) -> [usize; 3] {
    match orientation {
        Orientation::Axial => [col, row, index],
        Orientation::Coronal => [col, index, row],
        Orientation::Sagittal => [index, col, row],
    }
}

fn contains(size: [usize; 3], v: [i64; 3]) -> Option<[usize; 3]> {
    if v[0] >= 0
        && v[1] >= 0
        && v[2] >= 0
        && (v[0] as usize) < size[0]
        && (v[1] as usize) < size[1]
        && (v[2] as usize) < size[2]
    {
        Some([v[0] as usize, v[1] as usize, v[2] as usize])
    } else {
        None
    }
}

fn raster_size(roi: &Roi) -> [usize; 3] {
    let (d, h, w) = roi.data.dim();
    [w, h, d]
}

fn get(roi: &Roi, v: [usize; 3]) -> u8 {
    roi.data[[v[2], v[1], v[0]]]
}

fn set(roi: &mut Roi, v: [usize; 3], value: u8) {
    roi.data[[v[2], v[1], v[0]]] = value;
}

fn volume_value(volume: &Volume, v: [usize; 3]) -> f32 {
    volume.data()[[v[2], v[1], v[0]]]
}

/// Face-connected neighbours restricted to the domain's axes.
fn neighbours(domain: Domain, v: [usize; 3], size: [usize; 3]) -> Vec<[usize; 3]> {
    let axes: Vec<usize> = match domain {
        Domain::Slice(orientation, _) => {
            let (u, w) = orientation.in_plane_axes();
            vec![u, w]
        }
        Domain::Volume => vec![0, 1, 2],
    };
    axes.into_iter()
        .flat_map(|axis| {
            [-1i64, 1].into_iter().filter_map(move |step| {
                let mut q = [v[0] as i64, v[1] as i64, v[2] as i64];
                q[axis] += step;
                contains(size, q)
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Brushes
// ---------------------------------------------------------------------------

/// Solid disk brush in the cutting plane. Radius is in in-plane voxels.
pub fn stamp_disk(
    roi: &mut Roi,
    orientation: Orientation,
    index: usize,
    center: [usize; 3],
    radius: u32,
    erase: bool,
) -> bool {
    stamp_disk_filtered(roi, orientation, index, center, radius, erase, |_| true)
}

/// Disk brush constrained to voxels whose intensity lies inside the window.
pub fn stamp_disk_threshold(
    roi: &mut Roi,
    volume: &Volume,
    orientation: Orientation,
    index: usize,
    center: [usize; 3],
    radius: u32,
    window: (f32, f32),
    erase: bool,
) -> bool {
    stamp_disk_filtered(roi, orientation, index, center, radius, erase, |v| {
        let value = volume_value(volume, v);
        value >= window.0 && value <= window.1
    })
}

fn stamp_disk_filtered(
    roi: &mut Roi,
    orientation: Orientation,
    index: usize,
    center: [usize; 3],
    radius: u32,
    erase: bool,
    accept: impl Fn([usize; 3]) -> bool,
) -> bool {
    let size = raster_size(roi);
    let [cr, cc] = plane_coords(orientation, center);
    let r = radius as i64;
    let value = if erase { 0 } else { LABEL };
    let mut changed = false;
    for dr in -r..=r {
        for dc in -r..=r {
            if dr * dr + dc * dc > r * r {
                continue;
            }
            let row = cr as i64 + dr;
            let col = cc as i64 + dc;
            if row < 0 || col < 0 {
                continue;
            }
            let v = voxel_from_plane(orientation, index, row as usize, col as usize);
            if contains(size, [v[0] as i64, v[1] as i64, v[2] as i64]).is_none() {
                continue;
            }
            if !accept(v) {
                continue;
            }
            if get(roi, v) != value {
                set(roi, v, value);
                changed = true;
            }
        }
    }
    changed
}

/// Solid sphere brush; same radius as the disk but it also reaches the
/// neighbouring slices.
pub fn stamp_sphere(roi: &mut Roi, center: [usize; 3], radius: u32, erase: bool) -> bool {
    stamp_sphere_filtered(roi, center, radius, erase, |_| true)
}

pub fn stamp_sphere_threshold(
    roi: &mut Roi,
    volume: &Volume,
    center: [usize; 3],
    radius: u32,
    window: (f32, f32),
    erase: bool,
) -> bool {
    stamp_sphere_filtered(roi, center, radius, erase, |v| {
        let value = volume_value(volume, v);
        value >= window.0 && value <= window.1
    })
}

fn stamp_sphere_filtered(
    roi: &mut Roi,
    center: [usize; 3],
    radius: u32,
    erase: bool,
    accept: impl Fn([usize; 3]) -> bool,
) -> bool {
    let size = raster_size(roi);
    let r = radius as i64;
    let value = if erase { 0 } else { LABEL };
    let mut changed = false;
    for dz in -r..=r {
        for dy in -r..=r {
            for dx in -r..=r {
                if dx * dx + dy * dy + dz * dz > r * r {
                    continue;
                }
                let q = [
                    center[0] as i64 + dx,
                    center[1] as i64 + dy,
                    center[2] as i64 + dz,
                ];
                let Some(v) = contains(size, q) else { continue };
                if !accept(v) {
                    continue;
                }
                if get(roi, v) != value {
                    set(roi, v, value);
                    changed = true;
                }
            }
        }
    }
    changed
}

// ---------------------------------------------------------------------------
// Morphology
// ---------------------------------------------------------------------------

fn erode2(mask: &Array2<u8>, radius: usize) -> Array2<u8> {
    let (rows, cols) = mask.dim();
    let r = radius as i64;
    Array2::from_shape_fn((rows, cols), |(row, col)| {
        for dr in -r..=r {
            for dc in -r..=r {
                let rr = row as i64 + dr;
                let cc = col as i64 + dc;
                if rr < 0 || cc < 0 || rr >= rows as i64 || cc >= cols as i64 {
                    return 0;
                }
                if mask[[rr as usize, cc as usize]] == 0 {
                    return 0;
                }
            }
        }
        mask[[row, col]]
    })
}

fn dilate2(mask: &Array2<u8>, radius: usize) -> Array2<u8> {
    let (rows, cols) = mask.dim();
    let r = radius as i64;
    Array2::from_shape_fn((rows, cols), |(row, col)| {
        let mut best = 0;
        for dr in -r..=r {
            for dc in -r..=r {
                let rr = row as i64 + dr;
                let cc = col as i64 + dc;
                if rr < 0 || cc < 0 || rr >= rows as i64 || cc >= cols as i64 {
                    continue;
                }
                best = best.max(mask[[rr as usize, cc as usize]]);
            }
        }
        best
    })
}

fn morph2(mask: &Array2<u8>, kind: MorphKind, radius: usize) -> Array2<u8> {
    match kind {
        MorphKind::Erode => erode2(mask, radius),
        MorphKind::Dilate => dilate2(mask, radius),
        MorphKind::Open => dilate2(&erode2(mask, radius), radius),
        MorphKind::Close => erode2(&dilate2(mask, radius), radius),
    }
}

fn erode3(mask: &Array3<u8>, radius: usize) -> Array3<u8> {
    let dim = mask.dim();
    let r = radius as i64;
    Array3::from_shape_fn(dim, |(z, y, x)| {
        for dz in -r..=r {
            for dy in -r..=r {
                for dx in -r..=r {
                    let zz = z as i64 + dz;
                    let yy = y as i64 + dy;
                    let xx = x as i64 + dx;
                    if zz < 0
                        || yy < 0
                        || xx < 0
                        || zz >= dim.0 as i64
                        || yy >= dim.1 as i64
                        || xx >= dim.2 as i64
                    {
                        return 0;
                    }
                    if mask[[zz as usize, yy as usize, xx as usize]] == 0 {
                        return 0;
                    }
                }
            }
        }
        mask[[z, y, x]]
    })
}

fn dilate3(mask: &Array3<u8>, radius: usize) -> Array3<u8> {
    let dim = mask.dim();
    let r = radius as i64;
    Array3::from_shape_fn(dim, |(z, y, x)| {
        let mut best = 0;
        for dz in -r..=r {
            for dy in -r..=r {
                for dx in -r..=r {
                    let zz = z as i64 + dz;
                    let yy = y as i64 + dy;
                    let xx = x as i64 + dx;
                    if zz < 0
                        || yy < 0
                        || xx < 0
                        || zz >= dim.0 as i64
                        || yy >= dim.1 as i64
                        || xx >= dim.2 as i64
                    {
                        continue;
                    }
                    best = best.max(mask[[zz as usize, yy as usize, xx as usize]]);
                }
            }
        }
        best
    })
}

fn morph3(mask: &Array3<u8>, kind: MorphKind, radius: usize) -> Array3<u8> {
    match kind {
        MorphKind::Erode => erode3(mask, radius),
        MorphKind::Dilate => dilate3(mask, radius),
        MorphKind::Open => dilate3(&erode3(mask, radius), radius),
        MorphKind::Close => erode3(&dilate3(mask, radius), radius),
    }
}

/// Morphology over the whole domain (every labeled voxel).
pub fn morph_whole(roi: &mut Roi, domain: Domain, kind: MorphKind, radius: usize) -> bool {
    match domain {
        Domain::Slice(orientation, index) => {
            let before = roi.slice(orientation, index).to_owned();
            let after = morph2(&before, kind, radius);
            if after == before {
                return false;
            }
            roi.slice_mut(orientation, index).assign(&after);
            true
        }
        Domain::Volume => {
            let after = morph3(&roi.data, kind, radius);
            if after == roi.data {
                return false;
            }
            roi.data = after;
            true
        }
    }
}

/// Morphology restricted to the blob containing the seed.
pub fn morph_blob(
    roi: &mut Roi,
    domain: Domain,
    seed: [usize; 3],
    kind: MorphKind,
    radius: usize,
) -> bool {
    match domain {
        Domain::Slice(orientation, index) => {
            let Some(mask) = blob_mask_2d(roi, orientation, index, seed) else {
                return false;
            };
            let shaped = morph2(&mask, kind, radius);
            let mut slice = roi.slice_mut(orientation, index);
            let mut changed = false;
            for ((row, col), &m) in mask.indexed_iter() {
                let target = shaped[[row, col]];
                let current = slice[[row, col]];
                // voxels outside the blob keep their value; inside and newly
                // shaped ones follow the morphed mask
                let next = if m != 0 || target != 0 { target } else { current };
                if next != current {
                    slice[[row, col]] = next;
                    changed = true;
                }
            }
            changed
        }
        Domain::Volume => {
            let Some(mask) = blob_mask_3d(roi, seed) else {
                return false;
            };
            let shaped = morph3(&mask, kind, radius);
            let mut changed = false;
            for ((z, y, x), &m) in mask.indexed_iter() {
                let target = shaped[[z, y, x]];
                let current = roi.data[[z, y, x]];
                let next = if m != 0 || target != 0 { target } else { current };
                if next != current {
                    roi.data[[z, y, x]] = next;
                    changed = true;
                }
            }
            changed
        }
    }
}

// ---------------------------------------------------------------------------
// Blobs (connected components)
// ---------------------------------------------------------------------------

/// 4-connected component of the seed within one slice, as a slice-shaped
/// mask. `None` when the seed voxel is background.
pub fn blob_mask_2d(
    roi: &Roi,
    orientation: Orientation,
    index: usize,
    seed: [usize; 3],
) -> Option<Array2<u8>> {
    let slice = roi.slice(orientation, index);
    let [sr, sc] = plane_coords(orientation, seed);
    if slice.get([sr, sc]).copied().unwrap_or(0) == 0 {
        return None;
    }
    let (rows, cols) = slice.dim();
    let mut mask = Array2::zeros((rows, cols));
    let mut queue = VecDeque::from([[sr, sc]]);
    mask[[sr, sc]] = slice[[sr, sc]];
    while let Some([row, col]) = queue.pop_front() {
        for (dr, dc) in [(-1i64, 0i64), (1, 0), (0, -1), (0, 1)] {
            let rr = row as i64 + dr;
            let cc = col as i64 + dc;
            if rr < 0 || cc < 0 || rr >= rows as i64 || cc >= cols as i64 {
                continue;
            }
            let (rr, cc) = (rr as usize, cc as usize);
            if slice[[rr, cc]] != 0 && mask[[rr, cc]] == 0 {
                mask[[rr, cc]] = slice[[rr, cc]];
                queue.push_back([rr, cc]);
            }
        }
    }
    Some(mask)
}

/// 6-connected component of the seed in the full raster.
pub fn blob_mask_3d(roi: &Roi, seed: [usize; 3]) -> Option<Array3<u8>> {
    let size = raster_size(roi);
    if contains(size, [seed[0] as i64, seed[1] as i64, seed[2] as i64]).is_none()
        || get(roi, seed) == 0
    {
        return None;
    }
    let mut mask = Array3::zeros(roi.data.dim());
    let mut queue = VecDeque::from([seed]);
    mask[[seed[2], seed[1], seed[0]]] = get(roi, seed);
    while let Some(v) = queue.pop_front() {
        for n in neighbours(Domain::Volume, v, size) {
            if get(roi, n) != 0 && mask[[n[2], n[1], n[0]]] == 0 {
                mask[[n[2], n[1], n[0]]] = get(roi, n);
                queue.push_back(n);
            }
        }
    }
    Some(mask)
}

/// Clear the blob containing the seed.
pub fn blob_remove(roi: &mut Roi, domain: Domain, seed: [usize; 3]) -> bool {
    match domain {
        Domain::Slice(orientation, index) => {
            let Some(mask) = blob_mask_2d(roi, orientation, index, seed) else {
                return false;
            };
            let mut slice = roi.slice_mut(orientation, index);
            for ((row, col), &m) in mask.indexed_iter() {
                if m != 0 {
                    slice[[row, col]] = 0;
                }
            }
            true
        }
        Domain::Volume => {
            let Some(mask) = blob_mask_3d(roi, seed) else {
                return false;
            };
            for ((z, y, x), &m) in mask.indexed_iter() {
                if m != 0 {
                    roi.data[[z, y, x]] = 0;
                }
            }
            true
        }
    }
}

/// Clear everything except the blob containing the seed.
pub fn blob_keep_only(roi: &mut Roi, domain: Domain, seed: [usize; 3]) -> bool {
    match domain {
        Domain::Slice(orientation, index) => {
            let Some(mask) = blob_mask_2d(roi, orientation, index, seed) else {
                return false;
            };
            let mut changed = false;
            let mut slice = roi.slice_mut(orientation, index);
            for ((row, col), &m) in mask.indexed_iter() {
                if m == 0 && slice[[row, col]] != 0 {
                    slice[[row, col]] = 0;
                    changed = true;
                }
            }
            changed
        }
        Domain::Volume => {
            let Some(mask) = blob_mask_3d(roi, seed) else {
                return false;
            };
            let mut changed = false;
            for ((z, y, x), &m) in mask.indexed_iter() {
                if m == 0 && roi.data[[z, y, x]] != 0 {
                    roi.data[[z, y, x]] = 0;
                    changed = true;
                }
            }
            changed
        }
    }
}

/// Copy the blob at the seed to the clipboard; `cut` also clears it.
pub fn blob_copy(
    roi: &mut Roi,
    domain: Domain,
    seed: [usize; 3],
    cut: bool,
) -> Option<Clipboard> {
    let clipboard = match domain {
        Domain::Slice(orientation, index) => Clipboard::Slice {
            orientation,
            mask: blob_mask_2d(roi, orientation, index, seed)?,
        },
        Domain::Volume => Clipboard::Volume {
            mask: blob_mask_3d(roi, seed)?,
        },
    };
    if cut {
        let _ = blob_remove(roi, domain, seed);
    }
    Some(clipboard)
}

/// Merge a clipboard blob into the raster. 2D clipboards paste onto the
/// given slice of the same orientation.
pub fn blob_paste(roi: &mut Roi, clipboard: &Clipboard, target: Domain) -> bool {
    match (clipboard, target) {
        (
            Clipboard::Slice { orientation, mask },
            Domain::Slice(target_orientation, index),
        ) if *orientation == target_orientation => {
            let mut slice = roi.slice_mut(target_orientation, index);
            if slice.dim() != mask.dim() {
                return false;
            }
            let mut changed = false;
            for ((row, col), &m) in mask.indexed_iter() {
                if m != 0 && slice[[row, col]] != m {
                    slice[[row, col]] = m;
                    changed = true;
                }
            }
            changed
        }
        (Clipboard::Volume { mask }, Domain::Volume) => {
            if mask.dim() != roi.data.dim() {
                return false;
            }
            let mut changed = false;
            for ((z, y, x), &m) in mask.indexed_iter() {
                if m != 0 && roi.data[[z, y, x]] != m {
                    roi.data[[z, y, x]] = m;
                    changed = true;
                }
            }
            changed
        }
        _ => false,
    }
}

/// Within the blob containing the seed, keep only voxels whose intensity
/// lies inside the window.
pub fn blob_interior_threshold(
    roi: &mut Roi,
    volume: &Volume,
    domain: Domain,
    seed: [usize; 3],
    window: (f32, f32),
) -> bool {
    match domain {
        Domain::Slice(orientation, index) => {
            let Some(mask) = blob_mask_2d(roi, orientation, index, seed) else {
                return false;
            };
            let mut changed = false;
            for ((row, col), &m) in mask.indexed_iter() {
                if m == 0 {
                    continue;
                }
                let v = voxel_from_plane(orientation, index, row, col);
                let value = volume_value(volume, v);
                if value < window.0 || value > window.1 {
                    set(roi, v, 0);
                    changed = true;
                }
            }
            changed
        }
        Domain::Volume => {
            let Some(mask) = blob_mask_3d(roi, seed) else {
                return false;
            };
            let mut changed = false;
            for ((z, y, x), &m) in mask.indexed_iter() {
                if m == 0 {
                    continue;
                }
                let value = volume.data()[[z, y, x]];
                if value < window.0 || value > window.1 {
                    roi.data[[z, y, x]] = 0;
                    changed = true;
                }
            }
            changed
        }
    }
}

// ---------------------------------------------------------------------------
// Fills and growing
// ---------------------------------------------------------------------------

/// Fill the connected background region at the seed with the label. A seed
/// on an already-labeled voxel is a no-op.
pub fn flood_fill(roi: &mut Roi, domain: Domain, seed: [usize; 3]) -> bool {
    let size = raster_size(roi);
    if contains(size, [seed[0] as i64, seed[1] as i64, seed[2] as i64]).is_none()
        || get(roi, seed) != 0
    {
        return false;
    }
    let mut queue = VecDeque::from([seed]);
    set(roi, seed, LABEL);
    while let Some(v) = queue.pop_front() {
        for n in neighbours(domain, v, size) {
            if get(roi, n) == 0 {
                set(roi, n, LABEL);
                queue.push_back(n);
            }
        }
    }
    true
}

/// Seeded growing over the intensity volume: accept face-connected voxels
/// whose value lies inside the window.
pub fn region_grow(
    roi: &mut Roi,
    volume: &Volume,
    domain: Domain,
    seed: [usize; 3],
    window: (f32, f32),
) -> bool {
    let size = raster_size(roi);
    if contains(size, [seed[0] as i64, seed[1] as i64, seed[2] as i64]).is_none() {
        return false;
    }
    let seed_value = volume_value(volume, seed);
    if seed_value < window.0 || seed_value > window.1 {
        return false;
    }
    grow_where(roi, domain, seed, size, |v| {
        let value = volume_value(volume, v);
        value >= window.0 && value <= window.1
    })
}

fn grow_where(
    roi: &mut Roi,
    domain: Domain,
    seed: [usize; 3],
    size: [usize; 3],
    accept: impl Fn([usize; 3]) -> bool,
) -> bool {
    let mut visited = Array3::<u8>::zeros(roi.data.dim());
    let mut queue = VecDeque::from([seed]);
    visited[[seed[2], seed[1], seed[0]]] = 1;
    let mut changed = false;
    while let Some(v) = queue.pop_front() {
        if get(roi, v) != LABEL {
            set(roi, v, LABEL);
            changed = true;
        }
        for n in neighbours(domain, v, size) {
            if visited[[n[2], n[1], n[0]]] == 0 && accept(n) {
                visited[[n[2], n[1], n[0]]] = 1;
                queue.push_back(n);
            }
        }
    }
    changed
}

/// Confidence-connected growing: the acceptance interval `mean ± f·σ` is
/// re-estimated from the grown region on every iteration.
pub fn confidence_grow(
    roi: &mut Roi,
    volume: &Volume,
    domain: Domain,
    seed: [usize; 3],
    multiplier: f32,
    iterations: u32,
    progress: &mut dyn ProgressReporter,
) -> bool {
    let size = raster_size(roi);
    if contains(size, [seed[0] as i64, seed[1] as i64, seed[2] as i64]).is_none() {
        return false;
    }

    progress.set_information_text("confidence-connected growing");
    progress.set_progress_range(0, iterations);

    // initial statistics from the seed's immediate neighbourhood
    let mut samples: Vec<f32> = neighbours(domain, seed, size)
        .into_iter()
        .chain(std::iter::once(seed))
        .map(|v| volume_value(volume, v))
        .collect();

    let mut region: Vec<[usize; 3]> = vec![seed];
    for _ in 0..iterations {
        let mean = samples.iter().sum::<f32>() / samples.len() as f32;
        let variance =
            samples.iter().map(|s| (s - mean) * (s - mean)).sum::<f32>() / samples.len() as f32;
        let sigma = variance.sqrt().max(f32::EPSILON);
        let (lo, hi) = (mean - multiplier * sigma, mean + multiplier * sigma);

        let mut visited = Array3::<u8>::zeros(roi.data.dim());
        let mut queue = VecDeque::from([seed]);
        visited[[seed[2], seed[1], seed[0]]] = 1;
        let mut grown = Vec::new();
        while let Some(v) = queue.pop_front() {
            grown.push(v);
            for n in neighbours(domain, v, size) {
                let value = volume_value(volume, n);
                if visited[[n[2], n[1], n[0]]] == 0 && value >= lo && value <= hi {
                    visited[[n[2], n[1], n[0]]] = 1;
                    queue.push_back(n);
                }
            }
        }
        progress.inc_current_progress_value();
        samples = grown.iter().map(|&v| volume_value(volume, v)).collect();
        let stable = grown.len() == region.len();
        region = grown;
        if stable {
            break;
        }
    }

    let mut changed = false;
    for &v in &region {
        if get(roi, v) != LABEL {
            set(roi, v, LABEL);
            changed = true;
        }
    }
    changed
}

// ---------------------------------------------------------------------------
// Euclidean expand/shrink (3D only)
// ---------------------------------------------------------------------------

/// Two-pass chamfer distance (voxels) from the mask's nonzero set.
fn chamfer_distance(mask: &Array3<u8>) -> Array3<f32> {
    const FACE: f32 = 1.0;
    const EDGE: f32 = std::f32::consts::SQRT_2;
    const CORNER: f32 = 1.732_050_8;
    let dim = mask.dim();
    let mut dist = Array3::from_shape_fn(dim, |idx| if mask[idx] != 0 { 0.0 } else { f32::MAX });

    let weight = |dz: i64, dy: i64, dx: i64| match dz.abs() + dy.abs() + dx.abs() {
        1 => FACE,
        2 => EDGE,
        _ => CORNER,
    };

    // forward pass
    for z in 0..dim.0 {
        for y in 0..dim.1 {
            for x in 0..dim.2 {
                for (dz, dy, dx) in FORWARD_OFFSETS {
                    let zz = z as i64 + dz;
                    let yy = y as i64 + dy;
                    let xx = x as i64 + dx;
                    if zz < 0 || yy < 0 || xx < 0 || zz >= dim.0 as i64 || yy >= dim.1 as i64 || xx >= dim.2 as i64 {
                        continue;
                    }
                    let candidate = dist[[zz as usize, yy as usize, xx as usize]];
                    if candidate < f32::MAX {
                        let relaxed = candidate + weight(dz, dy, dx);
                        if relaxed < dist[[z, y, x]] {
                            dist[[z, y, x]] = relaxed;
                        }
                    }
                }
            }
        }
    }
    // backward pass
    for z in (0..dim.0).rev() {
        for y in (0..dim.1).rev() {
            for x in (0..dim.2).rev() {
                for (dz, dy, dx) in FORWARD_OFFSETS {
                    let zz = z as i64 - dz;
                    let yy = y as i64 - dy;
                    let xx = x as i64 - dx;
                    if zz < 0 || yy < 0 || xx < 0 || zz >= dim.0 as i64 || yy >= dim.1 as i64 || xx >= dim.2 as i64 {
                        continue;
                    }
                    let candidate = dist[[zz as usize, yy as usize, xx as usize]];
                    if candidate < f32::MAX {
                        let relaxed = candidate + weight(dz, dy, dx);
                        if relaxed < dist[[z, y, x]] {
                            dist[[z, y, x]] = relaxed;
                        }
                    }
                }
            }
        }
    }
    dist
}

const FORWARD_OFFSETS: [(i64, i64, i64); 13] = [
    (-1, -1, -1),
    (-1, -1, 0),
    (-1, -1, 1),
    (-1, 0, -1),
    (-1, 0, 0),
    (-1, 0, 1),
    (-1, 1, -1),
    (-1, 1, 0),
    (-1, 1, 1),
    (0, -1, -1),
    (0, -1, 0),
    (0, -1, 1),
    (0, 0, -1),
];

/// Grow the blob at the seed to everything within `radius` voxels of it.
pub fn euclidean_expand(roi: &mut Roi, seed: [usize; 3], radius: f32) -> bool {
    let Some(mask) = blob_mask_3d(roi, seed) else {
        return false;
    };
    let dist = chamfer_distance(&mask);
    let mut changed = false;
    for ((z, y, x), &d) in dist.indexed_iter() {
        if d <= radius && roi.data[[z, y, x]] != LABEL {
            roi.data[[z, y, x]] = LABEL;
            changed = true;
        }
    }
    changed
}

/// Peel the blob at the seed back by `radius` voxels from its boundary.
pub fn euclidean_shrink(roi: &mut Roi, seed: [usize; 3], radius: f32) -> bool {
    let Some(mask) = blob_mask_3d(roi, seed) else {
        return false;
    };
    // distance from the complement = interior depth
    let complement = mask.map(|&m| if m == 0 { 1u8 } else { 0 });
    let depth = chamfer_distance(&complement);
    let mut changed = false;
    for ((z, y, x), &m) in mask.indexed_iter() {
        if m != 0 && depth[[z, y, x]] <= radius && roi.data[[z, y, x]] != 0 {
            roi.data[[z, y, x]] = 0;
            changed = true;
        }
    }
    changed
}

// ---------------------------------------------------------------------------
// Active contour (3D only)
// ---------------------------------------------------------------------------

/// Morphological two-phase active contour (Chan–Vese flavoured): the front
/// moves one voxel per iteration toward the region means' decision boundary.
/// Initialized from the blob at the seed, or a small ball when the seed is
/// background.
pub fn active_contour(
    roi: &mut Roi,
    volume: &Volume,
    seed: [usize; 3],
    iterations: u32,
    progress: &mut dyn ProgressReporter,
) -> bool {
    let size = raster_size(roi);
    if contains(size, [seed[0] as i64, seed[1] as i64, seed[2] as i64]).is_none() {
        return false;
    }

    let initial = blob_mask_3d(roi, seed);
    let mut mask = match &initial {
        Some(mask) => mask.map(|&m| u8::from(m != 0)),
        None => {
            // no blob under the seed: start from a small ball
            let dim = roi.data.dim();
            Array3::from_shape_fn(dim, |(z, y, x)| {
                let dz = z as i64 - seed[2] as i64;
                let dy = y as i64 - seed[1] as i64;
                let dx = x as i64 - seed[0] as i64;
                u8::from(dx * dx + dy * dy + dz * dz <= 9)
            })
        }
    };

    progress.set_information_text("active contour");
    progress.set_progress_range(0, iterations);

    for _ in 0..iterations {
        let inside: Vec<f32> = mask
            .indexed_iter()
            .filter(|&(_, &m)| m != 0)
            .map(|((z, y, x), _)| volume.data()[[z, y, x]])
            .collect();
        let outside: Vec<f32> = mask
            .indexed_iter()
            .filter(|&(_, &m)| m == 0)
            .map(|((z, y, x), _)| volume.data()[[z, y, x]])
            .collect();
        if inside.is_empty() || outside.is_empty() {
            break;
        }
        let c1 = inside.iter().sum::<f32>() / inside.len() as f32;
        let c2 = outside.iter().sum::<f32>() / outside.len() as f32;

        // evolve only the one-voxel band around the current front
        let band = dilate3(&mask, 1);
        let eroded = erode3(&mask, 1);
        let mut next = mask.clone();
        for ((z, y, x), &b) in band.indexed_iter() {
            let on_front = b != 0 && eroded[[z, y, x]] == 0;
            if !on_front {
                continue;
            }
            let value = volume.data()[[z, y, x]];
            let favours_inside = (value - c1).abs() <= (value - c2).abs();
            next[[z, y, x]] = u8::from(favours_inside);
        }
        let stable = next == mask;
        mask = next;
        progress.inc_current_progress_value();
        if stable {
            break;
        }
    }

    // the contour replaces the seed blob: released voxels are cleared,
    // claimed ones labeled, unrelated blobs untouched
    let mut changed = false;
    for ((z, y, x), &m) in mask.indexed_iter() {
        let was_seed_blob = initial
            .as_ref()
            .is_some_and(|blob| blob[[z, y, x]] != 0);
        let current = roi.data[[z, y, x]];
        let next = if m != 0 {
            LABEL
        } else if was_seed_blob {
            0
        } else {
            current
        };
        if next != current {
            roi.data[[z, y, x]] = next;
            changed = true;
        }
    }
    changed
}

// ---------------------------------------------------------------------------
// Whole-slice / whole-volume operators
// ---------------------------------------------------------------------------

pub fn invert(roi: &mut Roi, domain: Domain) -> bool {
    match domain {
        Domain::Slice(orientation, index) => {
            roi.slice_mut(orientation, index)
                .mapv_inplace(|v| if v == 0 { LABEL } else { 0 });
        }
        Domain::Volume => {
            roi.data.mapv_inplace(|v| if v == 0 { LABEL } else { 0 });
        }
    }
    true
}

pub fn clear(roi: &mut Roi, domain: Domain) -> bool {
    match domain {
        Domain::Slice(orientation, index) => {
            let mut slice = roi.slice_mut(orientation, index);
            if slice.iter().all(|&v| v == 0) {
                return false;
            }
            slice.fill(0);
        }
        Domain::Volume => {
            if roi.data.iter().all(|&v| v == 0) {
                return false;
            }
            roi.data.fill(0);
        }
    }
    true
}

/// Label every voxel whose intensity is at or above the domain mean.
pub fn segment_foreground(roi: &mut Roi, volume: &Volume, domain: Domain) -> bool {
    segment_by_mean(roi, volume, domain, true)
}

/// Label every voxel whose intensity is below the domain mean.
pub fn segment_background(roi: &mut Roi, volume: &Volume, domain: Domain) -> bool {
    segment_by_mean(roi, volume, domain, false)
}

fn segment_by_mean(roi: &mut Roi, volume: &Volume, domain: Domain, foreground: bool) -> bool {
    match domain {
        Domain::Slice(orientation, index) => {
            let Some(slice) = volume.get_slice_from_axis(index, orientation) else {
                return false;
            };
            let mean = slice.iter().sum::<f32>() / slice.len() as f32;
            let mut target = roi.slice_mut(orientation, index);
            for ((row, col), &value) in slice.indexed_iter() {
                target[[row, col]] = u8::from((value >= mean) == foreground) * LABEL;
            }
            true
        }
        Domain::Volume => {
            let data = volume.data();
            let mean = data.iter().sum::<f32>() / data.len() as f32;
            for ((z, y, x), &value) in data.indexed_iter() {
                roi.data[[z, y, x]] = u8::from((value >= mean) == foreground) * LABEL;
            }
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NullProgress;
    use ndarray::Array3;

    fn setup() -> (Roi, Volume) {
        let volume = Volume::new(Array3::zeros((24, 24, 24)), [1.0; 3]);
        let roi = Roi::new("r", &volume);
        (roi, volume)
    }

    #[test]
    fn disk_brush_has_the_expected_footprint() {
        let (mut roi, _) = setup();
        assert!(stamp_disk(&mut roi, Orientation::Axial, 10, [10, 10, 10], 3, false));
        // pixels with dr²+dc² <= 9 around (10,10): 29 of them
        let count: usize = roi
            .slice(Orientation::Axial, 10)
            .iter()
            .filter(|&&v| v != 0)
            .count();
        assert_eq!(count, 29);
        // all other slices untouched
        for index in 0..24 {
            if index == 10 {
                continue;
            }
            assert!(roi.slice(Orientation::Axial, index).iter().all(|&v| v == 0));
        }
    }

    #[test]
    fn sphere_brush_reaches_neighbouring_slices() {
        let (mut roi, _) = setup();
        assert!(stamp_sphere(&mut roi, [10, 10, 10], 2, false));
        assert_ne!(roi.slice(Orientation::Axial, 9).iter().filter(|&&v| v != 0).count(), 0);
        assert_ne!(roi.slice(Orientation::Axial, 11).iter().filter(|&&v| v != 0).count(), 0);
        assert!(roi.slice(Orientation::Axial, 13).iter().all(|&v| v == 0));
    }

    #[test]
    fn threshold_brush_respects_the_window() {
        let (mut roi, mut volume) = setup();
        volume.data_mut()[[10, 10, 10]] = 100.0;
        volume.data_mut()[[10, 10, 11]] = 20.0;
        assert!(stamp_disk_threshold(
            &mut roi,
            &volume,
            Orientation::Axial,
            10,
            [10, 10, 10],
            1,
            (50.0, 150.0),
            false,
        ));
        assert_eq!(roi.data[[10, 10, 10]], LABEL);
        assert_eq!(roi.data[[10, 10, 11]], 0);
    }

    #[test]
    fn whole_slice_dilate_then_erode_restores_a_square() {
        let (mut roi, _) = setup();
        for y in 8..12 {
            for x in 8..12 {
                roi.data[[10, y, x]] = LABEL;
            }
        }
        let before = roi.data.clone();
        assert!(morph_whole(&mut roi, Domain::Slice(Orientation::Axial, 10), MorphKind::Dilate, 1));
        assert!(morph_whole(&mut roi, Domain::Slice(Orientation::Axial, 10), MorphKind::Erode, 1));
        assert_eq!(roi.data, before);
    }

    #[test]
    fn blob_remove_only_touches_the_seeded_component() {
        let (mut roi, _) = setup();
        roi.data[[5, 5, 5]] = LABEL;
        roi.data[[5, 5, 6]] = LABEL;
        roi.data[[5, 20, 20]] = LABEL;
        assert!(blob_remove(&mut roi, Domain::Slice(Orientation::Axial, 5), [5, 5, 5]));
        assert_eq!(roi.data[[5, 5, 5]], 0);
        assert_eq!(roi.data[[5, 5, 6]], 0);
        assert_eq!(roi.data[[5, 20, 20]], LABEL);
        // background seed is a no-op
        assert!(!blob_remove(&mut roi, Domain::Slice(Orientation::Axial, 5), [0, 0, 5]));
    }

    #[test]
    fn blob_cut_and_paste_round_trip() {
        let (mut roi, _) = setup();
        roi.data[[5, 5, 5]] = LABEL;
        roi.data[[5, 6, 5]] = LABEL;
        let clipboard = blob_copy(&mut roi, Domain::Volume, [5, 5, 5], true).unwrap();
        assert!(roi.data.iter().all(|&v| v == 0));
        assert!(blob_paste(&mut roi, &clipboard, Domain::Volume));
        assert_eq!(roi.data[[5, 5, 5]], LABEL);
        assert_eq!(roi.data[[5, 6, 5]], LABEL);
    }

    #[test]
    fn flood_fill_stops_at_labeled_walls() {
        let (mut roi, _) = setup();
        // draw a closed square wall on slice 3
        for i in 4..=8 {
            roi.data[[3, 4, i]] = LABEL;
            roi.data[[3, 8, i]] = LABEL;
            roi.data[[3, i, 4]] = LABEL;
            roi.data[[3, i, 8]] = LABEL;
        }
        assert!(flood_fill(&mut roi, Domain::Slice(Orientation::Axial, 3), [6, 6, 3]));
        assert_eq!(roi.data[[3, 6, 6]], LABEL);
        assert_eq!(roi.data[[3, 5, 5]], LABEL);
        // outside the wall stays empty
        assert_eq!(roi.data[[3, 10, 10]], 0);
        // seeding on a labeled voxel is a no-op
        assert!(!flood_fill(&mut roi, Domain::Slice(Orientation::Axial, 3), [4, 4, 3]));
    }

    #[test]
    fn region_growing_follows_the_intensity_window() {
        let (mut roi, mut volume) = setup();
        for x in 5..10 {
            volume.data_mut()[[7, 7, x]] = 100.0;
        }
        volume.data_mut()[[7, 7, 12]] = 100.0; // disconnected
        assert!(region_grow(
            &mut roi,
            &volume,
            Domain::Volume,
            [7, 7, 7],
            (90.0, 110.0),
        ));
        for x in 5..10 {
            assert_eq!(roi.data[[7, 7, x]], LABEL);
        }
        assert_eq!(roi.data[[7, 7, 12]], 0);
        // seed outside the window is rejected without touching the raster
        assert!(!region_grow(&mut roi, &volume, Domain::Volume, [0, 0, 0], (90.0, 110.0)));
    }

    #[test]
    fn confidence_growing_captures_a_homogeneous_region() {
        let (mut roi, mut volume) = setup();
        volume.data_mut().fill(10.0);
        for z in 8..12 {
            for y in 8..12 {
                for x in 8..12 {
                    volume.data_mut()[[z, y, x]] = 200.0;
                }
            }
        }
        let mut progress = NullProgress;
        assert!(confidence_grow(
            &mut roi,
            &volume,
            Domain::Volume,
            [10, 10, 10],
            2.5,
            4,
            &mut progress,
        ));
        assert_eq!(roi.data[[10, 10, 10]], LABEL);
        assert_eq!(roi.data[[0, 0, 0]], 0);
    }

    #[test]
    fn euclidean_expand_and_shrink_are_bounded() {
        let (mut roi, _) = setup();
        roi.data[[10, 10, 10]] = LABEL;
        assert!(euclidean_expand(&mut roi, [10, 10, 10], 2.0));
        assert_eq!(roi.data[[10, 10, 12]], LABEL);
        assert_eq!(roi.data[[10, 10, 13]], 0);
        assert!(euclidean_shrink(&mut roi, [10, 10, 10], 1.0));
        // a shrink by one voxel peels the outer shell
        assert_eq!(roi.data[[10, 10, 12]], 0);
    }

    #[test]
    fn active_contour_finds_a_bright_ball() {
        let (mut roi, mut volume) = setup();
        for z in 0..24usize {
            for y in 0..24usize {
                for x in 0..24usize {
                    let dz = z as f32 - 12.0;
                    let dy = y as f32 - 12.0;
                    let dx = x as f32 - 12.0;
                    if (dx * dx + dy * dy + dz * dz).sqrt() < 5.0 {
                        volume.data_mut()[[z, y, x]] = 100.0;
                    }
                }
            }
        }
        let mut progress = NullProgress;
        assert!(active_contour(&mut roi, &volume, [12, 12, 12], 8, &mut progress));
        assert_eq!(roi.data[[12, 12, 12]], LABEL);
        assert_eq!(roi.data[[2, 2, 2]], 0);
    }

    #[test]
    fn invert_and_clear_cover_the_domain() {
        let (mut roi, _) = setup();
        assert!(invert(&mut roi, Domain::Slice(Orientation::Axial, 0)));
        assert!(roi.slice(Orientation::Axial, 0).iter().all(|&v| v == LABEL));
        assert!(roi.slice(Orientation::Axial, 1).iter().all(|&v| v == 0));
        assert!(clear(&mut roi, Domain::Volume));
        assert!(roi.data.iter().all(|&v| v == 0));
        // clearing an empty raster reports no change
        assert!(!clear(&mut roi, Domain::Volume));
    }

    #[test]
    fn mean_threshold_segmentation() {
        let (mut roi, mut volume) = setup();
        volume.data_mut()[[0, 0, 0]] = 1000.0;
        assert!(segment_foreground(&mut roi, &volume, Domain::Volume));
        assert_eq!(roi.data[[0, 0, 0]], LABEL);
        assert_eq!(roi.data[[1, 1, 1]], 0);
        assert!(segment_background(&mut roi, &volume, Domain::Volume));
        assert_eq!(roi.data[[0, 0, 0]], 0);
        assert_eq!(roi.data[[1, 1, 1]], LABEL);
    }
}
