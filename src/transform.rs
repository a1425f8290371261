/// Rigid placement transform: a rotation (XYZ Euler angles, degrees) about a
/// center of rotation, followed by a translation.
///
/// The inverse is represented by the same parameters with an `inverted` flag
/// so that `get_translations`/`get_rotations` keep reporting the forward
/// parameters a registration produced.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Transform {
    translation: [f32; 3],
    rotation_deg: [f32; 3],
    center: [f32; 3],
    inverted: bool,
}

impl Transform {
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn from_translation(translation: [f32; 3]) -> Self {
        Self {
            translation,
            ..Self::default()
        }
    }

    pub fn new(translation: [f32; 3], rotation_deg: [f32; 3]) -> Self {
        Self {
            translation,
            rotation_deg,
            ..Self::default()
        }
    }

    pub fn get_translations(&self) -> [f32; 3] {
        self.translation
    }

    /// Rotation angles, in degrees when `deg` is true, radians otherwise.
    pub fn get_rotations(&self, deg: bool) -> [f32; 3] {
        if deg {
            self.rotation_deg
        } else {
            self.rotation_deg.map(f32::to_radians)
        }
    }

    pub fn center(&self) -> [f32; 3] {
        self.center
    }

    pub fn set_center(&mut self, center: [f32; 3]) {
        self.center = center;
    }

    pub fn is_identity(&self) -> bool {
        const EPS: f32 = 1e-6;
        self.translation.iter().all(|t| t.abs() < EPS)
            && self.rotation_deg.iter().all(|r| r.abs() < EPS)
    }

    pub fn get_inverse_transform(&self) -> Self {
        Self {
            inverted: !self.inverted,
            ..self.clone()
        }
    }

    /// Forward: `p' = R(p - c) + c + t`. Inverse: `p = Rᵀ(p' - c - t) + c`.
    pub fn apply_to_point(&self, p: [f32; 3]) -> [f32; 3] {
        let r = self.rotation_matrix();
        if self.inverted {
            let q = [
                p[0] - self.center[0] - self.translation[0],
                p[1] - self.center[1] - self.translation[1],
                p[2] - self.center[2] - self.translation[2],
            ];
            let rotated = mat_transpose_mul(&r, q);
            [
                rotated[0] + self.center[0],
                rotated[1] + self.center[1],
                rotated[2] + self.center[2],
            ]
        } else {
            let q = [
                p[0] - self.center[0],
                p[1] - self.center[1],
                p[2] - self.center[2],
            ];
            let rotated = mat_mul(&r, q);
            [
                rotated[0] + self.center[0] + self.translation[0],
                rotated[1] + self.center[1] + self.translation[1],
                rotated[2] + self.center[2] + self.translation[2],
            ]
        }
    }

    /// `R = Rz · Ry · Rx` for XYZ Euler angles.
    fn rotation_matrix(&self) -> [[f32; 3]; 3] {
        let [rx, ry, rz] = self.rotation_deg.map(f32::to_radians);
        let (sx, cx) = rx.sin_cos();
        let (sy, cy) = ry.sin_cos();
        let (sz, cz) = rz.sin_cos();
        [
            [cz * cy, cz * sy * sx - sz * cx, cz * sy * cx + sz * sx],
            [sz * cy, sz * sy * sx + cz * cx, sz * sy * cx - cz * sx],
            [-sy, cy * sx, cy * cx],
        ]
    }
}

fn mat_mul(m: &[[f32; 3]; 3], v: [f32; 3]) -> [f32; 3] {
    [
        m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
        m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
        m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
    ]
}

fn mat_transpose_mul(m: &[[f32; 3]; 3], v: [f32; 3]) -> [f32; 3] {
    [
        m[0][0] * v[0] + m[1][0] * v[1] + m[2][0] * v[2],
        m[0][1] * v[0] + m[1][1] * v[1] + m[2][1] * v[2],
        m[0][2] * v[0] + m[1][2] * v[1] + m[2][2] * v[2],
    ]
}
