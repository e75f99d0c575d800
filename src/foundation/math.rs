use crate::foundation::core::Affine;

/// Column-major 4x4 matrix, laid out the way shader `mat4x4<f32>` uniforms expect.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Mat4(pub [f32; 16]);

impl Mat4 {
    /// Identity matrix.
    pub const IDENTITY: Self = Self([
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    ]);

    /// `self * rhs`: applies `rhs` first, then `self`.
    pub fn mul(&self, rhs: &Mat4) -> Mat4 {
        let a = &self.0;
        let b = &rhs.0;
        let mut out = [0.0f32; 16];
        for col in 0..4 {
            for row in 0..4 {
                let mut acc = 0.0f32;
                for k in 0..4 {
                    acc += a[k * 4 + row] * b[col * 4 + k];
                }
                out[col * 4 + row] = acc;
            }
        }
        Mat4(out)
    }

    /// Lift a 2D affine transform into the XY plane of a 4x4 matrix.
    pub fn from_affine(affine: Affine) -> Mat4 {
        let [a, b, c, d, e, f] = affine.as_coeffs();
        let mut m = Self::IDENTITY;
        m.0[0] = a as f32;
        m.0[1] = b as f32;
        m.0[4] = c as f32;
        m.0[5] = d as f32;
        m.0[12] = e as f32;
        m.0[13] = f as f32;
        m
    }

    /// Project back to the 2D affine part (drops Z and perspective terms).
    pub fn to_affine(&self) -> Affine {
        let m = &self.0;
        Affine::new([
            f64::from(m[0]),
            f64::from(m[1]),
            f64::from(m[4]),
            f64::from(m[5]),
            f64::from(m[12]),
            f64::from(m[13]),
        ])
    }

    /// Non-uniform scale in X and Y.
    pub fn scale(x: f32, y: f32) -> Mat4 {
        let mut m = Self::IDENTITY;
        m.0[0] = x;
        m.0[5] = y;
        m
    }

    /// Whether every element is within `eps` of `other`.
    pub fn approx_eq(&self, other: &Mat4, eps: f32) -> bool {
        self.0
            .iter()
            .zip(other.0.iter())
            .all(|(a, b)| (a - b).abs() <= eps)
    }
}

impl Default for Mat4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/math.rs"]
mod tests;
