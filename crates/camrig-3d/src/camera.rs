use crate::linalg::{compose_rigid, invert_rigid, split_rigid};

/// Error types for the camera module.
#[derive(Debug, thiserror::Error)]
pub enum CameraSetError {
    /// The per-camera sequences differ in length.
    #[error("Camera set needs equal lengths, got {intrinsics} intrinsics, {rotations} rotations and {translations} translations")]
    LengthMismatch {
        /// Number of intrinsic matrices.
        intrinsics: usize,
        /// Number of rotation matrices.
        rotations: usize,
        /// Number of translation vectors.
        translations: usize,
    },
}

/// One camera as read from a calibration source, in that source's native convention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawCameraRecord {
    /// 3x3 intrinsic matrix, row-major.
    pub intrinsic: [[f64; 3]; 3],
    /// 4x4 extrinsic matrix, row-major.
    pub extrinsic: [[f64; 4]; 4],
}

/// Embed a 3x3 intrinsic matrix into a 3x4 matrix whose last column is zero.
pub fn embed_intrinsic(intrinsic: &[[f64; 3]; 3]) -> [[f64; 4]; 3] {
    let mut out = [[0.0; 4]; 3];
    for (dst, src) in out.iter_mut().zip(intrinsic.iter()) {
        dst[..3].copy_from_slice(src);
    }
    out
}

/// Calibration of a camera rig in the canonical convention.
///
/// All cameras share one world frame: millimeter units, world-to-camera rotation
/// and translation, pixel origin at the top-left image corner.
///
/// The number of cameras is fixed at construction and the set cannot be modified.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalCameraSet {
    // 3x4 intrinsics, last column zero
    k: Vec<[[f64; 4]; 3]>,
    // world-to-camera rotations
    r: Vec<[[f64; 3]; 3]>,
    // world-to-camera translations in millimeters
    t: Vec<[f64; 3]>,
}

impl CanonicalCameraSet {
    /// Create a camera set from per-camera intrinsics, rotations and translations.
    ///
    /// # Arguments
    ///
    /// * `intrinsics` - 3x3 intrinsic matrices.
    /// * `rotations` - 3x3 world-to-camera rotations.
    /// * `translations` - world-to-camera translations in millimeters.
    ///
    /// # Errors
    ///
    /// Fails if the three sequences have different lengths.
    pub fn new(
        intrinsics: &[[[f64; 3]; 3]],
        rotations: Vec<[[f64; 3]; 3]>,
        translations: Vec<[f64; 3]>,
    ) -> Result<Self, CameraSetError> {
        if intrinsics.len() != rotations.len() || rotations.len() != translations.len() {
            return Err(CameraSetError::LengthMismatch {
                intrinsics: intrinsics.len(),
                rotations: rotations.len(),
                translations: translations.len(),
            });
        }
        Ok(Self {
            k: intrinsics.iter().map(embed_intrinsic).collect(),
            r: rotations,
            t: translations,
        })
    }

    /// Create a camera set from 3x3 intrinsics and 4x4 world-to-camera extrinsics.
    pub fn from_intrinsics_extrinsics(
        intrinsics: &[[[f64; 3]; 3]],
        extrinsics: &[[[f64; 4]; 4]],
    ) -> Result<Self, CameraSetError> {
        let (rotations, translations): (Vec<_>, Vec<_>) =
            extrinsics.iter().map(split_rigid).unzip();
        Self::new(intrinsics, rotations, translations)
    }

    /// Number of cameras in the set.
    #[inline]
    pub fn len(&self) -> usize {
        self.k.len()
    }

    /// Check if the set holds no camera.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.k.is_empty()
    }

    /// The 3x4 intrinsic matrices.
    pub fn k(&self) -> &[[[f64; 4]; 3]] {
        &self.k
    }

    /// The world-to-camera rotations.
    pub fn r(&self) -> &[[[f64; 3]; 3]] {
        &self.r
    }

    /// The world-to-camera translations in millimeters.
    pub fn t(&self) -> &[[f64; 3]] {
        &self.t
    }

    /// The 3x3 intrinsic matrix of a camera.
    pub fn intrinsic(&self, index: usize) -> Option<[[f64; 3]; 3]> {
        self.k.get(index).map(|k| {
            let mut out = [[0.0; 3]; 3];
            for (dst, src) in out.iter_mut().zip(k.iter()) {
                dst.copy_from_slice(&src[..3]);
            }
            out
        })
    }

    /// The 4x4 world-to-camera extrinsic matrix of a camera.
    pub fn extrinsic(&self, index: usize) -> Option<[[f64; 4]; 4]> {
        Some(compose_rigid(self.r.get(index)?, self.t.get(index)?))
    }

    /// The camera position in world coordinates, `-R^T t`.
    pub fn camera_center(&self, index: usize) -> Option<[f64; 3]> {
        let (_, center) = invert_rigid(self.r.get(index)?, self.t.get(index)?);
        Some(center)
    }

    /// The 3x4 projection matrix `K [R | t]` of a camera.
    pub fn projection_matrix(&self, index: usize) -> Option<[[f64; 4]; 3]> {
        let intrinsic = self.intrinsic(index)?;
        let extrinsic = self.extrinsic(index)?;
        let mut out = [[0.0; 4]; 3];
        for (i, row) in out.iter_mut().enumerate() {
            for (j, val) in row.iter_mut().enumerate() {
                *val = (0..3).map(|k| intrinsic[i][k] * extrinsic[k][j]).sum();
            }
        }
        Some(out)
    }

    /// All 3x3 intrinsic matrices, stacked.
    pub fn intrinsics(&self) -> Vec<[[f64; 3]; 3]> {
        (0..self.len()).filter_map(|i| self.intrinsic(i)).collect()
    }

    /// All 4x4 world-to-camera extrinsic matrices, stacked.
    pub fn extrinsics(&self) -> Vec<[[f64; 4]; 4]> {
        (0..self.len()).filter_map(|i| self.extrinsic(i)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::IDENTITY_33;

    fn intrinsic() -> [[f64; 3]; 3] {
        [[1000.0, 0.0, 500.0], [0.0, 1000.0, 400.0], [0.0, 0.0, 1.0]]
    }

    #[test]
    fn test_new_length_mismatch() {
        let res = CanonicalCameraSet::new(&[intrinsic()], vec![IDENTITY_33; 2], vec![[0.0; 3]]);
        assert!(matches!(
            res,
            Err(CameraSetError::LengthMismatch {
                intrinsics: 1,
                rotations: 2,
                translations: 1
            })
        ));
    }

    #[test]
    fn test_k_embeds_intrinsic() -> Result<(), CameraSetError> {
        let set = CanonicalCameraSet::new(&[intrinsic()], vec![IDENTITY_33], vec![[1.0, 2.0, 3.0]])?;
        assert_eq!(set.len(), 1);
        assert_eq!(set.k()[0][0], [1000.0, 0.0, 500.0, 0.0]);
        assert_eq!(set.k()[0][2], [0.0, 0.0, 1.0, 0.0]);
        assert_eq!(set.intrinsic(0), Some(intrinsic()));
        assert_eq!(set.intrinsic(1), None);
        Ok(())
    }

    #[test]
    fn test_camera_center_and_projection() -> Result<(), CameraSetError> {
        let rotation = [[0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]];
        let set = CanonicalCameraSet::new(&[intrinsic()], vec![rotation], vec![[10.0, 20.0, 30.0]])?;
        assert_eq!(set.camera_center(0), Some([-20.0, 10.0, -30.0]));

        // the camera center projects to the null space of P
        let p = set.projection_matrix(0).expect("camera 0");
        let c = [-20.0, 10.0, -30.0, 1.0];
        for row in p.iter() {
            let v: f64 = row.iter().zip(c.iter()).map(|(a, b)| a * b).sum();
            assert!(v.abs() < 1e-9);
        }
        Ok(())
    }

    #[test]
    fn test_from_intrinsics_extrinsics() -> Result<(), CameraSetError> {
        let extrinsic = compose_rigid(&IDENTITY_33, &[1.0, 2.0, 3.0]);
        let set = CanonicalCameraSet::from_intrinsics_extrinsics(&[intrinsic(); 2], &[extrinsic; 2])?;
        assert_eq!(set.len(), 2);
        assert_eq!(set.t(), &[[1.0, 2.0, 3.0]; 2]);
        assert_eq!(set.extrinsics(), vec![extrinsic; 2]);
        assert_eq!(set.intrinsics(), vec![intrinsic(); 2]);
        Ok(())
    }
}
