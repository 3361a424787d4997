use crate::linalg::IDENTITY_33;

/// Error types for the transforms module.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    /// The rotation axis has no direction.
    #[error("cannot compute rotation matrix from a zero vector")]
    ZeroAxis,
}

/// Axis flip turning a y-down/z-forward camera frame into y-up/z-backward and back.
///
/// Right-multiplying a rotation by this matrix negates its second and third columns.
pub const FLIP_YZ: [[f64; 3]; 3] = [[1.0, 0.0, 0.0], [0.0, -1.0, 0.0], [0.0, 0.0, -1.0]];

/// Axes and rotation vectors shorter than this have no usable direction.
const AXIS_EPS: f64 = 1e-12;

/// Rodrigues' formula for a unit axis `k`: `R = cos(a) I + sin(a) [k]x + (1 - cos(a)) k kᵀ`.
fn rodrigues(k: &[f64; 3], angle: f64) -> [[f64; 3]; 3] {
    let (s, c) = angle.sin_cos();
    let cross = [[0.0, -k[2], k[1]], [k[2], 0.0, -k[0]], [-k[1], k[0], 0.0]];

    let mut m = [[0.0; 3]; 3];
    for (i, row) in m.iter_mut().enumerate() {
        for (j, v) in row.iter_mut().enumerate() {
            *v = c * IDENTITY_33[i][j] + s * cross[i][j] + (1.0 - c) * k[i] * k[j];
        }
    }
    m
}

fn norm3(v: &[f64; 3]) -> f64 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

/// Compute the rotation matrix from an axis and angle.
///
/// The axis is normalized before use; an axis shorter than `1e-12` has no
/// direction and is rejected.
///
/// # Arguments
///
/// * `axis` - The axis of rotation.
/// * `angle` - The angle of rotation in radians.
///
/// Example:
///
/// ```
/// use camrig_3d::transforms::axis_angle_to_rotation_matrix;
///
/// let axis = [1.0, 0.0, 0.0];
/// let angle = std::f64::consts::PI / 2.0;
/// let rotation = axis_angle_to_rotation_matrix(&axis, angle).unwrap();
/// assert!((rotation[1][2] + 1.0).abs() < 1e-12);
/// ```
pub fn axis_angle_to_rotation_matrix(
    axis: &[f64; 3],
    angle: f64,
) -> Result<[[f64; 3]; 3], TransformError> {
    let magnitude = norm3(axis);
    if magnitude < AXIS_EPS {
        return Err(TransformError::ZeroAxis);
    }
    let k = [axis[0] / magnitude, axis[1] / magnitude, axis[2] / magnitude];
    Ok(rodrigues(&k, angle))
}

/// Convert a rotation vector (axis scaled by angle in radians) to a rotation matrix.
///
/// A vector shorter than `1e-12` maps to the identity, matching OpenCV's `Rodrigues`.
///
/// Example:
///
/// ```
/// use camrig_3d::transforms::rotation_vector_to_matrix;
///
/// let rotation = rotation_vector_to_matrix(&[0.0, 0.0, 0.0]);
/// assert_eq!(rotation, [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);
/// ```
pub fn rotation_vector_to_matrix(rvec: &[f64; 3]) -> [[f64; 3]; 3] {
    let theta = norm3(rvec);
    if theta < AXIS_EPS {
        return IDENTITY_33;
    }
    let k = [rvec[0] / theta, rvec[1] / theta, rvec[2] / theta];
    rodrigues(&k, theta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::{matmul33, transpose33};
    use approx::assert_relative_eq;

    #[test]
    fn test_axis_angle_to_rotation_matrix_identity() -> Result<(), Box<dyn std::error::Error>> {
        let axis = [1.0, 0.0, 0.0];
        let angle = std::f64::consts::PI / 2.0;
        let rotation = axis_angle_to_rotation_matrix(&axis, angle)?;
        let expected = [[1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]];
        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(rotation[i][j], expected[i][j], epsilon = 1e-12);
            }
        }
        Ok(())
    }

    #[test]
    fn test_axis_angle_zero_axis() {
        let res = axis_angle_to_rotation_matrix(&[0.0, 0.0, 0.0], 1.0);
        assert!(matches!(res, Err(TransformError::ZeroAxis)));
    }

    #[test]
    fn test_rotation_vector_about_z() {
        let rotation = rotation_vector_to_matrix(&[0.0, 0.0, std::f64::consts::PI / 2.0]);
        let expected = [[0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]];
        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(rotation[i][j], expected[i][j], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_rotation_vector_is_orthonormal() {
        let rotation = rotation_vector_to_matrix(&[0.3, -1.2, 0.7]);
        let product = matmul33(&rotation, &transpose33(&rotation));
        for (i, row) in product.iter().enumerate() {
            for (j, val) in row.iter().enumerate() {
                assert_relative_eq!(*val, IDENTITY_33[i][j], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_tiny_rotation_vector() -> Result<(), TransformError> {
        let angle = 5e-11;
        let rotation = rotation_vector_to_matrix(&[0.0, 0.0, angle]);
        assert_relative_eq!(rotation[1][0], angle, epsilon = 1e-20);
        assert_relative_eq!(rotation[0][1], -angle, epsilon = 1e-20);
        assert_relative_eq!(rotation[2][2], 1.0);

        // same threshold on both paths
        let from_axis = axis_angle_to_rotation_matrix(&[0.0, 0.0, angle], angle)?;
        for (a, b) in from_axis.iter().flatten().zip(rotation.iter().flatten()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-15);
        }
        Ok(())
    }

    #[test]
    fn test_flip_yz_negates_columns() {
        let rotation = rotation_vector_to_matrix(&[0.1, 0.2, 0.3]);
        let flipped = matmul33(&rotation, &FLIP_YZ);
        for i in 0..3 {
            assert_eq!(flipped[i][0], rotation[i][0]);
            assert_eq!(flipped[i][1], -rotation[i][1]);
            assert_eq!(flipped[i][2], -rotation[i][2]);
        }
    }
}
