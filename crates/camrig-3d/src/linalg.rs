use crate::utils;

/// Error types for the linear algebra module.
#[derive(Debug, thiserror::Error)]
pub enum LinalgError {
    /// The source and destination point buffers differ in length.
    #[error("Destination holds {1} points but the source holds {0}")]
    LengthMismatch(usize, usize),
}

/// The 3x3 identity matrix.
pub const IDENTITY_33: [[f64; 3]; 3] = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

/// The 4x4 identity matrix.
pub const IDENTITY_44: [[f64; 4]; 4] = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

/// Transpose a 3x3 matrix.
pub fn transpose33(m: &[[f64; 3]; 3]) -> [[f64; 3]; 3] {
    let mut out = [[0.0; 3]; 3];
    for (i, row) in m.iter().enumerate() {
        for (j, val) in row.iter().enumerate() {
            out[j][i] = *val;
        }
    }
    out
}

/// Multiply two 3x3 matrices as `a * b`.
pub fn matmul33(a: &[[f64; 3]; 3], b: &[[f64; 3]; 3]) -> [[f64; 3]; 3] {
    let mut out = [[0.0; 3]; 3];
    for (i, row) in out.iter_mut().enumerate() {
        for (j, val) in row.iter_mut().enumerate() {
            *val = a[i][0] * b[0][j] + a[i][1] * b[1][j] + a[i][2] * b[2][j];
        }
    }
    out
}

/// Multiply a 3x3 matrix with a column vector as `m * v`.
pub fn matvec33(m: &[[f64; 3]; 3], v: &[f64; 3]) -> [f64; 3] {
    [
        m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
        m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
        m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
    ]
}

/// Component-wise sum of two 3D vectors.
pub fn add3(a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

/// Multiply a 3D vector by a scalar.
pub fn scale3(v: &[f64; 3], s: f64) -> [f64; 3] {
    [v[0] * s, v[1] * s, v[2] * s]
}

/// Invert a rigid transform.
///
/// Given `dst_r_src` and `dst_t_src`, returns `src_r_dst = R^T` and `src_t_dst = -R^T * t`.
///
/// PRECONDITION: the rotation is orthonormal.
///
/// Example:
///
/// ```
/// use camrig_3d::linalg::invert_rigid;
///
/// let rotation = [[0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]];
/// let (r_inv, t_inv) = invert_rigid(&rotation, &[1.0, 2.0, 3.0]);
/// assert_eq!(r_inv, [[0.0, 1.0, 0.0], [-1.0, 0.0, 0.0], [0.0, 0.0, 1.0]]);
/// assert_eq!(t_inv, [-2.0, 1.0, -3.0]);
/// ```
pub fn invert_rigid(dst_r_src: &[[f64; 3]; 3], dst_t_src: &[f64; 3]) -> ([[f64; 3]; 3], [f64; 3]) {
    let src_r_dst = transpose33(dst_r_src);
    let src_t_dst = scale3(&matvec33(&src_r_dst, dst_t_src), -1.0);
    (src_r_dst, src_t_dst)
}

/// Assemble a homogeneous 4x4 transform from a rotation and a translation.
pub fn compose_rigid(rotation: &[[f64; 3]; 3], translation: &[f64; 3]) -> [[f64; 4]; 4] {
    let mut out = IDENTITY_44;
    for i in 0..3 {
        out[i][..3].copy_from_slice(&rotation[i]);
        out[i][3] = translation[i];
    }
    out
}

/// Split a homogeneous 4x4 transform into its rotation block and translation column.
///
/// The last row is ignored.
pub fn split_rigid(transform: &[[f64; 4]; 4]) -> ([[f64; 3]; 3], [f64; 3]) {
    let mut rotation = [[0.0; 3]; 3];
    let mut translation = [0.0; 3];
    for i in 0..3 {
        rotation[i].copy_from_slice(&transform[i][..3]);
        translation[i] = transform[i][3];
    }
    (rotation, translation)
}

/// Transform a set of points using a rotation and translation.
///
/// # Arguments
///
/// * `src_points` - A set of points to be transformed.
/// * `dst_r_src` - A rotation matrix.
/// * `dst_t_src` - A translation vector.
/// * `dst_points` - A pre-allocated vector to store the transformed points.
///
/// PRECONDITION: dst_points is a pre-allocated vector of the same size as source.
///
/// Example:
///
/// ```
/// use camrig_3d::linalg::transform_points;
///
/// let src_points = vec![[2.0, 2.0, 2.0], [3.0, 4.0, 5.0]];
/// let rotation = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
/// let translation = [0.0, 0.0, 0.0];
/// let mut dst_points = vec![[0.0; 3]; src_points.len()];
/// transform_points(&src_points, &rotation, &translation, &mut dst_points).unwrap();
/// ```
pub fn transform_points(
    src_points: &[[f64; 3]],
    dst_r_src: &[[f64; 3]; 3],
    dst_t_src: &[f64; 3],
    dst_points: &mut [[f64; 3]],
) -> Result<(), LinalgError> {
    if src_points.len() != dst_points.len() {
        return Err(LinalgError::LengthMismatch(
            src_points.len(),
            dst_points.len(),
        ));
    }

    let num_points = src_points.len();

    // create views of the rotation and translation matrices
    let dst_r_src_mat = utils::array33_to_faer_mat33(dst_r_src);
    let dst_t_src_col = utils::array3_to_faer_col(dst_t_src);

    // Nx3 row-major view of the source points
    let points_in_src =
        faer::mat::from_row_major_slice(utils::points3_as_flat(src_points), num_points, 3);

    // 3xN column-major view of the destination points, each column is a point
    let mut points_in_dst =
        faer::mat::from_column_major_slice_mut(utils::points3_as_flat_mut(dst_points), 3, num_points);

    faer::linalg::matmul::matmul(
        points_in_dst.as_mut(),
        dst_r_src_mat,
        points_in_src.transpose(),
        None,
        1.0,
        faer::Parallelism::None,
    );

    let (tx, ty, tz) = (
        dst_t_src_col.read(0),
        dst_t_src_col.read(1),
        dst_t_src_col.read(2),
    );

    for mut col in points_in_dst.col_iter_mut() {
        col.write(0, col.read(0) + tx);
        col.write(1, col.read(1) + ty);
        col.write(2, col.read(2) + tz);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_transform_points_identity() -> Result<(), LinalgError> {
        let src_points = vec![[2.0, 2.0, 2.0], [3.0, 4.0, 5.0]];
        let mut dst_points = vec![[0.0; 3]; src_points.len()];
        transform_points(&src_points, &IDENTITY_33, &[0.0; 3], &mut dst_points)?;
        assert_eq!(dst_points, src_points);
        Ok(())
    }

    #[test]
    fn test_transform_points_roundtrip() -> Result<(), LinalgError> {
        let src_points = vec![[2.0, 2.0, 2.0], [3.0, 4.0, 5.0]];
        let rotation = [[1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]];
        let translation = [1.0, 2.0, 3.0];

        let mut dst_points = vec![[0.0; 3]; src_points.len()];
        transform_points(&src_points, &rotation, &translation, &mut dst_points)?;

        let (rotation_inv, translation_inv) = invert_rigid(&rotation, &translation);
        let mut dst_points_src = vec![[0.0; 3]; dst_points.len()];
        transform_points(
            &dst_points,
            &rotation_inv,
            &translation_inv,
            &mut dst_points_src,
        )?;

        for (p, q) in dst_points_src.iter().zip(src_points.iter()) {
            for k in 0..3 {
                assert_relative_eq!(p[k], q[k], epsilon = 1e-12);
            }
        }
        Ok(())
    }

    #[test]
    fn test_transform_points_length_mismatch() {
        let src_points = vec![[1.0, 2.0, 3.0]];
        let mut dst_points = vec![[0.0; 3]; 2];
        let res = transform_points(&src_points, &IDENTITY_33, &[0.0; 3], &mut dst_points);
        assert!(matches!(res, Err(LinalgError::LengthMismatch(1, 2))));
    }

    #[test]
    fn test_matmul33_with_transpose_is_identity() {
        let rotation = [[0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]];
        assert_eq!(matmul33(&rotation, &transpose33(&rotation)), IDENTITY_33);
    }

    #[test]
    fn test_compose_split_rigid() {
        let rotation = [[0.0, 0.0, 1.0], [0.0, 1.0, 0.0], [-1.0, 0.0, 0.0]];
        let translation = [4.0, -5.0, 6.0];
        let transform = compose_rigid(&rotation, &translation);
        assert_eq!(transform[3], [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(transform[0], [0.0, 0.0, 1.0, 4.0]);
        let (r, t) = split_rigid(&transform);
        assert_eq!(r, rotation);
        assert_eq!(t, translation);
    }

    #[test]
    fn test_invert_rigid_twice() {
        let rotation = [[0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]];
        let translation = [1.0, 2.0, 3.0];
        let (r_inv, t_inv) = invert_rigid(&rotation, &translation);
        let (r, t) = invert_rigid(&r_inv, &t_inv);
        assert_eq!(r, rotation);
        assert_eq!(t, translation);
    }
}
