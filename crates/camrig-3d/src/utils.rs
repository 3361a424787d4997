/// Utility function to convert a 3D array to a faer column vector.
/// # Arguments
///
/// * `array` - A 3D array.
///
/// # Returns
///
/// A faer column vector.
pub fn array3_to_faer_col(array: &[f64; 3]) -> faer::ColRef<'_, f64> {
    faer::col::from_slice(array.as_slice())
}

/// Utility function to convert a 3x3 array to a faer matrix 3x3.
///
/// # Arguments
///
/// * `array` - A 3x3 row-major array.
///
/// # Returns
///
/// A faer matrix 3x3.
pub fn array33_to_faer_mat33(array: &[[f64; 3]; 3]) -> faer::MatRef<'_, f64> {
    faer::mat::from_row_major_slice(array.as_flattened(), 3, 3)
}

/// Flatten a slice of 3D points into a contiguous slice of coordinates.
pub fn points3_as_flat(points: &[[f64; 3]]) -> &[f64] {
    points.as_flattened()
}

/// Flatten a mutable slice of 3D points into a contiguous slice of coordinates.
pub fn points3_as_flat_mut(points: &mut [[f64; 3]]) -> &mut [f64] {
    points.as_flattened_mut()
}
