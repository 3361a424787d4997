/// A polygon mesh with per-vertex positions, optional colors and faces.
#[derive(Debug, Clone, PartialEq)]
pub struct TriMesh {
    // The vertex positions.
    vertices: Vec<[f64; 3]>,
    // The per-vertex colors, when the source carries them.
    colors: Option<Vec<[f64; 3]>>,
    // The faces as 0-based vertex indices.
    faces: Vec<Vec<usize>>,
}

impl TriMesh {
    /// Create a new mesh from vertices, colors (optional) and faces.
    ///
    /// PRECONDITION: colors, when given, hold one entry per vertex and faces index into vertices.
    pub fn new(
        vertices: Vec<[f64; 3]>,
        colors: Option<Vec<[f64; 3]>>,
        faces: Vec<Vec<usize>>,
    ) -> Self {
        Self {
            vertices,
            colors,
            faces,
        }
    }

    /// Get the number of vertices in the mesh.
    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Get the number of faces in the mesh.
    #[inline]
    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    /// Check if the mesh has no vertex.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Get as reference the vertices of the mesh.
    pub fn vertices(&self) -> &[[f64; 3]] {
        &self.vertices
    }

    /// Get as reference the per-vertex colors of the mesh.
    pub fn colors(&self) -> Option<&[[f64; 3]]> {
        self.colors.as_deref()
    }

    /// Get as reference the faces of the mesh.
    pub fn faces(&self) -> &[Vec<usize>] {
        &self.faces
    }

    /// Mean of all vertex positions, `None` for an empty mesh.
    pub fn centroid(&self) -> Option<[f64; 3]> {
        if self.vertices.is_empty() {
            return None;
        }
        let n = self.vertices.len() as f64;
        let sum = self.vertices.iter().fold([0.0; 3], |acc, v| {
            [acc[0] + v[0], acc[1] + v[1], acc[2] + v[2]]
        });
        Some([sum[0] / n, sum[1] / n, sum[2] / n])
    }

    /// Return a copy of the mesh with every vertex multiplied by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            vertices: self
                .vertices
                .iter()
                .map(|v| [v[0] * factor, v[1] * factor, v[2] * factor])
                .collect(),
            colors: self.colors.clone(),
            faces: self.faces.clone(),
        }
    }

    /// Return a copy of the mesh with `offset` added to every vertex.
    pub fn translated(&self, offset: &[f64; 3]) -> Self {
        Self {
            vertices: self
                .vertices
                .iter()
                .map(|v| [v[0] + offset[0], v[1] + offset[1], v[2] + offset[2]])
                .collect(),
            colors: self.colors.clone(),
            faces: self.faces.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tetrahedron() -> TriMesh {
        TriMesh::new(
            vec![
                [0.0, 0.0, 0.0],
                [4.0, 0.0, 0.0],
                [0.0, 4.0, 0.0],
                [0.0, 0.0, 4.0],
            ],
            None,
            vec![vec![0, 2, 1], vec![0, 1, 3], vec![0, 3, 2], vec![1, 2, 3]],
        )
    }

    #[test]
    fn test_centroid() {
        assert_eq!(tetrahedron().centroid(), Some([1.0, 1.0, 1.0]));
        assert_eq!(TriMesh::new(vec![], None, vec![]).centroid(), None);
    }

    #[test]
    fn test_scaled_then_translated() {
        let mesh = tetrahedron().scaled(1000.0);
        let offset = mesh.centroid().expect("non-empty");
        let centered = mesh.translated(&[-offset[0], -offset[1], -offset[2]]);
        assert_eq!(centered.centroid(), Some([0.0, 0.0, 0.0]));
        assert_eq!(centered.num_faces(), 4);
        assert_eq!(centered.vertices()[1], [3000.0, -1000.0, -1000.0]);
    }
}
