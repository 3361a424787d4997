use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use crate::mesh::TriMesh;

/// Error types for the OBJ module.
#[derive(Debug, thiserror::Error)]
pub enum ObjError {
    /// Error writing file
    #[error("error reading or writing file")]
    IoError(#[from] std::io::Error),

    /// Failed to load the OBJ file
    #[error("Failed to load OBJ file")]
    LoadError(#[from] tobj::LoadError),

    /// A face with fewer than three vertices
    #[error("Face {face} has {arity} vertices, at least 3 are needed")]
    DegenerateFace {
        /// The 0-based face index.
        face: usize,
        /// The number of vertices of the face.
        arity: usize,
    },
}

/// Read a Wavefront OBJ mesh.
///
/// Polygons are kept as they are; every model of the file is merged into one mesh.
/// Colors are kept when every vertex carries `r g b` after its coordinates.
/// Vertices no face references are dropped.
///
/// # Arguments
///
/// * `path` - The path to the OBJ file.
///
/// # Returns
///
/// The mesh with 0-based face indices.
pub fn read_obj(path: impl AsRef<Path>) -> Result<TriMesh, ObjError> {
    let (models, _materials) = tobj::load_obj(
        path.as_ref(),
        &tobj::LoadOptions {
            single_index: false,
            triangulate: false,
            ..Default::default()
        },
    )?;

    let mut vertices = Vec::new();
    let mut colors = Vec::new();
    let mut has_colors = true;
    let mut faces = Vec::new();

    for model in models {
        let mesh = model.mesh;
        let vertex_offset = vertices.len();

        vertices.extend(
            mesh.positions
                .chunks_exact(3)
                .map(|p| [f64::from(p[0]), f64::from(p[1]), f64::from(p[2])]),
        );

        if mesh.vertex_color.len() == mesh.positions.len() {
            colors.extend(
                mesh.vertex_color
                    .chunks_exact(3)
                    .map(|c| [f64::from(c[0]), f64::from(c[1]), f64::from(c[2])]),
            );
        } else {
            has_colors = false;
        }

        // no arities means every face is a triangle
        let arities = if mesh.face_arities.is_empty() {
            vec![3; mesh.indices.len() / 3]
        } else {
            mesh.face_arities.iter().map(|a| *a as usize).collect()
        };

        let mut start = 0;
        for arity in arities {
            if arity < 3 {
                return Err(ObjError::DegenerateFace {
                    face: faces.len(),
                    arity,
                });
            }
            let face = mesh.indices[start..start + arity]
                .iter()
                .map(|i| *i as usize + vertex_offset)
                .collect::<Vec<_>>();
            faces.push(face);
            start += arity;
        }
    }

    let colors = (has_colors && !colors.is_empty()).then_some(colors);

    Ok(TriMesh::new(vertices, colors, faces))
}

/// Write a mesh as a Wavefront OBJ file.
///
/// # Arguments
///
/// * `path` - The path of the file to create.
/// * `mesh` - The mesh to write.
pub fn write_obj(path: impl AsRef<Path>, mesh: &TriMesh) -> Result<(), ObjError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    for (i, v) in mesh.vertices().iter().enumerate() {
        match mesh.colors().and_then(|colors| colors.get(i)) {
            Some(c) => writeln!(
                writer,
                "v {} {} {} {} {} {}",
                v[0], v[1], v[2], c[0], c[1], c[2]
            )?,
            None => writeln!(writer, "v {} {} {}", v[0], v[1], v[2])?,
        }
    }

    for face in mesh.faces().iter() {
        let indices = face
            .iter()
            .map(|i| (i + 1).to_string())
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(writer, "f {indices}")?;
    }

    writer.flush()?;
    Ok(())
}
