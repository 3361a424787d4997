use std::path::{Path, PathBuf};

use camrig_3d::{
    io::obj::{read_obj, write_obj},
    mesh::TriMesh,
};

use crate::{error::ReconError, source::CalibrationSource};

/// A reference mesh in the canonical frame and the offset that centered it.
#[derive(Debug, Clone)]
pub struct ReferenceMesh {
    /// The mesh, in millimeters, centered on the world origin for rescaled sources.
    pub mesh: TriMesh,
    /// The point moved to the world origin, zero for MVS sources.
    pub origin_offset: [f64; 3],
    /// Where the re-centered mesh was written, if it was.
    pub written_to: Option<PathBuf>,
}

/// Path of the re-centered copy of a mesh: `<dir>/<stem>_1000_origin.obj`.
pub fn recentered_mesh_path(mesh_path: impl AsRef<Path>) -> PathBuf {
    let mesh_path = mesh_path.as_ref();
    let stem = mesh_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    mesh_path.with_file_name(format!("{stem}_1000_origin.obj"))
}

/// Load the reference mesh of a rig and compute the origin offset.
///
/// MVS rigs already live in the millimeter frame of their mesh, so the mesh is
/// returned as read with a zero offset. For Metashape and MATLAB rigs the mesh is
/// scaled to millimeters (from meters for Metashape, from the declared unit for
/// MATLAB), its vertex centroid becomes the offset, the vertices are moved by
/// `-offset` and the result is written next to the input as
/// `<stem>_1000_origin.obj`.
///
/// # Arguments
///
/// * `mesh_path` - The path to the OBJ mesh.
/// * `source` - The calibration source the mesh belongs to.
pub fn load_reference_mesh(
    mesh_path: impl AsRef<Path>,
    source: &CalibrationSource,
) -> Result<ReferenceMesh, ReconError> {
    let mesh_path = mesh_path.as_ref();
    let mesh = read_obj(mesh_path)?;

    log::info!("mesh_path: {}", mesh_path.display());

    let Some(scale) = source.mesh_to_millimeters() else {
        log::info!("origin_offset: [0.0, 0.0, 0.0]");
        return Ok(ReferenceMesh {
            mesh,
            origin_offset: [0.0; 3],
            written_to: None,
        });
    };

    let scaled = mesh.scaled(scale);
    let offset = scaled
        .centroid()
        .ok_or_else(|| ReconError::EmptyMesh(mesh_path.to_path_buf()))?;
    let centered = scaled.translated(&[-offset[0], -offset[1], -offset[2]]);

    let out_path = recentered_mesh_path(mesh_path);
    write_obj(&out_path, &centered)?;

    log::info!("origin_offset: {offset:?}");
    log::debug!("Wrote re-centered mesh to {}", out_path.display());

    Ok(ReferenceMesh {
        mesh: centered,
        origin_offset: offset,
        written_to: Some(out_path),
    })
}
