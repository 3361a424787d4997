use argh::FromArgs;
use std::path::PathBuf;

use camrig::{k3d, recon};

#[derive(FromArgs)]
/// Load a camera rig calibration and log the cameras and reference mesh to Rerun
struct Args {
    /// path to the calibration: MVS *_cam.txt files (repeatable), a folder of them, an XML project or a .mat file
    #[argh(option)]
    calib: Vec<PathBuf>,

    /// path to the reference OBJ mesh
    #[argh(option)]
    mesh: Option<PathBuf>,

    /// translation unit of a .mat calibration: mm or m
    #[argh(option)]
    unit: Option<recon::LengthUnit>,

    /// path to a JSON rig configuration
    #[argh(option)]
    config: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    let config = match &args.config {
        Some(path) => recon::RigConfig::from_json_file(path)?,
        None => recon::RigConfig::default(),
    };

    let source = recon::CalibrationSource::from_paths(&args.calib, args.unit)?;

    // the mesh decides the origin offset of the rig
    let reference = args
        .mesh
        .as_ref()
        .map(|path| recon::mesh_origin::load_reference_mesh(path, &source))
        .transpose()?;
    let origin_offset = reference.as_ref().map_or([0.0; 3], |r| r.origin_offset);

    let reconstructor = recon::CameraReconstructor::new(&source, &origin_offset, &config)?;
    if let Some(dir) = reconstructor.output_dir() {
        log::info!("Canonical cameras written to {}", dir.display());
    }

    let cameras = reconstructor.cameras();
    let glyphs = k3d::glyph::camera_glyphs(cameras, &config.glyph_scales())?;
    for glyph in glyphs.iter() {
        log::info!("{}: center {:?}", glyph.label, glyph.center);
    }

    // create a Rerun recording stream
    let rec = rerun::RecordingStreamBuilder::new("Camera Location").spawn()?;

    rec.log("/", &rerun::ViewCoordinates::RIGHT_HAND_Y_DOWN())?;

    if let Some(reference) = reference.as_ref() {
        let mesh = &reference.mesh;
        let positions = mesh
            .vertices()
            .iter()
            .map(|v| [v[0] as f32, v[1] as f32, v[2] as f32])
            .collect::<Vec<_>>();

        // fan-triangulate polygons
        let triangles = mesh
            .faces()
            .iter()
            .flat_map(|face| {
                (1..face.len().saturating_sub(1))
                    .map(move |k| [face[0] as u32, face[k] as u32, face[k + 1] as u32])
            })
            .collect::<Vec<_>>();

        let mut mesh3d = rerun::Mesh3D::new(positions).with_triangle_indices(triangles);
        if let Some(colors) = mesh.colors() {
            mesh3d = mesh3d.with_vertex_colors(colors.iter().map(|c| {
                let to_u8 = |x: f64| (x.clamp(0.0, 1.0) * 255.0).round() as u8;
                rerun::Color::from_rgb(to_u8(c[0]), to_u8(c[1]), to_u8(c[2]))
            }));
        }
        rec.log("mesh", &mesh3d)?;
    }

    // log the camera poses and pinholes
    for (i, glyph) in glyphs.iter().enumerate() {
        let entity = format!("cameras/{}", glyph.label);

        // rerun matrices are column-major: the columns of R^T are the rows of R
        let rotation = cameras.r()[i].map(|row| row.map(|x| x as f32));
        rec.log(
            entity.as_str(),
            &rerun::Transform3D::from_translation_mat3x3(
                glyph.center.map(|x| x as f32),
                rerun::datatypes::Mat3x3::from(rotation),
            ),
        )?;

        rec.log(entity.as_str(), &rerun::ViewCoordinates::RDF())?;

        if let Some(k) = cameras.intrinsic(i) {
            rec.log(
                format!("{entity}/image"),
                &rerun::Pinhole::from_focal_length_and_resolution(
                    [k[0][0] as f32, k[1][1] as f32],
                    [config.image_width as f32, config.image_height as f32],
                )
                .with_principal_point([k[0][2] as f32, k[1][2] as f32]),
            )?;
        }
    }

    // log the glyphs in world coordinates
    let (origins, vectors): (Vec<_>, Vec<_>) = glyphs
        .iter()
        .flat_map(|g| g.axes.iter().map(move |axis| (to_f32(&g.center), to_f32(axis))))
        .unzip();
    let axis_colors = glyphs
        .iter()
        .flat_map(|_| {
            [
                rerun::Color::from_rgb(255, 0, 0),
                rerun::Color::from_rgb(0, 255, 0),
                rerun::Color::from_rgb(0, 0, 255),
            ]
        })
        .collect::<Vec<_>>();
    rec.log(
        "glyphs/axes",
        &rerun::Arrows3D::from_vectors(vectors)
            .with_origins(origins)
            .with_colors(axis_colors),
    )?;

    let strips = glyphs
        .iter()
        .flat_map(|g| g.frustum_edges())
        .map(|[a, b]| vec![to_f32(&a), to_f32(&b)])
        .collect::<Vec<_>>();
    rec.log("glyphs/frustums", &rerun::LineStrips3D::new(strips))?;

    // labels float above each camera, along the camera -y axis
    let label_positions = glyphs
        .iter()
        .map(|g| {
            let up = [-g.rotation[0][1], -g.rotation[1][1], -g.rotation[2][1]];
            to_f32(&k3d::linalg::add3(
                &g.center,
                &k3d::linalg::scale3(&up, g.label_scale),
            ))
        })
        .collect::<Vec<_>>();
    rec.log(
        "glyphs/labels",
        &rerun::Points3D::new(label_positions)
            .with_labels(glyphs.iter().map(|g| g.label.clone())),
    )?;

    Ok(())
}

fn to_f32(v: &[f64; 3]) -> [f32; 3] {
    [v[0] as f32, v[1] as f32, v[2] as f32]
}
