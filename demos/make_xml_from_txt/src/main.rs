use argh::FromArgs;
use std::path::PathBuf;

use camrig::k3d;

#[derive(FromArgs)]
/// Convert a folder of MVS *_cam.txt files into a Metashape project XML
struct Args {
    /// folder containing the *_cam.txt files
    #[argh(option)]
    txt_folder: PathBuf,

    /// path of the XML file to write
    #[argh(option)]
    output_xml: PathBuf,

    /// image width in pixels
    #[argh(option, default = "1984")]
    width: u32,

    /// image height in pixels
    #[argh(option, default = "1984")]
    height: u32,

    /// scale translations from millimeters to the meters Metashape expects
    #[argh(switch)]
    to_meters: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    let paths = k3d::io::mvs::list_mvs_camera_files(&args.txt_folder)?;
    if paths.is_empty() {
        return Err(format!("No *_cam.txt file in {}", args.txt_folder.display()).into());
    }

    let mut cameras = k3d::io::mvs::read_mvs_cameras(&paths)?;
    log::info!("Read {} cameras from {}", cameras.len(), args.txt_folder.display());

    if args.to_meters {
        for camera in cameras.iter_mut() {
            for row in camera.extrinsic.iter_mut().take(3) {
                row[3] *= 0.001;
            }
        }
    }

    k3d::io::metashape::write_metashape_xml(&args.output_xml, &cameras, (args.width, args.height))?;
    log::info!("Wrote {}", args.output_xml.display());

    Ok(())
}
