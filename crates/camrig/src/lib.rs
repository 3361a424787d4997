#![doc = env!("CARGO_PKG_DESCRIPTION")]

#[doc(inline)]
pub use camrig_3d as k3d;

#[doc(inline)]
pub use camrig_recon as recon;
