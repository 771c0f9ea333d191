//! Reading image files from disk.

use std::path::Path;

use changemark_pipeline::RgbImage;

use crate::error::PairError;

/// Read and decode one image file as 8-bit RGB.
///
/// # Errors
///
/// Returns [`PairError::Read`] if the file cannot be read and
/// [`PairError::Load`] if its contents cannot be decoded.
pub fn load_rgb(path: &Path) -> Result<RgbImage, PairError> {
    let bytes = std::fs::read(path).map_err(|source| PairError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    changemark_pipeline::grayscale::decode_rgb(&bytes).map_err(|source| PairError::Load {
        path: path.to_path_buf(),
        source,
    })
}
