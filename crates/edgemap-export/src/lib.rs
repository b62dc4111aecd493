//! edgemap-export: Pure raster encoders (sans-IO)
//!
//! Encodes edge maps and intermediate rasters as PNG or BMP bytes.
//! Only lossless formats are offered, so a binary edge map stays
//! exactly 0/255 after a round trip through a file.

pub mod raster;

pub use raster::{ExportError, ExportFormat, encode, encode_gray};
