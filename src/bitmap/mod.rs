//! Contains utilities to work with validity and boolean bitmaps.
mod mutable;
pub use mutable::MutableBitmap;

pub mod utils;
