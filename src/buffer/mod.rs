//! Contains [`Buffer`], an immutable, reference-counted region of bytes.

mod immutable;

pub use immutable::Buffer;
