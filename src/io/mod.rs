//! Contains modules to interface with other formats. This crate implements [`ipc`].
pub mod ipc;
