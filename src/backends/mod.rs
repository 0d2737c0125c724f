//! Backend client implementations shipped with the crate

pub mod memory;
