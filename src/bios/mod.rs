//! # BIOS module
//!
//! This module is a place for the middleware between decoded tracks and the flat image.
//! It is named in analogy with the CP/M concept of a BIOS as being (in part) a layer
//! between the file system and the physical disk.
//!
//! All the sector skewing tables are kept in this module.

pub mod skew;
