//! # Disk Image Module
//!
//! This module reads WOZ disk images and turns their tracks into flat sector images.
//! The WOZ container is handled by `woz`, with the parts that differ between versions
//! in `woz1` and `woz2`.  Bit level track processing is in `tracks`, and the flat image
//! is put together by `dsk`.
//!
//! ## Disk Kinds
//!
//! The `DiskKind` enumeration identifies the mechanical and encoding characteristics of the
//! captured disk.  The `DiskImage` struct adds what was learned from the container, such as
//! the number of tracks, and answers all the geometry questions the assembler needs.
//!
//! ## Sector Skews
//!
//! The actual skew tables are maintained separately in `bios::skew`.
//! The sector number found in an address field is the "physical" sector.  Where the physical
//! sector lands in the flat image depends on the sector order chosen for the output,
//! see `dsk::SectorOrder`.

use std::fmt;
use tracks::formats::TrackFormat;
use dsk::SectorOrder;
use crate::bios::skew;

pub mod woz;
pub mod woz1;
pub mod woz2;
pub mod tracks;
pub mod dsk;

/// Enumerates disk image errors.  Any of these means the image cannot be converted at all.
/// The `Display` trait will print equivalent long message.
#[derive(thiserror::Error,Debug)]
pub enum Error {
    #[error("unknown image type")]
    UnknownImageType,
    #[error("image checksum mismatch")]
    ChecksumMismatch,
    #[error("required chunk {0} is missing")]
    MissingChunk(&'static str),
    #[error("chunk {0} is malformed")]
    ChunkStructure(&'static str),
    #[error("unknown kind of disk")]
    UnknownDiskKind,
    #[error("sector order not compatible with {0}")]
    ImageTypeMismatch(DiskKind),
    #[error("unknown sector order")]
    UnknownSectorOrder,
    #[error("sector mark {0} must be 1 to 4 bytes")]
    BadSectorMark(String)
}

/// Errors pertaining to nibble encoding.  These are local to a track or sector,
/// the sector is zero filled and the error is reported as a diagnostic.
#[derive(thiserror::Error,Debug,Clone,PartialEq)]
pub enum NibbleError {
    #[error("track missing from image")]
    TrackMissing,
    #[error("sector not found within scan limit")]
    ScanTimeout,
    #[error("bad checksum found in address field")]
    HeaderChecksum,
    #[error("address field belongs to track {0}")]
    TrackMismatch(u8),
    #[error("address epilog not found")]
    AddressEpilogNotFound,
    #[error("data prolog not found")]
    DataPrologNotFound,
    #[error("invalid byte {0:02X} while decoding")]
    InvalidByte(u8),
    #[error("bad checksum found in a sector")]
    BadChecksum,
    #[error("nibble type appeared in wrong context")]
    NibbleType
}

/// Indicates the encoding of a disk field
#[derive(PartialEq,Eq,Clone,Copy,Debug)]
pub enum FieldCode {
    WOZ((usize,usize))
}

/// This enumeration is often used in a match arm to take different
/// actions depending on the kind of disk.
#[derive(PartialEq,Eq,Clone,Copy,Debug)]
pub enum DiskKind {
    /// 5.25 inch, 13 sectors of 256 bytes, 5&3 data
    A2Dos32,
    /// 5.25 inch, 16 sectors of 256 bytes, 6&2 data
    A2Dos33,
    /// 3.5 inch single sided, zoned, 524 byte sectors
    A2Disk400,
    /// 3.5 inch double sided, zoned, 524 byte sectors
    A2Disk800
}

impl fmt::Display for DiskKind {
    fn fmt(&self,f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiskKind::A2Dos32 => write!(f,"Apple 5.25 inch 13 sector"),
            DiskKind::A2Dos33 => write!(f,"Apple 5.25 inch 16 sector"),
            DiskKind::A2Disk400 => write!(f,"Apple 3.5 inch 400K"),
            DiskKind::A2Disk800 => write!(f,"Apple 3.5 inch 800K")
        }
    }
}

impl fmt::Display for FieldCode {
    fn fmt(&self,f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldCode::WOZ((x,y)) => write!(f,"{}&{}",x,y)
        }
    }
}

/// Geometry and encoding of the disk held in a WOZ image.  This is fixed once the
/// container has been read.
#[derive(Clone,Debug)]
pub struct DiskImage {
    kind: DiskKind,
    woz_version: u8,
    tracks_per_side: usize,
    bit_timing: u8
}

impl DiskImage {
    pub fn create(kind: DiskKind,woz_version: u8,tracks_per_side: usize,bit_timing: u8) -> Self {
        Self {
            kind,
            woz_version,
            tracks_per_side,
            bit_timing
        }
    }
    pub fn kind(&self) -> DiskKind {
        self.kind
    }
    pub fn woz_version(&self) -> u8 {
        self.woz_version
    }
    /// optimal bit timing in units of 125 ns, this is informational only
    pub fn bit_timing(&self) -> u8 {
        self.bit_timing
    }
    pub fn sides(&self) -> usize {
        match self.kind {
            DiskKind::A2Disk800 => 2,
            _ => 1
        }
    }
    pub fn tracks_per_side(&self) -> usize {
        self.tracks_per_side
    }
    /// Tracks are numbered `cyl * sides + head`
    pub fn track_count(&self) -> usize {
        self.tracks_per_side * self.sides()
    }
    /// Get (cylinder,head) for a track
    pub fn cyl_head(&self,track: usize) -> (usize,usize) {
        (track / self.sides(), track % self.sides())
    }
    /// Bytes per sector in the flat image, 3.5 inch tag bytes are not counted
    pub fn sector_size(&self) -> usize {
        match self.kind {
            DiskKind::A2Disk400 | DiskKind::A2Disk800 => 512,
            _ => 256
        }
    }
    /// Sectors expected on the track
    pub fn sectors_on(&self,track: usize) -> usize {
        match self.kind {
            DiskKind::A2Dos32 => 13,
            DiskKind::A2Dos33 => 16,
            _ => {
                let (cyl,_) = self.cyl_head(track);
                skew::ZONED_SECS_PER_TRACK[usize::min(cyl/16,4)]
            }
        }
    }
    /// Byte offset of the track in the flat image
    pub fn track_offset(&self,track: usize) -> usize {
        (0..track).map(|t| self.sectors_on(t)).sum::<usize>() * self.sector_size()
    }
    /// Size of the flat image in bytes
    pub fn image_size(&self) -> usize {
        self.track_offset(self.track_count())
    }
    /// Format used to read the given track
    pub fn track_format(&self,track: usize) -> TrackFormat {
        match self.kind {
            DiskKind::A2Dos32 => TrackFormat::apple_525_13(),
            DiskKind::A2Dos33 => TrackFormat::apple_525_16(),
            _ => {
                let (cyl,_) = self.cyl_head(track);
                TrackFormat::apple_35(usize::min(cyl/16,4))
            }
        }
    }
    /// The order in which sectors are customarily stored for this kind of disk
    pub fn default_order(&self) -> SectorOrder {
        match self.kind {
            DiskKind::A2Dos32 => SectorOrder::Physical,
            DiskKind::A2Dos33 => SectorOrder::Dos,
            _ => SectorOrder::ProDos
        }
    }
}

#[test]
fn image_sizes() {
    let dos33 = DiskImage::create(DiskKind::A2Dos33,2,35,32);
    assert_eq!(dos33.image_size(),143360);
    let dos32 = DiskImage::create(DiskKind::A2Dos32,1,35,32);
    assert_eq!(dos32.image_size(),116480);
    let big = DiskImage::create(DiskKind::A2Dos33,2,40,32);
    assert_eq!(big.image_size(),163840);
    let d400 = DiskImage::create(DiskKind::A2Disk400,2,80,16);
    assert_eq!(d400.image_size(),400*1024);
    let d800 = DiskImage::create(DiskKind::A2Disk800,2,80,16);
    assert_eq!(d800.image_size(),800*1024);
    assert_eq!(d800.sectors_on(159),8);
    assert_eq!(d800.cyl_head(33),(16,1));
    assert_eq!(d800.track_offset(32),384*512);
}
