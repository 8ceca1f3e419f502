//! # `woz2dsk` main library
//!
//! This library converts WOZ disk images, which hold the bitstream of every track, into flat
//! sector images of the kind most emulators and disk utilities expect.  Only unprotected disks
//! with the standard Apple GCR sector layout are in scope.
//!
//! ## Architecture
//!
//! The conversion is a pipeline, each stage in its own module:
//! * `img::woz` reads the container (with `img::woz1` and `img::woz2` for the version specific parts)
//! * `img::tracks::Cursor` walks the bits of a track the way the disk controller does
//! * `img::tracks::gcr` finds address and data fields and decodes them with `img::tracks::gcr::woz_nibbles`
//! * `img::dsk` places the decoded sectors into the flat image, using the tables in `bios::skew`
//!
//! Problems with the container are fatal.  Problems with a track or sector are not, the affected
//! sectors are left as zeros and reported as `img::dsk::Diagnostic`.
//!
//! ## Disk Kinds
//!
//! * 5.25 inch 16 sector (DOS 3.3, ProDOS), 35 or 40 tracks
//! * 5.25 inch 13 sector (DOS 3.2)
//! * 3.5 inch 400K and 800K, the tag bytes are dropped

pub mod bios;
pub mod img;

use log::{debug,info,warn};
use img::woz::Woz;
use img::dsk::{Assembler,Conversion,SectorOrder};
use img::tracks::gcr;
use img::tracks::formats::SectorMarks;

pub type DYNERR = Box<dyn std::error::Error>;
pub type STDRESULT = Result<(),Box<dyn std::error::Error>>;

/// Decode every track of a WOZ image that is already in memory.
/// If `order` is `None` the customary order for the kind of disk is used.
pub fn convert_woz(woz: &Woz,order: Option<SectorOrder>) -> Result<Conversion,DYNERR> {
    convert_woz_with_marks(woz,order,&SectorMarks::default())
}

/// Same as `convert_woz`, but sectors are located using the given prolog and epilog bytes
/// wherever they differ from the standard ones.
pub fn convert_woz_with_marks(woz: &Woz,order: Option<SectorOrder>,marks: &SectorMarks) -> Result<Conversion,DYNERR> {
    marks.check()?;
    let disk = woz.disk();
    let order = order.unwrap_or(disk.default_order());
    let mut asm = Assembler::create(disk,order)?;
    info!("converting {} with {} tracks to {} order",disk.kind(),disk.track_count(),order);
    debug!("WOZ{} image, optimal bit timing {}",disk.woz_version(),disk.bit_timing());
    if !marks.is_standard() {
        info!("using custom sector marks {:?}",marks);
    }
    for track in 0..disk.track_count() {
        match woz.track_bits(track) {
            Some(bits) => {
                let fmt = disk.track_format(track).with_marks(marks);
                debug!("track {}: {} bits, {} sectors",track,bits.bit_count(),fmt.sectors());
                asm.place_track(track,gcr::scan_track(bits,&fmt,track,disk.sides()))?;
            },
            None => {
                warn!("track {} is missing",track);
                asm.missing_track(track);
            }
        }
    }
    Ok(asm.finish())
}

/// Convert a WOZ bytestream to a flat image.  The result includes diagnostics for
/// every sector that could not be recovered.
pub fn convert(woz_data: &[u8],order: Option<SectorOrder>) -> Result<Conversion,DYNERR> {
    let woz = Woz::from_bytes(woz_data)?;
    convert_woz(&woz,order)
}

/// Read a WOZ image from a file
pub fn create_woz_from_file(img_path: &str) -> Result<Woz,DYNERR> {
    match std::fs::read(img_path) {
        Ok(woz_data) => Ok(Woz::from_bytes(&woz_data)?),
        Err(e) => Err(Box::new(e))
    }
}

/// Get the extension of a path if it is one of the flat image extensions
pub fn flat_extension(path: &str) -> Option<String> {
    let ext = std::path::Path::new(path).extension()?.to_str()?.to_lowercase();
    match img::dsk::file_extensions().contains(&ext) {
        true => Some(ext),
        false => None
    }
}
