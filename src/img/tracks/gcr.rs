//! ## module for GCR tracks
//!
//! This handles bit-level processing of a GCR encoded disk track.
//! The `Scanner` walks a track looking for address fields.  Each address field it finds
//! is reported along with the position of the data field that follows, if there is one.
//! The data field is decoded separately by `decode_data`, so that a damaged data field
//! cannot disturb the search for the next sector.
//!
//! The scan is bounded by the cursor's revolution limit, see `tracks::REVOLUTION_BOUND`.

use crate::img::{NibbleError,FieldCode};
use super::{TrackBits,Cursor};
use super::formats::TrackFormat;

pub mod woz_nibbles;

/// Maximum nibbles between the end of the address field and the data prolog
const DATA_PROLOG_WINDOW: usize = 40;
/// Maximum nibbles before an epilog is declared missing
const EPILOG_WINDOW: usize = 10;

/// Decoded address field.  For 5.25 inch disks `side` and `format` are zero.
/// For 3.5 inch disks `track` holds the low 6 bits of the cylinder, and `side`
/// holds the head in bit 5 and the high bit of the cylinder in bit 0.
#[derive(Clone,Debug,PartialEq)]
pub struct SectorHeader {
    pub volume: u8,
    pub track: u8,
    pub sector: u8,
    pub side: u8,
    pub format: u8,
    pub checksum: u8,
    /// checksum matched and the header belongs to the track being scanned
    pub valid: bool
}

/// An address field found by the scanner
#[derive(Clone,Debug)]
pub struct AddressMark {
    pub header: SectorHeader,
    /// bit position just past the data prolog, or the reason there is no usable data field
    pub data_start: Result<usize,NibbleError>
}

/// Decoded data field
#[derive(Clone,Debug)]
pub struct SectorData {
    /// sector data with tag bytes removed
    pub bytes: Vec<u8>,
    pub checksum_ok: bool
}

impl SectorHeader {
    /// Cylinder number the header claims
    pub fn cylinder(&self) -> usize {
        self.track as usize | ((self.side as usize & 1) << 6)
    }
    /// Head number the header claims (always 0 on 5.25 inch disks)
    pub fn head(&self) -> usize {
        (self.side as usize >> 5) & 1
    }
}

/// Advance the cursor until the pattern is found.
/// Give up after `cap` nibbles have been collected, or when the cursor is exhausted if `cap` is `None`.
/// Low bits in `mask` will cause corresponding bits in `patt` to automatically match. `mask` must be as long as `patt`.
/// On success the cursor is left just past the pattern.
fn find_byte_pattern(cursor: &mut Cursor,patt: &[u8],mask: &[u8],cap: Option<usize>) -> Option<usize> {
    if patt.len()==0 {
        return Some(0);
    }
    let start = cursor.travel();
    let mut matches = 0;
    let mut tries = 0;
    while let Some(test_byte) = cursor.read_nibble() {
        // important this code can start and stop matching on the same byte
        let new_start = test_byte & mask[0] == patt[0] & mask[0];
        let continuing = test_byte & mask[matches] == patt[matches] & mask[matches];
        if continuing {
            matches += 1;
        } else if new_start {
            matches = 1;
        } else {
            matches = 0;
        }
        if matches==patt.len() {
            return Some(cursor.travel() - start);
        }
        tries += 1;
        if let Some(max) = cap {
            if tries >= max {
                return None;
            }
        }
    }
    None
}

/// True if the track contains at least one address prolog for this format.
/// Used to tell 13 sector disks from 16 sector disks when the image does not say.
pub fn has_address_field(bits: &TrackBits,fmt: &TrackFormat) -> bool {
    let mut cursor = Cursor::new(bits,0);
    let (prolog,mask) = fmt.get_marker(0);
    find_byte_pattern(&mut cursor,prolog,mask,None).is_some()
}

pub struct Scanner<'a> {
    cursor: Cursor<'a>,
    fmt: &'a TrackFormat,
    track: usize,
    sides: usize
}

impl <'a> Scanner<'a> {
    /// Create a scanner for the given track, where `track` is `cyl * sides + head`.
    /// Scanning starts at the splice point if one is known.
    pub fn new(bits: &'a TrackBits,fmt: &'a TrackFormat,track: usize,sides: usize) -> Self {
        let start = bits.splice_point().unwrap_or(0);
        Self {
            cursor: Cursor::new(bits,start),
            fmt,
            track,
            sides
        }
    }
    pub fn exhausted(&self) -> bool {
        self.cursor.exhausted()
    }
    /// Read the address bytes that follow the address prolog
    fn decode_addr(&mut self) -> Result<Vec<u8>,NibbleError> {
        let mut ans = Vec::new();
        match self.fmt.addr_nibs() {
            FieldCode::WOZ((4,4)) => {
                for _ in 0..self.fmt.addr_bytes() {
                    let nibs = self.cursor.read_nibbles(2).ok_or(NibbleError::ScanTimeout)?;
                    ans.push(woz_nibbles::decode_44([nibs[0],nibs[1]])?);
                }
            },
            FieldCode::WOZ((6,2)) => {
                for _ in 0..self.fmt.addr_bytes() {
                    let nib = self.cursor.read_nibble().ok_or(NibbleError::ScanTimeout)?;
                    ans.push(woz_nibbles::decode_62(nib)?);
                }
            },
            _ => return Err(NibbleError::NibbleType)
        }
        log::trace!("address bytes {}",hex::encode(&ans));
        Ok(ans)
    }
    /// Interpret decoded address bytes, `valid` is set according to the checksum only
    fn interpret_addr(&self,actual: &[u8]) -> SectorHeader {
        match actual.len() {
            5 => SectorHeader {
                volume: 0,
                track: actual[0],
                sector: actual[1],
                side: actual[2],
                format: actual[3],
                checksum: actual[4],
                valid: (actual[0] ^ actual[1] ^ actual[2] ^ actual[3]) & 0x3f == actual[4]
            },
            _ => SectorHeader {
                volume: actual[0],
                track: actual[1],
                sector: actual[2],
                side: 0,
                format: 0,
                checksum: actual[3],
                valid: actual[0] ^ actual[1] ^ actual[2] == actual[3]
            }
        }
    }
    /// Track number implied by the header, in the same numbering as `self.track`
    fn claimed_track(&self,header: &SectorHeader) -> usize {
        match self.fmt.addr_bytes() {
            5 => header.cylinder() * self.sides + header.head(),
            _ => header.track as usize
        }
    }
    /// Find the next address field, returning `None` once the revolution limit is reached.
    /// The cursor is left at the end of the address field (or the data prolog if it was found),
    /// so repeated calls walk through every sector on the track.
    pub fn next_mark(&mut self) -> Option<AddressMark> {
        let fmt = self.fmt;
        let (adr_pro,adr_pro_mask) = fmt.get_marker(0);
        let (adr_epi,adr_epi_mask) = fmt.get_marker(1);
        let (dat_pro,dat_pro_mask) = fmt.get_marker(2);
        loop {
            find_byte_pattern(&mut self.cursor,adr_pro,adr_pro_mask,None)?;
            let actual = match self.decode_addr() {
                Ok(v) => v,
                Err(NibbleError::ScanTimeout) => return None,
                Err(e) => {
                    log::debug!("skipping address field on track {}: {}",self.track,e);
                    continue;
                }
            };
            let mut header = self.interpret_addr(&actual);
            if !header.valid {
                log::debug!("address checksum mismatch on track {} sector {}",self.track,header.sector);
                return Some(AddressMark {
                    header,
                    data_start: Err(NibbleError::HeaderChecksum)
                });
            }
            let claimed = self.claimed_track(&header);
            if claimed != self.track {
                log::debug!("sector {} claims track {}, expected {}",header.sector,claimed,self.track);
                header.valid = false;
                return Some(AddressMark {
                    header,
                    data_start: Err(NibbleError::TrackMismatch(claimed as u8))
                });
            }
            if find_byte_pattern(&mut self.cursor,adr_epi,adr_epi_mask,Some(EPILOG_WINDOW)).is_none() {
                log::debug!("missed address epilog on track {} sector {}",self.track,header.sector);
                return Some(AddressMark {
                    header,
                    data_start: Err(NibbleError::AddressEpilogNotFound)
                });
            }
            // The data prolog should be close, if it is not found put the cursor back
            // so that the next address field is not skipped.
            let mut scout = self.cursor.clone();
            let data_start = match find_byte_pattern(&mut scout,dat_pro,dat_pro_mask,Some(DATA_PROLOG_WINDOW)) {
                Some(_) => {
                    self.cursor = scout;
                    Ok(self.cursor.position())
                },
                None => {
                    log::debug!("data prolog not found on track {} sector {}",self.track,header.sector);
                    Err(NibbleError::DataPrologNotFound)
                }
            };
            return Some(AddressMark {
                header,
                data_start
            });
        }
    }
}

/// Decode the data field that starts at bit position `data_start` (just past the data prolog).
/// Invalid nibbles are an error, a bad checksum is not, it is flagged in the result.
pub fn decode_data(bits: &TrackBits,fmt: &TrackFormat,data_start: usize) -> Result<SectorData,NibbleError> {
    let mut cursor = Cursor::new(bits,data_start);
    cursor.read_nibbles(fmt.data_header_nibs()).ok_or(NibbleError::ScanTimeout)?;
    let nibs = cursor.read_nibbles(fmt.data_nib_count()).ok_or(NibbleError::ScanTimeout)?;
    let (mut dat,checksum_ok) = match fmt.data_nibs() {
        FieldCode::WOZ((5,3)) => woz_nibbles::decode_sector_53(&nibs)?,
        FieldCode::WOZ((6,2)) => woz_nibbles::decode_sector_62(&nibs)?,
        _ => return Err(NibbleError::NibbleType)
    };
    let (epilog,emask) = fmt.get_marker(3);
    if find_byte_pattern(&mut cursor,epilog,emask,Some(EPILOG_WINDOW)).is_none() {
        // emit a warning, but still accept the data
        log::warn!("data epilog not found");
    }
    Ok(SectorData {
        bytes: dat.split_off(fmt.tag_bytes()),
        checksum_ok
    })
}

/// Scan a track and decode every sector the format calls for.
/// The result is indexed by the sector number found in the address field.
/// Sectors that were never found are `ScanTimeout`, otherwise a failed sector carries the
/// error from its last attempt.  The first good decode of a sector is kept, later copies
/// are ignored.
pub fn scan_track(bits: &TrackBits,fmt: &TrackFormat,track: usize,sides: usize) -> Vec<Result<Vec<u8>,NibbleError>> {
    let count = fmt.sectors();
    let mut ans: Vec<Result<Vec<u8>,NibbleError>> = vec![Err(NibbleError::ScanTimeout);count];
    let mut found = vec![false;count];
    let mut scanner = Scanner::new(bits,fmt,track,sides);
    while found.contains(&false) {
        let mark = match scanner.next_mark() {
            Some(mark) => mark,
            None => break
        };
        let sec = mark.header.sector as usize;
        if sec >= count {
            log::warn!("track {}: sector {} is out of range",track,sec);
            continue;
        }
        if found[sec] {
            log::trace!("track {}: duplicate of sector {} ignored",track,sec);
            continue;
        }
        let result = match mark.data_start {
            Ok(start) => match decode_data(bits,fmt,start) {
                Ok(dat) if dat.checksum_ok => Ok(dat.bytes),
                Ok(_) => Err(NibbleError::BadChecksum),
                Err(e) => Err(e)
            },
            Err(e) => Err(e)
        };
        match &result {
            Ok(_) => found[sec] = true,
            Err(e) => log::debug!("track {} sector {}: {}",track,sec,e)
        }
        ans[sec] = result;
    }
    if scanner.exhausted() {
        log::debug!("track {}: revolution limit reached",track);
    }
    ans
}
