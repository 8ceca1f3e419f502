//! Functions to create standard formats
//!
//! A `TrackFormat` holds the markers and field encodings needed to find and decode
//! the sectors of one track.  A given function can create variations on a format
//! depending on its arguments, e.g., the 3.5 inch format varies by zone.

use crate::img;
use crate::img::FieldCode;
use crate::img::tracks::gcr::woz_nibbles::{NIBS_53_256,NIBS_62_256,NIBS_62_524};
use crate::bios::skew;

/// bit pattern that marks off a sector address or data run
#[derive(Clone,Debug)]
struct SectorMarker {
    key: Vec<u8>,
    mask: Vec<u8>,
}

/// Nonstandard prolog and epilog bytes, as used by some disks that are otherwise
/// unprotected.  Any mark left as `None` keeps the standard value.
/// Only the first two bytes of an epilog have to match, the rest are often not
/// written completely.
#[derive(Clone,Debug,Default,PartialEq)]
pub struct SectorMarks {
    pub addr_prolog: Option<Vec<u8>>,
    pub addr_epilog: Option<Vec<u8>>,
    pub data_prolog: Option<Vec<u8>>,
    pub data_epilog: Option<Vec<u8>>
}

impl SectorMarks {
    /// true if every mark is standard
    pub fn is_standard(&self) -> bool {
        *self == Self::default()
    }
    /// Check that every custom mark has 1 to 4 bytes
    pub fn check(&self) -> Result<(),img::Error> {
        for mark in [&self.addr_prolog,&self.addr_epilog,&self.data_prolog,&self.data_epilog] {
            if let Some(key) = mark {
                if key.len()==0 || key.len()>4 {
                    return Err(img::Error::BadSectorMark(hex::encode_upper(key)));
                }
            }
        }
        Ok(())
    }
}

impl SectorMarker {
    fn prolog(key: &[u8]) -> Self {
        Self { key: key.to_vec(), mask: vec![0xff;key.len()] }
    }
    fn epilog(key: &[u8]) -> Self {
        Self { key: key.to_vec(), mask: (0..key.len()).map(|i| if i<2 { 0xff } else { 0x00 }).collect() }
    }
}

/// Format of a track
#[derive(Clone,Debug)]
pub struct TrackFormat {
    addr_nibs: FieldCode,
    data_nibs: FieldCode,
    /// number of decoded bytes in the address field, including checksum
    addr_bytes: usize,
    /// fixed markers used to identify address start, address stop, data start, data stop
    markers: [SectorMarker;4],
    /// nibbles between the data prolog and the data proper
    data_header_nibs: usize,
    /// sectors on the track
    sectors: usize,
    /// decoded bytes per sector, including any tag bytes
    capacity: usize
}

impl TrackFormat {
    pub fn apple_525_13() -> Self {
        Self {
            addr_nibs: FieldCode::WOZ((4,4)),
            data_nibs: FieldCode::WOZ((5,3)),
            addr_bytes: 4,
            markers: [
                SectorMarker {key: vec![0xd5,0xaa,0xb5], mask: vec![0xff,0xff,0xff]},
                SectorMarker {key: vec![0xde,0xaa,0xeb], mask: vec![0xff,0xff,0x00]},
                SectorMarker {key: vec![0xd5,0xaa,0xad], mask: vec![0xff,0xff,0xff]},
                SectorMarker {key: vec![0xde,0xaa,0xeb], mask: vec![0xff,0xff,0x00]},
            ],
            data_header_nibs: 0,
            sectors: 13,
            capacity: 256
        }
    }
    pub fn apple_525_16() -> Self {
        Self {
            addr_nibs: FieldCode::WOZ((4,4)),
            data_nibs: FieldCode::WOZ((6,2)),
            addr_bytes: 4,
            markers: [
                SectorMarker {key: vec![0xd5,0xaa,0x96], mask: vec![0xff,0xff,0xff]},
                SectorMarker {key: vec![0xde,0xaa,0xeb], mask: vec![0xff,0xff,0x00]},
                SectorMarker {key: vec![0xd5,0xaa,0xad], mask: vec![0xff,0xff,0xff]},
                SectorMarker {key: vec![0xde,0xaa,0xeb], mask: vec![0xff,0xff,0x00]},
            ],
            data_header_nibs: 0,
            sectors: 16,
            capacity: 256
        }
    }
    /// The zone is 0 for cylinders 0-15, 1 for 16-31, and so on up to 4.
    pub fn apple_35(zone: usize) -> Self {
        let zone = usize::min(zone,4);
        Self {
            addr_nibs: FieldCode::WOZ((6,2)),
            data_nibs: FieldCode::WOZ((6,2)),
            addr_bytes: 5,
            markers: [
                SectorMarker {key: vec![0xd5,0xaa,0x96], mask: vec![0xff,0xff,0xff]},
                SectorMarker {key: vec![0xde,0xaa], mask: vec![0xff,0xfe]}, // allow for error in the last bit
                SectorMarker {key: vec![0xd5,0xaa,0xad], mask: vec![0xff,0xff,0xff]},
                SectorMarker {key: vec![0xde,0xaa], mask: vec![0xff,0xff]},
            ],
            data_header_nibs: 1,
            sectors: skew::ZONED_SECS_PER_TRACK[zone],
            capacity: 524
        }
    }
    /// Replace the standard markers with any custom ones
    pub fn with_marks(mut self,marks: &SectorMarks) -> Self {
        if let Some(key) = &marks.addr_prolog {
            self.markers[0] = SectorMarker::prolog(key);
        }
        if let Some(key) = &marks.addr_epilog {
            self.markers[1] = SectorMarker::epilog(key);
        }
        if let Some(key) = &marks.data_prolog {
            self.markers[2] = SectorMarker::prolog(key);
        }
        if let Some(key) = &marks.data_epilog {
            self.markers[3] = SectorMarker::epilog(key);
        }
        self
    }
    pub fn addr_nibs(&self) -> FieldCode {
        self.addr_nibs
    }
    pub fn data_nibs(&self) -> FieldCode {
        self.data_nibs
    }
    pub fn addr_bytes(&self) -> usize {
        self.addr_bytes
    }
    /// Get (key,mask) for marker 0 (address prolog), 1 (address epilog), 2 (data prolog), or 3 (data epilog)
    pub fn get_marker(&self,which: usize) -> (&[u8],&[u8]) {
        let marker = &self.markers[which];
        (&marker.key,&marker.mask)
    }
    pub fn data_header_nibs(&self) -> usize {
        self.data_header_nibs
    }
    pub fn sectors(&self) -> usize {
        self.sectors
    }
    /// Decoded bytes in a sector, tag bytes included
    pub fn capacity(&self) -> usize {
        self.capacity
    }
    /// Tag bytes that precede the sector data proper
    pub fn tag_bytes(&self) -> usize {
        match self.capacity {
            524 => 12,
            _ => 0
        }
    }
    /// Nibbles in the data field following the data header, including checksum nibbles
    pub fn data_nib_count(&self) -> usize {
        match (self.data_nibs,self.capacity) {
            (FieldCode::WOZ((5,3)),_) => NIBS_53_256,
            (FieldCode::WOZ((6,2)),524) => NIBS_62_524,
            _ => NIBS_62_256
        }
    }
}

#[test]
fn custom_marks() {
    let marks = SectorMarks {
        addr_prolog: Some(vec![0xd4,0xaa,0x96]),
        data_epilog: Some(vec![0xda,0xaa,0xeb]),
        ..SectorMarks::default()
    };
    let fmt = TrackFormat::apple_525_16().with_marks(&marks);
    assert_eq!(fmt.get_marker(0),(&[0xd4,0xaa,0x96][..],&[0xff,0xff,0xff][..]));
    assert_eq!(fmt.get_marker(2),(&[0xd5,0xaa,0xad][..],&[0xff,0xff,0xff][..]));
    assert_eq!(fmt.get_marker(3),(&[0xda,0xaa,0xeb][..],&[0xff,0xff,0x00][..]));
    assert!(marks.check().is_ok());
    assert!(!marks.is_standard());
    let empty = SectorMarks { data_prolog: Some(vec![]), ..SectorMarks::default() };
    assert!(empty.check().is_err());
}
