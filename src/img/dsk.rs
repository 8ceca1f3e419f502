//! ## Flat sector images (DO,DSK,PO,D13)
//!
//! A flat image is a sequential dump of decoded sector data, track by track.
//! Within a track the sectors are arranged by a `SectorOrder`, which maps the physical
//! sector number found in the address field to a slot in the file.  The `Assembler` builds
//! the image one track at a time.  Anything that could not be decoded is left as zeros and
//! recorded as a `Diagnostic`, so that assembly always produces a full size image.

use std::fmt;
use std::str::FromStr;
use log::{debug,trace,warn};
use crate::img;
use crate::img::{DiskImage,DiskKind,NibbleError};
use crate::bios::skew;

/// Extensions accepted for the flat image, along with the order each one implies
pub fn file_extensions() -> Vec<String> {
    vec!["do".to_string(),"dsk".to_string(),"po".to_string(),"d13".to_string()]
}

/// Arrangement of sectors within each track of the flat image
#[derive(PartialEq,Eq,Clone,Copy,Debug)]
pub enum SectorOrder {
    /// DOS 3.3 logical order (DO, DSK)
    Dos,
    /// ProDOS block order (PO, also the native order of 3.5 inch images)
    ProDos,
    /// sectors in the order of their address field numbers (D13)
    Physical
}

impl FromStr for SectorOrder {
    type Err = img::Error;
    fn from_str(s: &str) -> Result<Self,Self::Err> {
        match s {
            "dos" => Ok(Self::Dos),
            "prodos" => Ok(Self::ProDos),
            "physical" => Ok(Self::Physical),
            _ => Err(img::Error::UnknownSectorOrder)
        }
    }
}

impl fmt::Display for SectorOrder {
    fn fmt(&self,f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dos => write!(f,"dos"),
            Self::ProDos => write!(f,"prodos"),
            Self::Physical => write!(f,"physical")
        }
    }
}

impl SectorOrder {
    /// Order implied by a file extension, case insensitive, `None` if the extension says nothing
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "po" => Some(Self::ProDos),
            "do" | "dsk" => Some(Self::Dos),
            "d13" => Some(Self::Physical),
            _ => None
        }
    }
    /// Choose an order for the disk, using the extension as a hint.
    /// The hint is only taken if it suits the disk.
    pub fn auto(disk: &DiskImage,ext: Option<&str>) -> Self {
        if let Some(order) = ext.and_then(Self::from_extension) {
            if order.check(disk.kind()).is_ok() {
                return order;
            }
            warn!("extension suggests {} order, which does not suit {}",order,disk.kind());
        }
        disk.default_order()
    }
    /// Is this order meaningful for the given kind of disk
    pub fn check(&self,kind: DiskKind) -> Result<(),img::Error> {
        match (self,kind) {
            (_,DiskKind::A2Dos33) => Ok(()),
            (Self::Physical,DiskKind::A2Dos32) => Ok(()),
            (Self::ProDos | Self::Physical,DiskKind::A2Disk400 | DiskKind::A2Disk800) => Ok(()),
            _ => Err(img::Error::ImageTypeMismatch(kind))
        }
    }
    /// Table mapping physical sector to slot for the given track.
    pub fn slot_table(&self,disk: &DiskImage,track: usize) -> Result<Vec<usize>,img::Error> {
        self.check(disk.kind())?;
        Ok(match (self,disk.kind()) {
            (Self::Dos,DiskKind::A2Dos33) => skew::DOS_PSEC_TO_DOS_LSEC.to_vec(),
            (Self::ProDos,DiskKind::A2Dos33) => skew::DOS_PSEC_TO_PRODOS_SLOT.to_vec(),
            _ => (0..disk.sectors_on(track)).collect()
        })
    }
}

/// A sector that is zero in the image, and why
#[derive(Clone,Debug,PartialEq)]
pub struct Diagnostic {
    /// track number, `cyl * sides + head`
    pub track: usize,
    /// physical sector
    pub sector: usize,
    pub reason: NibbleError
}

impl fmt::Display for Diagnostic {
    fn fmt(&self,f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f,"track {} sector {}: {}",self.track,self.sector,self.reason)
    }
}

/// Result of a conversion, the image is always complete
pub struct Conversion {
    pub disk: DiskImage,
    pub order: SectorOrder,
    pub image: Vec<u8>,
    pub diagnostics: Vec<Diagnostic>
}

/// Places decoded sectors into a zero filled image
pub struct Assembler {
    disk: DiskImage,
    order: SectorOrder,
    data: Vec<u8>,
    diagnostics: Vec<Diagnostic>
}

impl Assembler {
    /// Allocate the image, this fails if the order does not suit the disk
    pub fn create(disk: &DiskImage,order: SectorOrder) -> Result<Self,img::Error> {
        order.check(disk.kind())?;
        debug!("assembling {} bytes in {} order",disk.image_size(),order);
        Ok(Self {
            disk: disk.clone(),
            order,
            data: vec![0;disk.image_size()],
            diagnostics: Vec::new()
        })
    }
    /// Copy the sectors of one track into the image, `sectors` is indexed by physical sector.
    /// Failed sectors are left as zeros and produce a diagnostic.
    pub fn place_track(&mut self,track: usize,sectors: Vec<Result<Vec<u8>,NibbleError>>) -> Result<(),img::Error> {
        let table = self.order.slot_table(&self.disk,track)?;
        let sec_size = self.disk.sector_size();
        let offset = self.disk.track_offset(track);
        for (psec,result) in sectors.into_iter().enumerate() {
            let slot = match skew::slot_from_table(&table,psec) {
                Some(s) => s,
                None => {
                    warn!("track {}: no slot for sector {}",track,psec);
                    continue;
                }
            };
            match result {
                Ok(dat) => {
                    trace!("track {} sector {} -> slot {}",track,psec,slot);
                    let beg = offset + slot*sec_size;
                    let n = usize::min(dat.len(),sec_size);
                    self.data[beg..beg+n].copy_from_slice(&dat[0..n]);
                },
                Err(reason) => self.diagnostics.push(Diagnostic { track, sector: psec, reason })
            }
        }
        Ok(())
    }
    /// Record every sector of a track that is not in the image
    pub fn missing_track(&mut self,track: usize) {
        for sector in 0..self.disk.sectors_on(track) {
            self.diagnostics.push(Diagnostic { track, sector, reason: NibbleError::TrackMissing });
        }
    }
    pub fn finish(self) -> Conversion {
        Conversion {
            disk: self.disk,
            order: self.order,
            image: self.data,
            diagnostics: self.diagnostics
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orders_by_kind() {
        let d33 = DiskImage::create(DiskKind::A2Dos33,2,35,32);
        let d32 = DiskImage::create(DiskKind::A2Dos32,2,35,32);
        let d800 = DiskImage::create(DiskKind::A2Disk800,2,80,16);
        assert_eq!(SectorOrder::auto(&d33,Some("PO")),SectorOrder::ProDos);
        assert_eq!(SectorOrder::auto(&d33,Some("img")),SectorOrder::Dos);
        assert_eq!(SectorOrder::auto(&d32,Some("dsk")),SectorOrder::Physical);
        assert_eq!(SectorOrder::auto(&d800,None),SectorOrder::ProDos);
        assert!(SectorOrder::Dos.check(DiskKind::A2Disk400).is_err());
        assert!(SectorOrder::ProDos.check(DiskKind::A2Dos32).is_err());
        assert_eq!(SectorOrder::from_str("physical").ok(),Some(SectorOrder::Physical));
    }

    #[test]
    fn failures_stay_zero() {
        let disk = DiskImage::create(DiskKind::A2Dos33,2,35,32);
        let mut asm = Assembler::create(&disk,SectorOrder::Dos).expect("order mismatch");
        let mut sectors: Vec<Result<Vec<u8>,NibbleError>> = Vec::new();
        for s in 0..16 {
            sectors.push(Ok(vec![s as u8 + 1;256]));
        }
        sectors[13] = Err(NibbleError::BadChecksum);
        asm.place_track(1,sectors).expect("placement failed");
        asm.missing_track(2);
        let ans = asm.finish();
        assert_eq!(ans.image.len(),143360);
        // physical 13 belongs in logical slot 1
        assert_eq!(ans.image[4096+256],0);
        // physical 7 belongs in logical slot 4
        assert_eq!(ans.image[4096+4*256],8);
        assert_eq!(ans.diagnostics.len(),17);
        assert_eq!(ans.diagnostics[0].to_string(),"track 1 sector 13: bad checksum found in a sector");
        assert_eq!(ans.diagnostics[1].reason,NibbleError::TrackMissing);
    }
}
