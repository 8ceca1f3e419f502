//! ## Support for WOZ v1 disk images
//!
//! WOZ v1 stores each track in a fixed 6656 byte record, so the TRKS chunk is simply
//! an array of `Trk`.  WOZ v1 cannot describe 3.5 inch disks, and it carries the splice
//! point, which is where the scan of a track begins.

// a2kit_macro automatically derives `new`, `to_bytes`, `from_bytes`, and `length` from a DiskStruct.
use a2kit_macro::{DiskStruct,DiskStructError};
use a2kit_macro_derive::DiskStruct;
use crate::img;
use crate::img::tracks::TrackBits;

const TRACK_BYTE_CAPACITY: usize = 6646;
const TRK_RECORD_BYTES: usize = 6656;
const NO_SPLICE: u16 = 0xffff;

#[derive(DiskStruct)]
pub struct Trk {
    bits: [u8;TRACK_BYTE_CAPACITY],
    bytes_used: [u8;2],
    bit_count: [u8;2],
    splice_point: [u8;2],
    splice_nib: u8,
    splice_bit_count: u8,
    pad: [u8;2]
}

impl Trk {
    fn to_track_bits(&self) -> Option<TrackBits> {
        let bit_count = u16::from_le_bytes(self.bit_count) as usize;
        if bit_count==0 {
            return None;
        }
        let splice = match u16::from_le_bytes(self.splice_point) {
            NO_SPLICE => None,
            s => Some(s as usize)
        };
        log::trace!("{} bits in {} bytes, splice {:?}",bit_count,u16::from_le_bytes(self.bytes_used),splice);
        Some(TrackBits::from_woz_bits(bit_count,&self.bits,splice))
    }
}

/// Gather the tracks from a WOZ v1 TRKS chunk.  The chunk includes its header.
/// The result is indexed by TRK number, a track with no bits is `None`.
/// A partial record at the end of the chunk is ignored.
pub fn load_tracks(chunk: &[u8]) -> Result<Vec<Option<TrackBits>>,img::Error> {
    let payload = &chunk[8..];
    if payload.len() % TRK_RECORD_BYTES > 0 {
        log::warn!("TRKS chunk has {} extra bytes",payload.len() % TRK_RECORD_BYTES);
    }
    let mut ans = Vec::new();
    for rec in payload.chunks_exact(TRK_RECORD_BYTES) {
        let trk: Trk = super::woz::unpack(rec,"TRKS")?;
        ans.push(trk.to_track_bits());
    }
    log::debug!("found {} TRK records",ans.len());
    Ok(ans)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splice_is_optional() {
        let mut chunk = vec![0x54,0x52,0x4b,0x53,0,0,0,0];
        let mut rec = vec![0xaa;TRK_RECORD_BYTES];
        rec[6648..6650].copy_from_slice(&u16::to_le_bytes(800));
        rec[6650..6652].copy_from_slice(&u16::to_le_bytes(NO_SPLICE));
        chunk.append(&mut rec.clone());
        rec[6648..6650].copy_from_slice(&u16::to_le_bytes(0));
        chunk.append(&mut rec.clone());
        rec[6648..6650].copy_from_slice(&u16::to_le_bytes(800));
        rec[6650..6652].copy_from_slice(&u16::to_le_bytes(96));
        chunk.append(&mut rec);
        let trks = load_tracks(&chunk).expect("could not load");
        assert_eq!(trks.len(),3);
        let first = trks[0].as_ref().expect("missing track");
        assert_eq!(first.bit_count(),800);
        assert_eq!(first.splice_point(),None);
        assert!(trks[1].is_none());
        assert_eq!(trks[2].as_ref().expect("missing track").splice_point(),Some(96));
    }
}
