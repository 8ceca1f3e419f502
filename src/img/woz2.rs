//! ## Support for WOZ v2 disk images
//!
//! WOZ v2 stores each track as a run of 512 byte blocks, located by a table of `Trk`
//! records at the start of the TRKS chunk.  The INFO layout defined here is also used
//! for WOZ v1, whose INFO chunk is a prefix of this one with the remainder zeroed.
//! The `DiskStruct` trait is used to unflatten the wrapper structures.

// a2kit_macro automatically derives `new`, `to_bytes`, `from_bytes`, and `length` from a DiskStruct.
// This spares us having to manually write code to copy bytes in and out for every new structure.
use a2kit_macro::{DiskStruct,DiskStructError};
use a2kit_macro_derive::DiskStruct;
use crate::img;
use crate::img::tracks::TrackBits;

/// Bytes in the TRK table at the start of the TRKS payload
const TRK_TABLE_BYTES: usize = 1280;

const COMPATIBLE_HARDWARE_OPT: [&str;9] = [
    "Apple ][",
    "Apple ][ Plus",
    "Apple //e (unenhanced)",
    "Apple //c",
    "Apple //e Enhanced",
    "Apple IIgs",
    "Apple //c Plus",
    "Apple ///",
    "Apple /// Plus"
];

/// Put a byte into a JSON object as a hex string
macro_rules! getByte {
    ($obj:ident,$slf:ident.$x:ident) => {
        $obj[stringify!($x)] = json::JsonValue::String(hex::encode([$slf.$x]))
    };
}

/// Put a byte into a JSON object with a `_raw` terminus, `_pretty` is added by hand
macro_rules! getByteEx {
    ($obj:ident,$slf:ident.$x:ident) => {
        $obj[stringify!($x)] = json::JsonValue::new_object();
        $obj[stringify!($x)]["_raw"] = json::JsonValue::String(hex::encode([$slf.$x]))
    };
}

/// Put a multi-byte value into a JSON object with a `_raw` terminus, `_pretty` is added by hand
macro_rules! getHexEx {
    ($obj:ident,$slf:ident.$x:ident) => {
        $obj[stringify!($x)] = json::JsonValue::new_object();
        $obj[stringify!($x)]["_raw"] = json::JsonValue::String(hex::encode($slf.$x))
    };
}

#[derive(DiskStruct)]
pub struct Info {
    id: [u8;4],
    size: [u8;4],
    vers: u8,
    disk_type: u8,
    write_protected: u8,
    synchronized: u8,
    cleaned: u8,
    creator: [u8;32],
    disk_sides: u8,
    boot_sector_format: u8,
    optimal_bit_timing: u8,
    compatible_hardware: [u8;2],
    required_ram: [u8;2],
    largest_track: [u8;2],
    flux_block: [u8;2],
    largest_flux_track: [u8;2],
    pad: [u8;10]
}

#[derive(DiskStruct)]
pub struct Trk {
    starting_block: [u8;2],
    block_count: [u8;2],
    bit_count: [u8;4]
}

impl Info {
    /// 1 for 5.25 inch, 2 for 3.5 inch
    pub fn disk_type(&self) -> u8 {
        self.disk_type
    }
    /// 0 if the image does not say
    pub fn disk_sides(&self) -> u8 {
        match self.vers {
            0 | 1 => 0,
            _ => self.disk_sides
        }
    }
    /// 0 if the image does not say, 1 for 16 sector, 2 for 13 sector, 3 for both
    pub fn boot_sector_format(&self) -> u8 {
        match self.vers {
            0 | 1 => 0,
            _ => self.boot_sector_format
        }
    }
    /// Bit cell width in units of 125 ns, filled in with the standard value if the image does not say
    pub fn optimal_bit_timing(&self) -> u8 {
        match (self.vers,self.optimal_bit_timing,self.disk_type) {
            (0..=1,_,2) | (_,0,2) => 16,
            (0..=1,_,_) | (_,0,_) => 32,
            (_,t,_) => t
        }
    }
    /// Express INFO as a JSON object, byte values are hex strings, some have an interpretation under `_pretty`
    pub fn to_json(&self) -> json::JsonValue {
        let mut obj = json::JsonValue::new_object();
        getByteEx!(obj,self.disk_type);
        obj["disk_type"]["_pretty"] = json::JsonValue::String(match self.disk_type {
            1 => "Apple 5.25 inch".to_string(),
            2 => "Apple 3.5 inch".to_string(),
            _ => "Unexpected value".to_string()
        });
        getByte!(obj,self.write_protected);
        getByte!(obj,self.synchronized);
        getByte!(obj,self.cleaned);
        obj["creator"] = json::JsonValue::String(String::from_utf8_lossy(&self.creator).trim_end().to_string());
        if self.vers>=2 {
            getByte!(obj,self.disk_sides);
            getByteEx!(obj,self.boot_sector_format);
            obj["boot_sector_format"]["_pretty"] = json::JsonValue::String(match self.boot_sector_format {
                0 => "Unknown".to_string(),
                1 => "Boots 16-sector".to_string(),
                2 => "Boots 13-sector".to_string(),
                3 => "Boots both".to_string(),
                _ => "Unexpected value".to_string()
            });
            getByte!(obj,self.optimal_bit_timing);
            getHexEx!(obj,self.compatible_hardware);
            let hard_flags = u16::from_le_bytes(self.compatible_hardware);
            let hardware: Vec<&str> = COMPATIBLE_HARDWARE_OPT.iter().enumerate()
                .filter(|(i,_)| hard_flags & (1 << i) > 0)
                .map(|(_,m)| *m).collect();
            obj["compatible_hardware"]["_pretty"] = json::JsonValue::String(match hardware.len() {
                0 => "unknown".to_string(),
                _ => hardware.join(", ")
            });
            getHexEx!(obj,self.required_ram);
            let ram = u16::from_le_bytes(self.required_ram);
            obj["required_ram"]["_pretty"] = json::JsonValue::String(match ram { 0 => "unknown".to_string(), _ => ram.to_string()+"K" });
            getHexEx!(obj,self.largest_track);
            let lrg_trk = u16::from_le_bytes(self.largest_track);
            obj["largest_track"]["_pretty"] = json::JsonValue::String(lrg_trk.to_string() + " blocks");
        }
        if self.vers>=3 {
            getHexEx!(obj,self.flux_block);
            let flx_blk = u16::from_le_bytes(self.flux_block);
            obj["flux_block"]["_pretty"] = json::JsonValue::String(["block ",&flx_blk.to_string()].concat());
            getHexEx!(obj,self.largest_flux_track);
            let lrg_flx = u16::from_le_bytes(self.largest_flux_track);
            obj["largest_flux_track"]["_pretty"] = json::JsonValue::String(lrg_flx.to_string() + " blocks");
        }
        obj
    }
}

/// Parse the tab separated records of a META chunk, `chunk` includes the chunk header
pub fn parse_meta(chunk: &[u8]) -> Vec<(String,String)> {
    let mut ans = Vec::new();
    if let Err(_) = String::from_utf8(chunk[8..].to_vec()) {
        log::warn!("invalid UTF8 in WOZ META chunk, will use lossy conversion");
    }
    let s = String::from_utf8_lossy(&chunk[8..]);
    for line in s.lines() {
        let cols: Vec<&str> = line.split('\t').collect();
        if cols.len()!=2 {
            log::warn!("wrong tab count in META item {}, skipping",line);
        } else {
            ans.push((cols[0].to_string(),cols[1].to_string()));
        }
    }
    ans
}

/// Gather the tracks from a WOZ v2 TRKS chunk.  The chunk includes its header.
/// Track data is located by block number relative to the start of the file, hence `buf`.
/// The result is indexed by TRK number, a track that cannot be used is `None`.
pub fn load_tracks(chunk: &[u8],buf: &[u8]) -> Result<Vec<Option<TrackBits>>,img::Error> {
    if chunk.len() < 8 + TRK_TABLE_BYTES {
        log::error!("TRKS chunk is {} bytes, too small for the TRK table",chunk.len());
        return Err(img::Error::ChunkStructure("TRKS"));
    }
    let mut ans = Vec::new();
    for idx in 0..160 {
        let trk: Trk = super::woz::unpack(&chunk[8+idx*8..16+idx*8],"TRKS")?;
        let bit_count = u32::from_le_bytes(trk.bit_count) as usize;
        if bit_count==0 {
            ans.push(None);
            continue;
        }
        let begin = u16::from_le_bytes(trk.starting_block) as usize * 512;
        let end = begin + u16::from_le_bytes(trk.block_count) as usize * 512;
        if end > buf.len() || begin + (bit_count+7)/8 > end {
            log::warn!("TRK {} has bits outside the file or its blocks, treating as missing",idx);
            ans.push(None);
            continue;
        }
        log::trace!("TRK {}: {} bits at offset {}",idx,bit_count,begin);
        ans.push(Some(TrackBits::from_woz_bits(bit_count,&buf[begin..end],None)));
    }
    Ok(ans)
}
