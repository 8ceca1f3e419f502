//! ## Common components for WOZ1 or WOZ2 disk images
//!
//! The container is a 12 byte header followed by a list of chunks.  Each chunk is an id,
//! a size, and a payload.  The chunks that matter here are INFO, TMAP, TRKS, and META,
//! anything else is skipped.  The layout of the TRKS chunk is the main difference between
//! the versions, it is handled in `woz1` and `woz2`.
//!
//! Limitations of WOZ support
//! * flux tracks are not decoded, bitstream tracks are used when both are present
//! * half tracks and quarter tracks are never read as tracks in their own right

use log::{debug,info,warn,error};
use a2kit_macro::{DiskStruct,DiskStructError};
use a2kit_macro_derive::DiskStruct;
use crate::img;
use crate::img::{DiskImage,DiskKind};
use crate::img::tracks::TrackBits;
use crate::img::tracks::formats::TrackFormat;
use crate::img::tracks::gcr;
use super::woz2::Info;

pub const INFO_ID: u32 = 0x4f464e49;
pub const TMAP_ID: u32 = 0x50414d54;
pub const TRKS_ID: u32 = 0x534b5254;
pub const WRIT_ID: u32 = 0x54495257;
pub const META_ID: u32 = 0x4154454D;
pub const FLUX_ID: u32 = 0x58554c46;
pub const WOZ1_MAGIC: [u8;4] = [0x57,0x4f,0x5a,0x31];
pub const WOZ2_MAGIC: [u8;4] = [0x57,0x4f,0x5a,0x32];
/// TMAP value meaning no track data
pub const NO_TRACK: u8 = 0xff;

const CRC32_TAB: [u32;256] = [
    0x00000000, 0x77073096, 0xee0e612c, 0x990951ba, 0x076dc419, 0x706af48f,
    0xe963a535, 0x9e6495a3, 0x0edb8832, 0x79dcb8a4, 0xe0d5e91e, 0x97d2d988,
    0x09b64c2b, 0x7eb17cbd, 0xe7b82d07, 0x90bf1d91, 0x1db71064, 0x6ab020f2,
    0xf3b97148, 0x84be41de, 0x1adad47d, 0x6ddde4eb, 0xf4d4b551, 0x83d385c7,
    0x136c9856, 0x646ba8c0, 0xfd62f97a, 0x8a65c9ec, 0x14015c4f, 0x63066cd9,
    0xfa0f3d63, 0x8d080df5, 0x3b6e20c8, 0x4c69105e, 0xd56041e4, 0xa2677172,
    0x3c03e4d1, 0x4b04d447, 0xd20d85fd, 0xa50ab56b, 0x35b5a8fa, 0x42b2986c,
    0xdbbbc9d6, 0xacbcf940, 0x32d86ce3, 0x45df5c75, 0xdcd60dcf, 0xabd13d59,
    0x26d930ac, 0x51de003a, 0xc8d75180, 0xbfd06116, 0x21b4f4b5, 0x56b3c423,
    0xcfba9599, 0xb8bda50f, 0x2802b89e, 0x5f058808, 0xc60cd9b2, 0xb10be924,
    0x2f6f7c87, 0x58684c11, 0xc1611dab, 0xb6662d3d, 0x76dc4190, 0x01db7106,
    0x98d220bc, 0xefd5102a, 0x71b18589, 0x06b6b51f, 0x9fbfe4a5, 0xe8b8d433,
    0x7807c9a2, 0x0f00f934, 0x9609a88e, 0xe10e9818, 0x7f6a0dbb, 0x086d3d2d,
    0x91646c97, 0xe6635c01, 0x6b6b51f4, 0x1c6c6162, 0x856530d8, 0xf262004e,
    0x6c0695ed, 0x1b01a57b, 0x8208f4c1, 0xf50fc457, 0x65b0d9c6, 0x12b7e950,
    0x8bbeb8ea, 0xfcb9887c, 0x62dd1ddf, 0x15da2d49, 0x8cd37cf3, 0xfbd44c65,
    0x4db26158, 0x3ab551ce, 0xa3bc0074, 0xd4bb30e2, 0x4adfa541, 0x3dd895d7,
    0xa4d1c46d, 0xd3d6f4fb, 0x4369e96a, 0x346ed9fc, 0xad678846, 0xda60b8d0,
    0x44042d73, 0x33031de5, 0xaa0a4c5f, 0xdd0d7cc9, 0x5005713c, 0x270241aa,
    0xbe0b1010, 0xc90c2086, 0x5768b525, 0x206f85b3, 0xb966d409, 0xce61e49f,
    0x5edef90e, 0x29d9c998, 0xb0d09822, 0xc7d7a8b4, 0x59b33d17, 0x2eb40d81,
    0xb7bd5c3b, 0xc0ba6cad, 0xedb88320, 0x9abfb3b6, 0x03b6e20c, 0x74b1d29a,
    0xead54739, 0x9dd277af, 0x04db2615, 0x73dc1683, 0xe3630b12, 0x94643b84,
    0x0d6d6a3e, 0x7a6a5aa8, 0xe40ecf0b, 0x9309ff9d, 0x0a00ae27, 0x7d079eb1,
    0xf00f9344, 0x8708a3d2, 0x1e01f268, 0x6906c2fe, 0xf762575d, 0x806567cb,
    0x196c3671, 0x6e6b06e7, 0xfed41b76, 0x89d32be0, 0x10da7a5a, 0x67dd4acc,
    0xf9b9df6f, 0x8ebeeff9, 0x17b7be43, 0x60b08ed5, 0xd6d6a3e8, 0xa1d1937e,
    0x38d8c2c4, 0x4fdff252, 0xd1bb67f1, 0xa6bc5767, 0x3fb506dd, 0x48b2364b,
    0xd80d2bda, 0xaf0a1b4c, 0x36034af6, 0x41047a60, 0xdf60efc3, 0xa867df55,
    0x316e8eef, 0x4669be79, 0xcb61b38c, 0xbc66831a, 0x256fd2a0, 0x5268e236,
    0xcc0c7795, 0xbb0b4703, 0x220216b9, 0x5505262f, 0xc5ba3bbe, 0xb2bd0b28,
    0x2bb45a92, 0x5cb36a04, 0xc2d7ffa7, 0xb5d0cf31, 0x2cd99e8b, 0x5bdeae1d,
    0x9b64c2b0, 0xec63f226, 0x756aa39c, 0x026d930a, 0x9c0906a9, 0xeb0e363f,
    0x72076785, 0x05005713, 0x95bf4a82, 0xe2b87a14, 0x7bb12bae, 0x0cb61b38,
    0x92d28e9b, 0xe5d5be0d, 0x7cdcefb7, 0x0bdbdf21, 0x86d3d2d4, 0xf1d4e242,
    0x68ddb3f8, 0x1fda836e, 0x81be16cd, 0xf6b9265b, 0x6fb077e1, 0x18b74777,
    0x88085ae6, 0xff0f6a70, 0x66063bca, 0x11010b5c, 0x8f659eff, 0xf862ae69,
    0x616bffd3, 0x166ccf45, 0xa00ae278, 0xd70dd2ee, 0x4e048354, 0x3903b3c2,
    0xa7672661, 0xd06016f7, 0x4969474d, 0x3e6e77db, 0xaed16a4a, 0xd9d65adc,
    0x40df0b66, 0x37d83bf0, 0xa9bcae53, 0xdebb9ec5, 0x47b2cf7f, 0x30b5ffe9,
    0xbdbdf21c, 0xcabac28a, 0x53b39330, 0x24b4a3a6, 0xbad03605, 0xcdd70693,
    0x54de5729, 0x23d967bf, 0xb3667a2e, 0xc4614ab8, 0x5d681b02, 0x2a6f2b94,
    0xb40bbe37, 0xc30c8ea1, 0x5a05df1b, 0x2d02ef8d
];

/// Calculate the checksum for the WOZ data in `buf`
pub fn crc32(crc_seed: u32, buf: &[u8]) -> u32
{
    let mut crc = crc_seed ^ !(0 as u32);
    for p in buf {
        crc = CRC32_TAB[((crc ^ *p as u32) & 0xFF) as usize] ^ (crc >> 8);
    }
    return crc ^ !(0 as u32);
}

/// Get the next WOZ chunk.  Return tuple (ptr,id,Option(chunk)).
/// Here `ptr` is the index to the subsequent chunk, which can be passed back in.
/// If `ptr`=0 no more chunks. Option(chunk)=None means unknown id or a size running past the end of the file.
/// The returned chunk buffer includes the id and size in the first 8 bytes.
pub fn get_next_chunk(ptr: usize,buf: &[u8]) -> (usize,u32,Option<&[u8]>) {
    if ptr+8 > buf.len() {
        return (0,0,None);
    }
    let id = u32::from_le_bytes([buf[ptr],buf[ptr+1],buf[ptr+2],buf[ptr+3]]);
    let size = u32::from_le_bytes([buf[ptr+4],buf[ptr+5],buf[ptr+6],buf[ptr+7]]);
    let end = ptr + 8 + size as usize;
    // if size puts us beyond end of file this is not a good chunk, and also no more chunks
    if end > buf.len() {
        warn!("chunk {} at offset {} runs past end of file",String::from_utf8_lossy(&u32::to_le_bytes(id)),ptr);
        return (0,id,None);
    }
    let next = match end+8 > buf.len() {
        true => 0,
        false => end
    };
    debug!("found chunk id {:08X}/{}, at offset {}, next offset {}",id,String::from_utf8_lossy(&u32::to_le_bytes(id)),ptr,next);
    match id {
        INFO_ID | TMAP_ID | TRKS_ID | WRIT_ID | META_ID | FLUX_ID => (next,id,Some(&buf[ptr..end])),
        _ => (next,id,None)
    }
}

/// Unpack a fixed length structure from the start of a chunk
pub fn unpack<T: DiskStruct>(chunk: &[u8],name: &'static str) -> Result<T,img::Error> {
    let mut ans = T::new();
    let len = ans.len();
    if chunk.len() < len {
        error!("{} chunk is {} bytes, expected {}",name,chunk.len(),len);
        return Err(img::Error::ChunkStructure(name));
    }
    match ans.update_from_bytes(&chunk[0..len]) {
        Ok(()) => Ok(ans),
        Err(_) => Err(img::Error::ChunkStructure(name))
    }
}

#[derive(DiskStruct)]
pub struct Header {
    vers: [u8;4],
    high_bits: u8,
    lfcrlf: [u8;3],
    crc32: [u8;4]
}

#[derive(DiskStruct)]
pub struct TMap {
    id: [u8;4],
    size: [u8;4],
    map: [u8;160]
}

/// A WOZ image that has been read into memory.  The tracks are ready to be scanned,
/// nothing has been decoded yet.
pub struct Woz {
    disk: DiskImage,
    info: Info,
    tmap: TMap,
    trks: Vec<Option<TrackBits>>,
    meta: Vec<(String,String)>
}

impl Woz {
    /// Read the container.  Errors here mean the image cannot be used at all.
    pub fn from_bytes(buf: &[u8]) -> Result<Self,img::Error> {
        if buf.len() < 12 {
            return Err(img::Error::UnknownImageType);
        }
        let header: Header = unpack(&buf[0..12],"header")?;
        let version = match header.vers {
            WOZ1_MAGIC => 1,
            WOZ2_MAGIC => 2,
            _ => return Err(img::Error::UnknownImageType)
        };
        if header.high_bits!=0xff || header.lfcrlf!=[0x0a,0x0d,0x0a] {
            debug!("WOZ{} magic present but header is damaged",version);
            return Err(img::Error::UnknownImageType);
        }
        let expected = u32::from_le_bytes(header.crc32);
        if expected!=0 {
            let actual = crc32(0,&buf[12..]);
            if actual!=expected {
                error!("WOZ checksum is {:08X}, header says {:08X}",actual,expected);
                return Err(img::Error::ChecksumMismatch);
            }
        }
        info!("identified WOZ{} image",version);
        let mut maybe_info: Option<Info> = None;
        let mut maybe_tmap: Option<TMap> = None;
        let mut maybe_trks: Option<&[u8]> = None;
        let mut meta = Vec::new();
        let mut ptr = 12;
        loop {
            let (next,id,maybe_chunk) = get_next_chunk(ptr,buf);
            match (id,maybe_chunk) {
                (INFO_ID,Some(chunk)) => maybe_info = Some(unpack(chunk,"INFO")?),
                (TMAP_ID,Some(chunk)) => maybe_tmap = Some(unpack(chunk,"TMAP")?),
                (TRKS_ID,Some(chunk)) => maybe_trks = Some(chunk),
                (META_ID,Some(chunk)) => meta = super::woz2::parse_meta(chunk),
                (FLUX_ID,Some(_)) => warn!("flux tracks are not supported, bitstream tracks will be used"),
                (WRIT_ID,Some(_)) => debug!("ignoring WRIT chunk"),
                (0,None) => {},
                (id,None) => info!("skipping unknown chunk {}",String::from_utf8_lossy(&u32::to_le_bytes(id))),
                _ => {}
            }
            if next==0 {
                break;
            }
            ptr = next;
        }
        let info = maybe_info.ok_or(img::Error::MissingChunk("INFO"))?;
        let tmap = maybe_tmap.ok_or(img::Error::MissingChunk("TMAP"))?;
        let trks_chunk = maybe_trks.ok_or(img::Error::MissingChunk("TRKS"))?;
        let trks = match version {
            1 => super::woz1::load_tracks(trks_chunk)?,
            _ => super::woz2::load_tracks(trks_chunk,buf)?
        };
        let mut ans = Self {
            disk: DiskImage::create(DiskKind::A2Dos33,version,35,info.optimal_bit_timing()),
            info,
            tmap,
            trks,
            meta
        };
        ans.disk = ans.solve_disk(version)?;
        info!("disk kind is {}, {} tracks per side",ans.disk.kind(),ans.disk.tracks_per_side());
        Ok(ans)
    }
    /// Work out the kind of disk from INFO, falling back to the track data when INFO is not specific.
    fn solve_disk(&self,version: u8) -> Result<DiskImage,img::Error> {
        let timing = self.info.optimal_bit_timing();
        match self.info.disk_type() {
            1 => {
                let tracks = match (35..40).any(|t| self.whole_track_525(t).is_some()) {
                    true => 40,
                    false => 35
                };
                let kind = match self.info.boot_sector_format() {
                    1 | 3 => DiskKind::A2Dos33,
                    2 => DiskKind::A2Dos32,
                    _ => self.probe_sector_format()
                };
                Ok(DiskImage::create(kind,version,tracks,timing))
            },
            2 => {
                let kind = match self.info.disk_sides() {
                    1 => DiskKind::A2Disk400,
                    2 => DiskKind::A2Disk800,
                    _ => match (0..80).any(|cyl| self.tmap.map[cyl*2+1]!=NO_TRACK) {
                        true => DiskKind::A2Disk800,
                        false => DiskKind::A2Disk400
                    }
                };
                Ok(DiskImage::create(kind,version,80,timing))
            },
            x => {
                error!("INFO disk type {} is not supported",x);
                Err(img::Error::UnknownDiskKind)
            }
        }
    }
    /// Look for 16 sector address fields on the first track that is present, then for 13 sector ones.
    fn probe_sector_format(&self) -> DiskKind {
        for track in 0..35 {
            if let Some(bits) = self.whole_track_525(track) {
                if gcr::has_address_field(bits,&TrackFormat::apple_525_16()) {
                    debug!("found 16 sector address on track {}",track);
                    return DiskKind::A2Dos33;
                }
                if gcr::has_address_field(bits,&TrackFormat::apple_525_13()) {
                    debug!("found 13 sector address on track {}",track);
                    return DiskKind::A2Dos32;
                }
            }
        }
        warn!("could not determine sector format, assuming 16 sectors");
        DiskKind::A2Dos33
    }
    /// Search the TMAP slots in order and return the first track with bits
    fn trk_from_tmap(&self,slots: &[usize]) -> Option<&TrackBits> {
        for slot in slots {
            let trk_idx = match self.tmap.map.get(*slot) {
                Some(&NO_TRACK) | None => continue,
                Some(idx) => *idx as usize
            };
            match self.trks.get(trk_idx) {
                Some(Some(bits)) if bits.bit_count() > 0 => return Some(bits),
                _ => debug!("TMAP slot {} refers to empty TRK {}",slot,trk_idx)
            }
        }
        None
    }
    /// Bits for a 5.25 inch whole track, falling back to the adjacent quarter tracks
    fn whole_track_525(&self,track: usize) -> Option<&TrackBits> {
        match track {
            0 => self.trk_from_tmap(&[0,1]),
            t => self.trk_from_tmap(&[t*4,t*4+1,t*4-1])
        }
    }
    pub fn disk(&self) -> &DiskImage {
        &self.disk
    }
    /// Get the bits for a track, where `track` is `cyl * sides + head`.
    /// For 5.25 inch disks the whole track is preferred, but the adjacent quarter tracks
    /// are accepted in its place.  Half tracks are never used.
    pub fn track_bits(&self,track: usize) -> Option<&TrackBits> {
        match self.disk.kind() {
            DiskKind::A2Dos32 | DiskKind::A2Dos33 => self.whole_track_525(track),
            _ => {
                let (cyl,head) = self.disk.cyl_head(track);
                self.trk_from_tmap(&[cyl*2+head])
            }
        }
    }
    /// Metadata from INFO and META as a JSON string
    pub fn get_metadata(&self,indent: Option<u16>) -> String {
        let mut root = json::JsonValue::new_object();
        let key = format!("woz{}",self.disk.woz_version());
        root[&key] = json::JsonValue::new_object();
        root[&key]["info"] = self.info.to_json();
        root[&key]["meta"] = json::JsonValue::new_object();
        for (k,v) in &self.meta {
            root[&key]["meta"][k] = json::JsonValue::String(v.to_string());
        }
        if let Some(spaces) = indent {
            json::stringify_pretty(root,spaces)
        } else {
            json::stringify(root)
        }
    }
}
