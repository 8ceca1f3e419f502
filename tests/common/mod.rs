//! Builds WOZ images from flat sector images, so that conversions can be checked
//! against known data.  Tracks are laid out the way a standard format routine would,
//! with 10-bit sync bytes in the gaps.  Each sector's fields are kept as nibble lists
//! until the image is serialized, so tests can damage them first.

#![allow(dead_code)]

use bit_vec::BitVec;
use woz2dsk::bios::skew;
use woz2dsk::img::tracks::gcr::woz_nibbles;

pub const DOS33_SIZE: usize = 35*16*256;
pub const DOS32_SIZE: usize = 35*13*256;
/// offset of the first TMAP entry, the INFO chunk always takes 68 bytes
pub const TMAP_OFFSET: usize = 12 + 68 + 8;
const LEAD_SYNC: usize = 40;
const ADDR_SYNC: usize = 16;
const DATA_SYNC: usize = 6;

/// Address and data fields of one sector, as nibbles, markers included
#[derive(Clone)]
pub struct SectorFields {
    pub addr: Vec<u8>,
    pub data: Vec<u8>
}

#[derive(Clone)]
pub struct TrackFields {
    pub sectors: Vec<SectorFields>
}

impl TrackFields {
    /// Track that is nothing but sync bytes
    pub fn blank() -> Self {
        Self { sectors: Vec::new() }
    }
    /// Returns (bytes,bit_count)
    pub fn to_bits(&self) -> (Vec<u8>,usize) {
        let mut bits = BitVec::new();
        push_sync(&mut bits,LEAD_SYNC);
        for sec in &self.sectors {
            push_sync(&mut bits,ADDR_SYNC);
            push_nibs(&mut bits,&sec.addr);
            push_sync(&mut bits,DATA_SYNC);
            push_nibs(&mut bits,&sec.data);
        }
        let count = bits.len();
        (bits.to_bytes(),count)
    }
}

fn push_nibs(bits: &mut BitVec,nibs: &[u8]) {
    for nib in nibs {
        for i in (0..8).rev() {
            bits.push((nib >> i) & 1 == 1);
        }
    }
}

fn push_sync(bits: &mut BitVec,count: usize) {
    for _i in 0..count {
        push_nibs(bits,&[0xff]);
        bits.push(false);
        bits.push(false);
    }
}

/// Fields of a 5.25 inch sector, 16 sector format unless `sectors` is 13
pub fn sector_525(vol: u8,track: u8,psec: u8,dat: &[u8],sectors: usize) -> SectorFields {
    let mut addr = match sectors {
        13 => vec![0xd5,0xaa,0xb5],
        _ => vec![0xd5,0xaa,0x96]
    };
    for val in [vol,track,psec,vol ^ track ^ psec] {
        addr.extend_from_slice(&woz_nibbles::encode_44(val));
    }
    addr.extend_from_slice(&[0xde,0xaa,0xeb]);
    let mut data = vec![0xd5,0xaa,0xad];
    let nibs = match sectors {
        13 => woz_nibbles::encode_sector_53(dat),
        _ => woz_nibbles::encode_sector_62(dat)
    };
    data.append(&mut nibs.expect("could not encode"));
    data.extend_from_slice(&[0xde,0xaa,0xeb]);
    SectorFields { addr, data }
}

/// Fields of a 3.5 inch sector, `dat` is 512 bytes, the tags are zero
pub fn sector_35(cyl: u8,head: u8,sec: u8,dat: &[u8],sides: usize) -> SectorFields {
    let side = head * 0x20 | cyl >> 6;
    let format = match sides {
        1 => 0x02,
        _ => 0x22
    };
    let chk = (cyl & 0x3f) ^ sec ^ side ^ format;
    let mut addr = vec![0xd5,0xaa,0x96];
    for val in [cyl & 0x3f,sec,side,format,chk & 0x3f] {
        addr.push(woz_nibbles::encode_62(val));
    }
    addr.extend_from_slice(&[0xde,0xaa]);
    let mut full = vec![0;12];
    full.extend_from_slice(dat);
    let mut data = vec![0xd5,0xaa,0xad,woz_nibbles::encode_62(sec)];
    data.append(&mut woz_nibbles::encode_sector_62(&full).expect("could not encode"));
    data.extend_from_slice(&[0xde,0xaa]);
    SectorFields { addr, data }
}

/// Lay out a 5.25 inch track from a DOS ordered (16 sector) or physically ordered (13 sector) image.
/// Sectors appear in `sectors[i]` in the order they pass the head.
pub fn track_525(dsk: &[u8],track: usize,sectors: usize) -> TrackFields {
    let mut ans = TrackFields::blank();
    for i in 0..sectors {
        let (psec,slot) = match sectors {
            13 => (skew::DOS32_PHYSICAL[i],skew::DOS32_PHYSICAL[i]),
            _ => (i,skew::DOS_PSEC_TO_DOS_LSEC[i])
        };
        let beg = (track*sectors + slot)*256;
        ans.sectors.push(sector_525(254,track as u8,psec as u8,&dsk[beg..beg+256],sectors));
    }
    ans
}

pub fn zone_sectors(cyl: usize) -> usize {
    [12,11,10,9,8][cyl/16]
}

/// Lay out a 3.5 inch track from a block ordered image, `track` is `cyl * sides + head`
pub fn track_35(dsk: &[u8],track: usize,sides: usize) -> TrackFields {
    let (cyl,head) = (track/sides,track%sides);
    let mut offset = 0;
    for t in 0..track {
        offset += zone_sectors(t/sides)*512;
    }
    let mut ans = TrackFields::blank();
    let count = zone_sectors(cyl);
    for i in 0..count {
        let sec = skew::D35_PHYSICAL[cyl/16][i];
        let beg = offset + sec*512;
        ans.sectors.push(sector_35(cyl as u8,head as u8,sec as u8,&dsk[beg..beg+512],sides));
    }
    ans
}

/// Everything needed to serialize a WOZ image
pub struct WozBuilder {
    pub version: u8,
    pub disk_type: u8,
    pub sides: u8,
    pub boot_sector_format: u8,
    /// indexed by track, `cyl * sides + head`
    pub tracks: Vec<Option<TrackFields>>,
    pub meta: Option<String>,
    /// append a chunk that no reader knows about
    pub unknown_chunk: bool,
    pub store_crc: bool
}

impl WozBuilder {
    /// 16 sector image from DOS ordered data, or 13 sector image from physically ordered data.
    /// The track count follows the data length.
    pub fn from_dsk_525(dsk: &[u8],sectors: usize,version: u8) -> Self {
        let track_count = dsk.len() / (sectors*256);
        Self {
            version,
            disk_type: 1,
            sides: 1,
            boot_sector_format: match sectors { 13 => 2, _ => 1 },
            tracks: (0..track_count).map(|t| Some(track_525(dsk,t,sectors))).collect(),
            meta: None,
            unknown_chunk: false,
            store_crc: true
        }
    }
    /// 400K or 800K image from block ordered data
    pub fn from_dsk_35(dsk: &[u8],sides: usize) -> Self {
        Self {
            version: 2,
            disk_type: 2,
            sides: sides as u8,
            boot_sector_format: 0,
            tracks: (0..80*sides).map(|t| Some(track_35(dsk,t,sides))).collect(),
            meta: None,
            unknown_chunk: false,
            store_crc: true
        }
    }
    /// Write nonstandard data prologs in every sector
    pub fn replace_data_prolog(&mut self,key: &[u8]) {
        for trk in self.tracks.iter_mut().flatten() {
            for sec in trk.sectors.iter_mut() {
                sec.data.splice(0..3,key.iter().copied());
            }
        }
    }
    fn info(&self) -> Vec<u8> {
        let mut ans = chunk_header(b"INFO",60);
        ans.push(self.version);
        ans.push(self.disk_type);
        ans.extend_from_slice(&[0,0,0]);
        let mut creator = b"woz2dsk test fixture".to_vec();
        creator.resize(32,0x20);
        ans.append(&mut creator);
        if self.version >= 2 {
            ans.push(self.sides);
            ans.push(self.boot_sector_format);
            ans.push(match self.disk_type { 2 => 16, _ => 32 });
            ans.extend_from_slice(&[0,0,0,0]);
            ans.extend_from_slice(&u16::to_le_bytes(20));
        }
        ans.resize(68,0);
        ans
    }
    fn tmap(&self) -> Vec<u8> {
        let mut map = [0xff;160];
        let mut idx = 0;
        for (t,maybe_trk) in self.tracks.iter().enumerate() {
            if maybe_trk.is_none() {
                continue;
            }
            match self.disk_type {
                1 => {
                    if t > 0 {
                        map[t*4-1] = idx;
                    }
                    map[t*4] = idx;
                    map[t*4+1] = idx;
                },
                _ => {
                    let sides = self.sides as usize;
                    map[(t/sides)*2 + t%sides] = idx;
                }
            }
            idx += 1;
        }
        let mut ans = chunk_header(b"TMAP",160);
        ans.extend_from_slice(&map);
        ans
    }
    fn trks_v1(&self) -> Vec<u8> {
        let mut recs = Vec::new();
        for trk in self.tracks.iter().flatten() {
            let (mut bits,count) = trk.to_bits();
            let used = bits.len();
            bits.resize(6646,0);
            recs.append(&mut bits);
            recs.extend_from_slice(&u16::to_le_bytes(used as u16));
            recs.extend_from_slice(&u16::to_le_bytes(count as u16));
            recs.extend_from_slice(&u16::to_le_bytes(0xffff));
            recs.extend_from_slice(&[0,0,0,0]);
        }
        let mut ans = chunk_header(b"TRKS",recs.len());
        ans.append(&mut recs);
        ans
    }
    /// TRKS chunk for WOZ v2, assumes the chunk starts at byte 248 so bits start at block 3
    fn trks_v2(&self) -> Vec<u8> {
        let mut table = Vec::new();
        let mut blocks = Vec::new();
        let mut next_block = 3;
        for trk in self.tracks.iter().flatten() {
            let (mut bits,count) = trk.to_bits();
            let block_count = (bits.len() + 511) / 512;
            bits.resize(block_count*512,0);
            table.extend_from_slice(&u16::to_le_bytes(next_block as u16));
            table.extend_from_slice(&u16::to_le_bytes(block_count as u16));
            table.extend_from_slice(&u32::to_le_bytes(count as u32));
            blocks.append(&mut bits);
            next_block += block_count;
        }
        table.resize(1280,0);
        let mut ans = chunk_header(b"TRKS",table.len() + blocks.len());
        ans.append(&mut table);
        ans.append(&mut blocks);
        ans
    }
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut ans = match self.version {
            1 => b"WOZ1".to_vec(),
            _ => b"WOZ2".to_vec()
        };
        ans.extend_from_slice(&[0xff,0x0a,0x0d,0x0a,0,0,0,0]);
        ans.append(&mut self.info());
        ans.append(&mut self.tmap());
        match self.version {
            1 => ans.append(&mut self.trks_v1()),
            _ => ans.append(&mut self.trks_v2())
        };
        if self.unknown_chunk {
            ans.append(&mut chunk_header(b"JUNK",5));
            ans.extend_from_slice(&[1,2,3,4,5]);
        }
        if let Some(meta) = &self.meta {
            ans.append(&mut chunk_header(b"META",meta.len()));
            ans.extend_from_slice(meta.as_bytes());
        }
        if self.store_crc {
            let crc = woz2dsk::img::woz::crc32(0,&ans[12..]);
            ans[8..12].copy_from_slice(&u32::to_le_bytes(crc));
        }
        ans
    }
}

fn chunk_header(id: &[u8;4],size: usize) -> Vec<u8> {
    let mut ans = id.to_vec();
    ans.extend_from_slice(&u32::to_le_bytes(size as u32));
    ans
}

/// Flat image with every sector distinguishable
pub fn pattern_image(size: usize,seed: usize) -> Vec<u8> {
    (0..size).map(|i| ((i/256)*7 + i*seed + (i>>9)) as u8).collect()
}
