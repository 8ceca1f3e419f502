//! Module for handling Steve Wozniak's nibbles
//!
//! The nibbles handled by this module are a form of group code recording (GCR).
//! Each 8-bit disk byte is derived from multiple bytes of data: the low bits of
//! every data byte are gathered into an auxiliary buffer that is written first, and every
//! disk byte is the XOR of the current value with its predecessor.  Decoding therefore
//! has to run the XOR chain forward before the data can be reassembled.
//!
//! The sector level routines are ports of the CiderPress 1 nibble code.
//! Decoders never fail on a checksum, instead they return the data along with a flag,
//! so that the caller can decide what to do with a damaged sector.

use crate::img::NibbleError;

const INVALID_NIB_BYTE: u8 = 0xff;
const CHUNK53: usize = 0x33;
const CHUNK62: usize = 0x56;
/// 6&2 nibbles in a 256 byte sector, including the checksum nibble
pub const NIBS_62_256: usize = 343;
/// 5&3 nibbles in a 256 byte sector, including the checksum nibble
pub const NIBS_53_256: usize = 411;
/// 6&2 nibbles in a 524 byte sector, including the 4 checksum nibbles
pub const NIBS_62_524: usize = 703;

const FWD_53: [u8;32] = [
    0xab, 0xad, 0xae, 0xaf, 0xb5, 0xb6, 0xb7, 0xba,
    0xbb, 0xbd, 0xbe, 0xbf, 0xd6, 0xd7, 0xda, 0xdb,
    0xdd, 0xde, 0xdf, 0xea, 0xeb, 0xed, 0xee, 0xef,
    0xf5, 0xf6, 0xf7, 0xfa, 0xfb, 0xfd, 0xfe, 0xff
];

const FWD_62: [u8;64] = [
    0x96, 0x97, 0x9a, 0x9b, 0x9d, 0x9e, 0x9f, 0xa6,
    0xa7, 0xab, 0xac, 0xad, 0xae, 0xaf, 0xb2, 0xb3,
    0xb4, 0xb5, 0xb6, 0xb7, 0xb9, 0xba, 0xbb, 0xbc,
    0xbd, 0xbe, 0xbf, 0xcb, 0xcd, 0xce, 0xcf, 0xd3,
    0xd6, 0xd7, 0xd9, 0xda, 0xdb, 0xdc, 0xdd, 0xde,
    0xdf, 0xe5, 0xe6, 0xe7, 0xe9, 0xea, 0xeb, 0xec,
    0xed, 0xee, 0xef, 0xf2, 0xf3, 0xf4, 0xf5, 0xf6,
    0xf7, 0xf9, 0xfa, 0xfb, 0xfc, 0xfd, 0xfe, 0xff
];

/// Build a reverse table at compile time, unused entries are `INVALID_NIB_BYTE`.
const fn invert<const N: usize>(fwd: &[u8;N]) -> [u8;256] {
    let mut ans = [INVALID_NIB_BYTE;256];
    let mut i = 0;
    while i < N {
        ans[fwd[i] as usize] = i as u8;
        i += 1;
    }
    ans
}

const REV_53: [u8;256] = invert(&FWD_53);
const REV_62: [u8;256] = invert(&FWD_62);

/// encode a normal byte as two 4&4 nibbles
pub fn encode_44(val: u8) -> [u8;2] {
    [(val >> 1) | 0xaa, val | 0xaa]
}

/// decode two 4&4 nibbles as a normal byte, a nibble lacking the odd/even clock bits is an error
pub fn decode_44(nibs: [u8;2]) -> Result<u8,NibbleError> {
    if nibs[0] & 0xaa != 0xaa {
        Err(NibbleError::InvalidByte(nibs[0]))
    } else if nibs[1] & 0xaa != 0xaa {
        Err(NibbleError::InvalidByte(nibs[1]))
    } else {
        Ok(((nibs[0] << 1) | 0x01) & nibs[1])
    }
}

/// encode a 5-bit value as a 5&3 nibble
pub fn encode_53(val: u8) -> u8 {
    FWD_53[(val & 0x1f) as usize]
}

/// decode a 5&3 nibble as a 5-bit value
pub fn decode_53(nib: u8) -> Result<u8,NibbleError> {
    match REV_53[nib as usize] {
        INVALID_NIB_BYTE => Err(NibbleError::InvalidByte(nib)),
        ans => Ok(ans)
    }
}

/// encode a 6-bit value as a 6&2 nibble
pub fn encode_62(val: u8) -> u8 {
    FWD_62[(val & 0x3f) as usize]
}

/// decode a 6&2 nibble as a 6-bit value
pub fn decode_62(nib: u8) -> Result<u8,NibbleError> {
    match REV_62[nib as usize] {
        INVALID_NIB_BYTE => Err(NibbleError::InvalidByte(nib)),
        ans => Ok(ans)
    }
}

/// Encode a 256 byte sector as 411 nibbles
pub fn encode_sector_53(dat: &[u8]) -> Result<Vec<u8>,NibbleError> {
    match dat.len() {
        256 => Ok(encode_sector_53_256(dat)),
        _ => Err(NibbleError::NibbleType)
    }
}

/// Decode 411 nibbles, returning (data,checksum_ok)
pub fn decode_sector_53(nibs: &[u8]) -> Result<(Vec<u8>,bool),NibbleError> {
    match nibs.len() {
        NIBS_53_256 => decode_sector_53_256(nibs),
        _ => Err(NibbleError::NibbleType)
    }
}

/// Encode a 256 or 524 byte sector as 343 or 703 nibbles.
/// The 524 byte sector includes the 12 tag bytes.
pub fn encode_sector_62(dat: &[u8]) -> Result<Vec<u8>,NibbleError> {
    match dat.len() {
        256 => Ok(encode_sector_62_256(dat)),
        524 => Ok(encode_sector_62_524(dat)),
        _ => Err(NibbleError::NibbleType)
    }
}

/// Decode 343 or 703 nibbles, returning (data,checksum_ok)
pub fn decode_sector_62(nibs: &[u8]) -> Result<(Vec<u8>,bool),NibbleError> {
    match nibs.len() {
        NIBS_62_256 => decode_sector_62_256(nibs),
        NIBS_62_524 => decode_sector_62_524(nibs),
        _ => Err(NibbleError::NibbleType)
    }
}

fn encode_sector_53_256(dat: &[u8]) -> Vec<u8> {
    // port of CiderPress `EncodeNibble53`
    let mut ans: Vec<u8> = Vec::with_capacity(NIBS_53_256);
    let mut top: [u8;256] = [0;256];
    let mut threes: [u8;154] = [0;154];
    for i in 0..CHUNK53 {
        let offset = CHUNK53-1-i;
        let quint = &dat[i*5..i*5+5];
        for j in 0..5 {
            top[offset+CHUNK53*j] = quint[j] >> 3;
        }
        threes[offset] = (quint[0] & 0x07) << 2 | (quint[3] & 0x04) >> 1 | (quint[4] & 0x04) >> 2;
        threes[offset+CHUNK53] = (quint[1] & 0x07) << 2 | (quint[3] & 0x02) | (quint[4] & 0x02) >> 1;
        threes[offset+CHUNK53*2] = (quint[2] & 0x07) << 2 | (quint[3] & 0x01) << 1 | (quint[4] & 0x01);
    }
    top[255] = dat[255] >> 3;
    threes[153] = dat[255] & 0x07;
    let mut prev = 0;
    for val in threes.iter().rev().chain(top.iter()) {
        ans.push(encode_53(val ^ prev));
        prev = *val;
    }
    ans.push(encode_53(prev));
    ans
}

fn encode_sector_62_256(dat: &[u8]) -> Vec<u8> {
    // port of CiderPress `EncodeNibble62`
    let mut ans: Vec<u8> = Vec::with_capacity(NIBS_62_256);
    let mut top: [u8;256] = [0;256];
    let mut twos: [u8;CHUNK62] = [0;CHUNK62];
    let mut two_shift = 0;
    let mut two_pos = CHUNK62-1;
    for i in 0..256 {
        let val = dat[i];
        top[i] = val >> 2;
        twos[two_pos] |= ((val & 1) << 1 | (val & 2) >> 1) << two_shift;
        if two_pos==0 {
            two_pos = CHUNK62;
            two_shift += 2;
        }
        two_pos -= 1;
    }
    let mut prev = 0;
    for val in twos.iter().rev().chain(top.iter()) {
        ans.push(encode_62(val ^ prev));
        prev = *val;
    }
    ans.push(encode_62(prev));
    ans
}

fn decode_sector_53_256(nibs: &[u8]) -> Result<(Vec<u8>,bool),NibbleError> {
    // port of CiderPress `DecodeNibble53`
    let mut ans: Vec<u8> = Vec::with_capacity(256);
    let mut base: [u8;256] = [0;256];
    let mut threes: [u8;154] = [0;154];
    let mut chksum = 0;
    let mut idx = 0;
    for i in (0..threes.len()).rev() {
        chksum ^= decode_53(nibs[idx])?;
        threes[i] = chksum;
        idx += 1;
    }
    for i in 0..base.len() {
        chksum ^= decode_53(nibs[idx])?;
        base[i] = chksum << 3;
        idx += 1;
    }
    chksum ^= decode_53(nibs[idx])?;
    for i in (0..CHUNK53).rev() {
        let three1 = threes[i];
        let three2 = threes[CHUNK53+i];
        let three3 = threes[CHUNK53*2+i];
        let three4 = (three1 & 0x02) << 1 | (three2 & 0x02) | (three3 & 0x02) >> 1;
        let three5 = (three1 & 0x01) << 2 | (three2 & 0x01) << 1 | (three3 & 0x01);
        ans.push(base[i] | ((three1 >> 2) & 0x07));
        ans.push(base[CHUNK53+i] | ((three2 >> 2) & 0x07));
        ans.push(base[CHUNK53*2+i] | ((three3 >> 2) & 0x07));
        ans.push(base[CHUNK53*3+i] | (three4 & 0x07));
        ans.push(base[CHUNK53*4+i] | (three5 & 0x07));
    }
    ans.push(base[255] | (threes[153] & 0x07));
    Ok((ans,chksum==0))
}

fn decode_sector_62_256(nibs: &[u8]) -> Result<(Vec<u8>,bool),NibbleError> {
    // port of CiderPress `DecodeNibble62`
    let mut ans: Vec<u8> = Vec::with_capacity(256);
    let mut twos: [u8;CHUNK62*3] = [0;CHUNK62*3];
    let mut chksum = 0;
    // first pass recovers the 2-bit fragments, bits are swapped within each pair
    for i in 0..CHUNK62 {
        chksum ^= decode_62(nibs[i])?;
        twos[i] = ((chksum & 0x01) << 1) | ((chksum & 0x02) >> 1);
        twos[i + CHUNK62] = ((chksum & 0x04) >> 1) | ((chksum & 0x08) >> 3);
        twos[i + CHUNK62*2] = ((chksum & 0x10) >> 3) | ((chksum & 0x20) >> 5);
    }
    // second pass merges the high 6 bits
    for i in 0..256 {
        chksum ^= decode_62(nibs[CHUNK62+i])?;
        ans.push((chksum << 2) | twos[i]);
    }
    chksum ^= decode_62(nibs[NIBS_62_256-1])?;
    Ok((ans,chksum==0))
}

/// Tag bytes are included.
fn encode_sector_62_524(dat: &[u8]) -> Vec<u8> {
    // port of CiderPress `EncodeNibbleSector35`
    const CHUNK: usize = 175;
    const DATA_NIBS: usize = 699;
    let mut ans: Vec<u8> = vec![0;NIBS_62_524];
    let mut parts: [[u8;CHUNK];3] = [[0;CHUNK];3];
    let [mut chk0,mut chk1,mut chk2]: [usize;3] = [0;3];
    let mut i: usize = 0;
    let mut s: usize = 0;
    loop {
        chk0 = (chk0 & 0xff) << 1;
        if chk0 & 0x100 > 0 {
            chk0 += 1;
        }
        chk2 += dat[s] as usize;
        if chk0 & 0x100 > 0 {
            chk2 += 1;
            chk0 &= 0xff;
        }
        parts[0][i] = ((dat[s] as usize ^ chk0) & 0xff) as u8;

        chk1 += dat[s+1] as usize;
        if chk2 > 0xff {
            chk1 += 1;
            chk2 &= 0xff;
        }
        parts[1][i] = ((dat[s+1] as usize ^ chk2) & 0xff) as u8;

        if s + 2 >= 524 {
            chk0 &= 0xff;
            chk1 &= 0xff;
            chk2 &= 0xff;
            break;
        }

        chk0 += dat[s+2] as usize;
        if chk1 > 0xff {
            chk0 += 1;
            chk1 &= 0xff;
        }
        parts[2][i] = ((dat[s+2] as usize ^ chk1) & 0xff) as u8;
        i += 1;
        s += 3;
    }
    // the last group has no third byte, its slot is overwritten by the checksum
    for i in 0..CHUNK {
        let twos = ((parts[0][i] & 0xc0) >> 2) | ((parts[1][i] & 0xc0) >> 4) | ((parts[2][i] & 0xc0) >> 6);
        ans[i*4] = encode_62(twos);
        ans[i*4+1] = encode_62(parts[0][i] & 0x3f);
        ans[i*4+2] = encode_62(parts[1][i] & 0x3f);
        ans[i*4+3] = encode_62(parts[2][i] & 0x3f);
    }
    let twos = (((chk0 & 0xc0) >> 6) | ((chk1 & 0xc0) >> 4) | ((chk2 & 0xc0) >> 2)) as u8;
    ans[DATA_NIBS] = encode_62(twos);
    ans[DATA_NIBS+1] = encode_62(chk2 as u8 & 0x3f);
    ans[DATA_NIBS+2] = encode_62(chk1 as u8 & 0x3f);
    ans[DATA_NIBS+3] = encode_62(chk0 as u8 & 0x3f);
    ans
}

/// Tag bytes are included.
fn decode_sector_62_524(nibs: &[u8]) -> Result<(Vec<u8>,bool),NibbleError> {
    // port of CiderPress `DecodeNibbleSector35`
    const CHUNK: usize = 175;
    let mut ans: Vec<u8> = Vec::with_capacity(524);
    let mut parts: [[u8;CHUNK];3] = [[0;CHUNK];3];
    let mut idx = 0;
    for i in 0..CHUNK {
        let twos = decode_62(nibs[idx])?;
        let nib0 = decode_62(nibs[idx+1])?;
        let nib1 = decode_62(nibs[idx+2])?;
        idx += 3;
        let nib2 = match i {
            x if x < CHUNK-1 => {
                idx += 1;
                decode_62(nibs[idx-1])?
            },
            _ => 0
        };
        parts[0][i] = nib0 | ((twos << 2) & 0xc0);
        parts[1][i] = nib1 | ((twos << 4) & 0xc0);
        parts[2][i] = nib2 | ((twos << 6) & 0xc0);
    }

    let [mut chk0,mut chk1,mut chk2]: [usize;3] = [0;3];
    let mut i = 0;
    loop {
        chk0 = (chk0 & 0xff) << 1;
        if chk0 & 0x100 > 0 {
            chk0 += 1;
        }
        let val = (parts[0][i] as usize ^ chk0) as u8;
        chk2 += val as usize;
        if chk0 & 0x100 > 0 {
            chk2 += 1;
            chk0 &= 0xff;
        }
        ans.push(val);

        let val = (parts[1][i] as usize ^ chk2) as u8;
        chk1 += val as usize;
        if chk2 > 0xff {
            chk1 += 1;
            chk2 &= 0xff;
        }
        ans.push(val);

        if ans.len() >= 524 {
            chk0 &= 0xff;
            chk1 &= 0xff;
            chk2 &= 0xff;
            break;
        }

        let val = (parts[2][i] as usize ^ chk1) as u8;
        chk0 += val as usize;
        if chk1 > 0xff {
            chk0 += 1;
            chk1 &= 0xff;
        }
        ans.push(val);
        i += 1;
    }
    let twos = decode_62(nibs[idx])?;
    let rdchk2 = (decode_62(nibs[idx+1])? | ((twos << 2) & 0xc0)) as usize;
    let rdchk1 = (decode_62(nibs[idx+2])? | ((twos << 4) & 0xc0)) as usize;
    let rdchk0 = (decode_62(nibs[idx+3])? | ((twos << 6) & 0xc0)) as usize;
    let ok = chk0==rdchk0 && chk1==rdchk1 && chk2==rdchk2;
    if !ok {
        log::debug!("expect checksum {},{},{} got {},{},{}",chk0,chk1,chk2,rdchk0,rdchk1,rdchk2);
    }
    Ok((ans,ok))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reverse_tables() {
        for i in 0..64 {
            assert_eq!(decode_62(FWD_62[i]).unwrap(),i as u8);
        }
        for i in 0..32 {
            assert_eq!(decode_53(FWD_53[i]).unwrap(),i as u8);
        }
        // reserved bytes never decode
        assert!(matches!(decode_62(0xd5),Err(NibbleError::InvalidByte(0xd5))));
        assert!(matches!(decode_62(0xaa),Err(NibbleError::InvalidByte(0xaa))));
        assert!(matches!(decode_53(0x96),Err(NibbleError::InvalidByte(0x96))));
    }

    #[test]
    fn four_and_four() {
        assert_eq!(encode_44(0xfe),[0xff,0xfe]);
        assert_eq!(decode_44([0xff,0xfe]).unwrap(),0xfe);
        assert!(decode_44([0x00,0xff]).is_err());
    }

    #[test]
    fn checksum_flag_62() {
        let dat: Vec<u8> = (0..256).map(|i| (i*7) as u8).collect();
        let mut nibs = encode_sector_62(&dat).unwrap();
        assert_eq!(nibs.len(),NIBS_62_256);
        let (ans,ok) = decode_sector_62(&nibs).unwrap();
        assert!(ok);
        assert_eq!(ans,dat);
        // swap in a different valid nibble, the data decodes but the checksum fails
        nibs[100] = if nibs[100]==0x96 { 0x97 } else { 0x96 };
        let (_ans,ok) = decode_sector_62(&nibs).unwrap();
        assert!(!ok);
    }

    #[test]
    fn checksum_flag_524() {
        let dat: Vec<u8> = (0..524).map(|i| (i*13 + 5) as u8).collect();
        let mut nibs = encode_sector_62(&dat).unwrap();
        assert_eq!(nibs.len(),NIBS_62_524);
        let (ans,ok) = decode_sector_62(&nibs).unwrap();
        assert!(ok);
        assert_eq!(ans,dat);
        nibs[10] = if nibs[10]==0xff { 0xfe } else { 0xff };
        let (_ans,ok) = decode_sector_62(&nibs).unwrap();
        assert!(!ok);
    }

    #[test]
    fn invalid_nibble_53() {
        let dat = vec![0x5a;256];
        let mut nibs = encode_sector_53(&dat).unwrap();
        assert_eq!(decode_sector_53(&nibs).unwrap(),(dat,true));
        nibs[200] = 0xd5;
        assert!(matches!(decode_sector_53(&nibs),Err(NibbleError::InvalidByte(0xd5))));
    }
}
