//! # Track Bits and Cursors
//!
//! This module provides tools for working with tracks at the bitstream level.
//! The `TrackBits` struct holds the bits of one track as captured in a WOZ image.
//! The `Cursor` struct walks those bits the way the disk controller does, one bit at a time,
//! wrapping around at the end of the track.
//!
//! A track is a loop, so without some bound a search for a missing pattern would never end.
//! Every cursor therefore keeps count of the bits it has consumed, and gives up once it has
//! gone around the track `REVOLUTION_BOUND` times.  All scanning in the crate is built on this,
//! which is why no search needs a separate timeout.

use bit_vec::BitVec;

pub mod gcr;
pub mod formats;

/// Number of full revolutions a cursor may travel before it is exhausted
pub const REVOLUTION_BOUND: usize = 2;

/// The bits of a single track, MSB first, with padding removed.
#[derive(Clone)]
pub struct TrackBits {
    stream: BitVec,
    /// bit offset where the capture tool joined the track, if known (WOZ1 only)
    splice: Option<usize>
}

impl TrackBits {
    /// Create from a WOZ track buffer.  Bits beyond `bit_count` are padding and are dropped.
    /// If `bit_count` asks for more bits than the buffer holds, the track is shortened.
    pub fn from_woz_bits(bit_count: usize,buf: &[u8],splice: Option<usize>) -> Self {
        let mut stream = BitVec::from_bytes(buf);
        if bit_count > stream.len() {
            log::warn!("bit count {} exceeds track buffer of {} bits",bit_count,stream.len());
        }
        stream.truncate(bit_count);
        let splice = match splice {
            Some(s) if s < stream.len() => Some(s),
            _ => None
        };
        Self {
            stream,
            splice
        }
    }
    /// How many bits are on this track
    pub fn bit_count(&self) -> usize {
        self.stream.len()
    }
    /// Where the track was joined, this is a good place to start looking for sectors
    /// since no sector should straddle it.
    pub fn splice_point(&self) -> Option<usize> {
        self.splice
    }
    /// Get the bit at `ptr`, which is taken modulo the track length
    pub fn bit(&self,ptr: usize) -> u8 {
        match self.stream.len() {
            0 => 0,
            l => self.stream[ptr % l] as u8
        }
    }
}

/// Reads bits and self-synchronizing nibbles from a track, keeping track of how far it
/// has travelled.  Cloning a cursor is cheap, and is how lookahead is done.
#[derive(Clone)]
pub struct Cursor<'a> {
    bits: &'a TrackBits,
    ptr: usize,
    travel: usize,
    limit: usize
}

impl <'a> Cursor<'a> {
    /// Create a cursor at bit `ptr`, the cursor will be exhausted after `REVOLUTION_BOUND` revolutions.
    pub fn new(bits: &'a TrackBits,ptr: usize) -> Self {
        let ptr = match bits.bit_count() {
            0 => 0,
            l => ptr % l
        };
        Self {
            bits,
            ptr,
            travel: 0,
            limit: REVOLUTION_BOUND * bits.bit_count()
        }
    }
    /// Current bit position on the track
    pub fn position(&self) -> usize {
        self.ptr
    }
    /// Bits consumed since creation
    pub fn travel(&self) -> usize {
        self.travel
    }
    /// True once the cursor has gone around the track `REVOLUTION_BOUND` times.
    /// A track with no bits is always exhausted.
    pub fn exhausted(&self) -> bool {
        self.travel >= self.limit
    }
    /// Get the current bit and advance, wrapping at the end of the track
    pub fn next_bit(&mut self) -> u8 {
        let ans = self.bits.bit(self.ptr);
        self.advance(1);
        ans
    }
    /// Rotate the disk ahead by `bit_shift` bits
    pub fn advance(&mut self,bit_shift: usize) {
        let count = self.bits.bit_count();
        if count > 0 {
            self.ptr = (self.ptr + bit_shift) % count;
        }
        self.travel += bit_shift;
    }
    /// Read a nibble through a soft latch.  This is a simple model of the way the Apple
    /// controller forms nibbles: zeros are discarded until a 1 arrives, and that 1 plus
    /// the next 7 bits form the nibble.  Alignment falls out of this just as in the real system,
    /// it depends on sync bytes preceding address and data fields.
    /// Returns `None` once the cursor is exhausted.
    pub fn read_nibble(&mut self) -> Option<u8> {
        loop {
            if self.exhausted() {
                return None;
            }
            if self.next_bit()==1 {
                break;
            }
        }
        let mut val: u8 = 1;
        for _bit in 0..7 {
            val = (val << 1) | self.next_bit();
        }
        Some(val)
    }
    /// Read `count` nibbles, or `None` if the cursor is exhausted along the way
    pub fn read_nibbles(&mut self,count: usize) -> Option<Vec<u8>> {
        let mut ans = Vec::with_capacity(count);
        for _i in 0..count {
            ans.push(self.read_nibble()?);
        }
        Some(ans)
    }
    /// Look ahead `count` nibbles without moving the cursor.
    /// The result is shorter than `count` if the cursor would be exhausted.
    pub fn peek_nibbles(&self,count: usize) -> Vec<u8> {
        let mut scout = self.clone();
        let mut ans = Vec::with_capacity(count);
        for _i in 0..count {
            match scout.read_nibble() {
                Some(nib) => ans.push(nib),
                None => break
            }
        }
        ans
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 10-bit sync bytes followed by D5 AA 96
    fn sample_track() -> TrackBits {
        let mut stream = BitVec::new();
        for _i in 0..4 {
            stream.append(&mut BitVec::from_bytes(&[0xff]));
            stream.push(false);
            stream.push(false);
        }
        stream.append(&mut BitVec::from_bytes(&[0xd5,0xaa,0x96]));
        let count = stream.len();
        TrackBits::from_woz_bits(count,&stream.to_bytes(),None)
    }

    #[test]
    fn latch_syncs_up() {
        let trk = sample_track();
        // start inside a sync byte, the latch must fall into alignment
        let mut cursor = Cursor::new(&trk,3);
        let mut nibs = Vec::new();
        for _i in 0..7 {
            nibs.push(cursor.read_nibble().unwrap());
        }
        let joined = nibs.iter().map(|n| format!("{:02X}",n)).collect::<Vec<String>>().join(" ");
        assert!(joined.contains("D5 AA 96"),"nibbles were {}",joined);
    }

    #[test]
    fn peek_does_not_move() {
        let trk = sample_track();
        let cursor = Cursor::new(&trk,0);
        let first = cursor.peek_nibbles(4);
        assert_eq!(first.len(),4);
        assert_eq!(cursor.position(),0);
        assert_eq!(cursor.travel(),0);
        assert_eq!(first,cursor.peek_nibbles(4));
    }

    #[test]
    fn wraps_and_exhausts() {
        let trk = sample_track();
        let n = trk.bit_count();
        let mut cursor = Cursor::new(&trk,n-1);
        assert_eq!(cursor.next_bit(),0);
        assert_eq!(cursor.position(),0);
        let mut count = 1;
        while cursor.read_nibble().is_some() {
            count += 1;
        }
        assert!(cursor.exhausted());
        assert!(count < REVOLUTION_BOUND * n);
        assert!(cursor.travel() >= REVOLUTION_BOUND * n);
    }

    #[test]
    fn empty_track_is_exhausted() {
        let trk = TrackBits::from_woz_bits(0,&[],None);
        let mut cursor = Cursor::new(&trk,0);
        assert!(cursor.exhausted());
        assert_eq!(cursor.read_nibble(),None);
        assert!(cursor.peek_nibbles(3).is_empty());
    }

    #[test]
    fn all_zero_track_terminates() {
        let trk = TrackBits::from_woz_bits(8*64,&[0;64],None);
        let mut cursor = Cursor::new(&trk,0);
        assert_eq!(cursor.read_nibble(),None);
        assert_eq!(cursor.travel(),REVOLUTION_BOUND*8*64);
    }
}
