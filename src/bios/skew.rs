//! ## Sector Skewing Module
//!
//! This contains the sector skew tables used to place physical sectors into a flat image.
//! A physical sector is the number found in the sector's address field.  The position
//! a sector occupies within its track in the image file is called its slot.
//!
//! The tables are kept separate from the disk image code so that both the image assembler
//! and the test fixtures can share them.

/// Physical sector skew used by DOS 3.2, i.e., the order sectors pass by the head on a freshly formatted disk
pub const DOS32_PHYSICAL: [usize;13] = [0,10,7,4,1,11,8,5,2,12,9,6,3];
/// Translate DOS 3.3 physical sector to logical sector, the logical sector is the slot in a DO image
pub const DOS_PSEC_TO_DOS_LSEC: [usize;16] = [0,7,14,6,13,5,12,4,11,3,10,2,9,1,8,15];
/// Translate DOS 3.3 physical sector to its slot in a PO image, where each pair of slots is a ProDOS block
pub const DOS_PSEC_TO_PRODOS_SLOT: [usize;16] = [0,8,1,9,2,10,3,11,4,12,5,13,6,14,7,15];

/// 3.5 inch disk sectors per track, by zone; each zone spans 16 cylinders
pub const ZONED_SECS_PER_TRACK: [usize;5] = [12,11,10,9,8];
/// 3.5 inch disk physical sector skew by zone (2:1 interleave); inner zone tables are padded to 12 entries
pub const D35_PHYSICAL: [[usize;12];5] = [
    [0,6,1,7,2,8,3,9,4,10,5,11],
    [0,6,1,7,2,8,3,9,4,10,5,0xff],
    [0,5,1,6,2,7,3,8,4,9,0xff,0xff],
    [0,5,1,6,2,7,3,8,4,0xff,0xff,0xff],
    [0,4,1,5,2,6,3,7,0xff,0xff,0xff,0xff],
];

/// Slot that physical sector `psec` occupies under the given table, or `None` if the
/// sector number is outside the table.
pub fn slot_from_table(table: &[usize],psec: usize) -> Option<usize> {
    table.get(psec).copied()
}

#[test]
fn every_slot_filled_once() {
    for table in [DOS_PSEC_TO_DOS_LSEC,DOS_PSEC_TO_PRODOS_SLOT] {
        let mut slots = table.to_vec();
        slots.sort();
        assert_eq!(slots,(0..16).collect::<Vec<usize>>());
    }
    // file slot 1 of a DO image holds physical sector 13
    assert_eq!(DOS_PSEC_TO_DOS_LSEC[13],1);
}

#[test]
fn prodos_slot_pairs() {
    // block 0 of track 0 is DOS logical sectors 0 and 14, i.e., physical sectors 0 and 2
    assert_eq!(slot_from_table(&DOS_PSEC_TO_PRODOS_SLOT,0),Some(0));
    assert_eq!(slot_from_table(&DOS_PSEC_TO_PRODOS_SLOT,2),Some(1));
    assert_eq!(slot_from_table(&DOS_PSEC_TO_PRODOS_SLOT,15),Some(15));
    assert_eq!(slot_from_table(&DOS_PSEC_TO_PRODOS_SLOT,16),None);
}
