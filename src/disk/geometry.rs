use std::fmt;

use crate::disk::error::{DiskError, Result};

pub const SECTOR_SIZE: usize = 256;

const IMAGE_SIZE_35_TRACK: usize = 174_848;
const IMAGE_SIZE_40_TRACK: usize = 196_608;

/// The two supported 1541 image layouts.  The 40-track layout extends the
/// standard geometry with five extra 17-sector tracks, following the
/// DolphinDOS convention.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiskType {
    ThirtyFiveTrack,
    FortyTrack,
}

impl DiskType {
    /// Determine the disk type from an image file's size.  Size alone
    /// identifies the layout; there is no header to consult.
    pub fn from_image_size(size: usize) -> Option<DiskType> {
        match size {
            IMAGE_SIZE_35_TRACK => Some(DiskType::ThirtyFiveTrack),
            IMAGE_SIZE_40_TRACK => Some(DiskType::FortyTrack),
            _ => None,
        }
    }

    #[inline]
    pub fn track_count(self) -> u8 {
        match self {
            DiskType::ThirtyFiveTrack => 35,
            DiskType::FortyTrack => 40,
        }
    }

    #[inline]
    pub fn image_size(self) -> usize {
        match self {
            DiskType::ThirtyFiveTrack => IMAGE_SIZE_35_TRACK,
            DiskType::FortyTrack => IMAGE_SIZE_40_TRACK,
        }
    }
}

/// Track and sector coordinates.  Tracks are 1-based and sectors are
/// 0-based, matching the numbering used by CBM DOS itself.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug, PartialOrd, Ord)]
pub struct Location(pub u8, pub u8);

impl Location {
    #[inline]
    pub fn new(track: u8, sector: u8) -> Location {
        Location(track, sector)
    }

    pub fn from_bytes(bytes: &[u8]) -> Location {
        Location(bytes[0], bytes[1])
    }

    pub fn write_bytes(&self, bytes: &mut [u8]) {
        bytes[0] = self.0;
        bytes[1] = self.1;
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({},{})", self.0, self.1)
    }
}

pub(crate) struct Track {
    pub sectors: u8,
    pub byte_offset: u32,
}

#[rustfmt::skip]
pub(crate) static TRACKS: [Track; 41] = [
    Track { sectors: 0,  byte_offset: 0, },       // There is no track 0.
    Track { sectors: 21, byte_offset: 0x00000, }, // 1
    Track { sectors: 21, byte_offset: 0x01500, }, // 2
    Track { sectors: 21, byte_offset: 0x02A00, }, // 3
    Track { sectors: 21, byte_offset: 0x03F00, }, // 4
    Track { sectors: 21, byte_offset: 0x05400, }, // 5
    Track { sectors: 21, byte_offset: 0x06900, }, // 6
    Track { sectors: 21, byte_offset: 0x07E00, }, // 7
    Track { sectors: 21, byte_offset: 0x09300, }, // 8
    Track { sectors: 21, byte_offset: 0x0A800, }, // 9
    Track { sectors: 21, byte_offset: 0x0BD00, }, // 10
    Track { sectors: 21, byte_offset: 0x0D200, }, // 11
    Track { sectors: 21, byte_offset: 0x0E700, }, // 12
    Track { sectors: 21, byte_offset: 0x0FC00, }, // 13
    Track { sectors: 21, byte_offset: 0x11100, }, // 14
    Track { sectors: 21, byte_offset: 0x12600, }, // 15
    Track { sectors: 21, byte_offset: 0x13B00, }, // 16
    Track { sectors: 21, byte_offset: 0x15000, }, // 17
    Track { sectors: 19, byte_offset: 0x16500, }, // 18
    Track { sectors: 19, byte_offset: 0x17800, }, // 19
    Track { sectors: 19, byte_offset: 0x18B00, }, // 20
    Track { sectors: 19, byte_offset: 0x19E00, }, // 21
    Track { sectors: 19, byte_offset: 0x1B100, }, // 22
    Track { sectors: 19, byte_offset: 0x1C400, }, // 23
    Track { sectors: 19, byte_offset: 0x1D700, }, // 24
    Track { sectors: 18, byte_offset: 0x1EA00, }, // 25
    Track { sectors: 18, byte_offset: 0x1FC00, }, // 26
    Track { sectors: 18, byte_offset: 0x20E00, }, // 27
    Track { sectors: 18, byte_offset: 0x22000, }, // 28
    Track { sectors: 18, byte_offset: 0x23200, }, // 29
    Track { sectors: 18, byte_offset: 0x24400, }, // 30
    Track { sectors: 17, byte_offset: 0x25600, }, // 31
    Track { sectors: 17, byte_offset: 0x26700, }, // 32
    Track { sectors: 17, byte_offset: 0x27800, }, // 33
    Track { sectors: 17, byte_offset: 0x28900, }, // 34
    Track { sectors: 17, byte_offset: 0x29A00, }, // 35
    Track { sectors: 17, byte_offset: 0x2AB00, }, // 36
    Track { sectors: 17, byte_offset: 0x2BC00, }, // 37
    Track { sectors: 17, byte_offset: 0x2CD00, }, // 38
    Track { sectors: 17, byte_offset: 0x2DE00, }, // 39
    Track { sectors: 17, byte_offset: 0x2EF00, }, // 40
];

#[inline]
pub(crate) fn sectors_in_track(track: u8) -> u8 {
    TRACKS[track as usize].sectors
}

/// Confirm that coordinates name a real sector on this disk type.
pub(crate) fn check(disk_type: DiskType, location: Location) -> Result<()> {
    let Location(track, sector) = location;
    if track < 1 || track > disk_type.track_count() || sector >= TRACKS[track as usize].sectors {
        return Err(DiskError::InvalidGeometry { track, sector });
    }
    Ok(())
}

/// Map validated coordinates to a byte offset within the image buffer.
pub(crate) fn sector_offset(disk_type: DiskType, location: Location) -> Result<usize> {
    check(disk_type, location)?;
    Ok(sector_start(location))
}

/// Byte offset of a sector known to be in range.
#[inline]
pub(crate) fn sector_start(location: Location) -> usize {
    TRACKS[location.0 as usize].byte_offset as usize + location.1 as usize * SECTOR_SIZE
}
