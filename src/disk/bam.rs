//! The Block Availability Map.
//!
//! The BAM occupies (18,0) together with the disk header.  Bytes $04-$8F
//! hold one four-byte entry per track for tracks 1-35: a free-sector count
//! followed by a 24-bit little-endian bitmap in which a set bit means the
//! sector is free.  On 40-track images, entries for tracks 36-40 live in
//! the otherwise reserved bytes $AC-$FF, following DolphinDOS.
//!
//! Sector allocation mimics the drive: tracks are tried radiating outward
//! from the directory track so files cluster near the directory, and
//! within a track the search starts one interleave past the last sector
//! allocated there.

use log::warn;

use crate::disk::error::{DiskError, Result};
use crate::disk::geometry::{self, DiskType, Location};
use crate::disk::{
    D64, BAM_LOCATION, DIRECTORY_START, DIRECTORY_TRACK, DISK_NAME_SIZE, INTERLEAVE,
};
use crate::petscii::{Petscii, PAD_BYTE};

const DOS_VERSION_OFFSET: usize = 0x02;
const ENTRIES_OFFSET: usize = 0x04;
const DISK_NAME_OFFSET: usize = 0x90;
const DISK_ID_OFFSET: usize = 0xa2;
const DOS_TYPE_OFFSET: usize = 0xa5;
/// Entries for tracks 36-40 (DolphinDOS extension).
const EXTENDED_ENTRIES_OFFSET: usize = 0xac;
const ENTRY_SIZE: usize = 4;

const DOS_VERSION: u8 = b'A';
const DOS_TYPE: [u8; 2] = [b'2', b'A'];

fn entry_offset(track: u8) -> usize {
    if track <= 35 {
        ENTRIES_OFFSET + (track as usize - 1) * ENTRY_SIZE
    } else {
        EXTENDED_ENTRIES_OFFSET + (track as usize - 36) * ENTRY_SIZE
    }
}

/// Tracks in allocation-priority order: the directory track's neighbors
/// first, then outward to the rim, with the extended tracks last.
fn track_search_order(disk_type: DiskType) -> Vec<u8> {
    let mut order = Vec::with_capacity(disk_type.track_count() as usize);
    order.push(DIRECTORY_TRACK);
    for distance in 1..=17 {
        order.push(DIRECTORY_TRACK - distance);
        order.push(DIRECTORY_TRACK + distance);
    }
    if disk_type == DiskType::FortyTrack {
        for track in 36..=40 {
            order.push(track);
        }
    }
    order
}

impl D64 {
    #[inline]
    fn bam(&self) -> &[u8] {
        self.block(BAM_LOCATION)
    }

    #[inline]
    fn bam_mut(&mut self) -> &mut [u8] {
        self.block_mut(BAM_LOCATION)
    }

    /// Whether the BAM bitmap has the sector's bit set (free).
    pub(crate) fn bam_bit(&self, Location(track, sector): Location) -> bool {
        let offset = entry_offset(track) + 1 + sector as usize / 8;
        self.bam()[offset] & (1 << (sector % 8)) != 0
    }

    pub(crate) fn set_bam_bit(&mut self, Location(track, sector): Location, free: bool) {
        let offset = entry_offset(track) + 1 + sector as usize / 8;
        if free {
            self.bam_mut()[offset] |= 1 << (sector % 8);
        } else {
            self.bam_mut()[offset] &= !(1 << (sector % 8));
        }
    }

    pub(crate) fn bam_free_count(&self, track: u8) -> u8 {
        self.bam()[entry_offset(track)]
    }

    pub(crate) fn set_bam_free_count(&mut self, track: u8, count: u8) {
        self.bam_mut()[entry_offset(track)] = count;
    }

    /// Clear the sector's free bit and decrement the track's free count.
    /// The caller has already established that the sector is free.
    pub(crate) fn mark_allocated(&mut self, location: Location) {
        self.set_bam_bit(location, false);
        let count = self.bam_free_count(location.0).saturating_sub(1);
        self.set_bam_free_count(location.0, count);
    }

    fn mark_free(&mut self, location: Location) {
        self.set_bam_bit(location, true);
        let count = self.bam_free_count(location.0).saturating_add(1);
        self.set_bam_free_count(location.0, count);
    }

    pub fn is_sector_free(&self, location: Location) -> Result<bool> {
        geometry::check(self.disk_type, location)?;
        Ok(self.bam_bit(location))
    }

    /// Mark a sector allocated.  Returns false, changing nothing, if it was
    /// already allocated.
    pub fn allocate_sector(&mut self, location: Location) -> Result<bool> {
        geometry::check(self.disk_type, location)?;
        if !self.bam_bit(location) {
            return Ok(false);
        }
        self.mark_allocated(location);
        Ok(true)
    }

    /// Mark a sector free.  Returns false, changing nothing, if it was
    /// already free.  The BAM sector and the first directory sector are
    /// never freed; such requests are ignored with a warning.
    pub fn free_sector(&mut self, location: Location) -> Result<bool> {
        geometry::check(self.disk_type, location)?;
        if location == BAM_LOCATION || location == DIRECTORY_START {
            warn!("attempt to free reserved sector {} ignored", location);
            return Ok(false);
        }
        if self.bam_bit(location) {
            return Ok(false);
        }
        self.mark_free(location);
        Ok(true)
    }

    /// Free sectors available for file data.  The directory track is not
    /// counted, matching the "blocks free" figure of a directory listing.
    pub fn free_sector_count(&self) -> u16 {
        (1..=self.disk_type.track_count())
            .filter(|&track| track != DIRECTORY_TRACK)
            .map(|track| self.bam_free_count(track) as u16)
            .sum()
    }

    /// Allocate the next free sector for file data, trying tracks in
    /// priority order.  The directory track is reserved for the directory
    /// itself and is never handed out here.
    pub fn find_and_allocate_free_sector(&mut self) -> Result<Location> {
        for track in track_search_order(self.disk_type) {
            if track == DIRECTORY_TRACK {
                continue;
            }
            if self.bam_free_count(track) == 0 {
                continue;
            }
            if let Some(location) = self.allocate_on_track(track) {
                return Ok(location);
            }
        }
        Err(DiskError::DiskFull)
    }

    /// Allocate a free sector on one specific track, used when the
    /// directory chain grows.
    pub(crate) fn find_and_allocate_on_track(&mut self, track: u8) -> Result<Location> {
        if track < 1 || track > self.disk_type.track_count() {
            return Err(DiskError::InvalidGeometry { track, sector: 0 });
        }
        if self.bam_free_count(track) > 0 {
            if let Some(location) = self.allocate_on_track(track) {
                return Ok(location);
            }
        }
        Err(DiskError::DiskFull)
    }

    /// Scan the track for a free sector, starting one interleave past the
    /// last allocation and wrapping once around.
    fn allocate_on_track(&mut self, track: u8) -> Option<Location> {
        let count = geometry::sectors_in_track(track);
        let start = (self.last_sector_used[track as usize - 1] + INTERLEAVE) % count;
        for step in 0..count {
            let sector = (start + step) % count;
            let location = Location(track, sector);
            if self.bam_bit(location) {
                self.mark_allocated(location);
                self.last_sector_used[track as usize - 1] = sector;
                return Some(location);
            }
        }
        None
    }

    /// Write a fresh BAM sector: header fields, disk name, and every
    /// sector marked free.
    pub(crate) fn init_bam(&mut self, name: &str) {
        let track_count = self.disk_type.track_count();
        {
            let bam = self.bam_mut();
            for byte in bam.iter_mut() {
                *byte = 0;
            }
            DIRECTORY_START.write_bytes(&mut bam[0..2]);
            bam[DOS_VERSION_OFFSET] = DOS_VERSION;
            Petscii::from(name)
                .write_padded_bytes(&mut bam[DISK_NAME_OFFSET..DISK_NAME_OFFSET + DISK_NAME_SIZE]);
            bam[0xa0] = PAD_BYTE;
            bam[0xa1] = PAD_BYTE;
            bam[DISK_ID_OFFSET] = PAD_BYTE;
            bam[DISK_ID_OFFSET + 1] = PAD_BYTE;
            bam[0xa4] = PAD_BYTE;
            bam[DOS_TYPE_OFFSET] = DOS_TYPE[0];
            bam[DOS_TYPE_OFFSET + 1] = DOS_TYPE[1];
        }
        for track in 1..=track_count {
            let sectors = geometry::sectors_in_track(track);
            let offset = entry_offset(track);
            let bam = self.bam_mut();
            bam[offset] = sectors;
            // Every track has at least 17 sectors, so the first two bitmap
            // bytes are always fully free.
            bam[offset + 1] = 0xff;
            bam[offset + 2] = 0xff;
            bam[offset + 3] = (1u8 << (sectors - 16)) - 1;
        }
    }

    /// Change the disk name stored in the BAM header.
    pub fn rename_disk(&mut self, name: &str) {
        let name = Petscii::from(name);
        let bam = self.bam_mut();
        name.write_padded_bytes(&mut bam[DISK_NAME_OFFSET..DISK_NAME_OFFSET + DISK_NAME_SIZE]);
    }

    /// The disk name, trimmed of padding.
    pub fn disk_name(&self) -> Petscii {
        Petscii::from_padded_bytes(&self.bam()[DISK_NAME_OFFSET..DISK_NAME_OFFSET + DISK_NAME_SIZE])
    }

    /// The two-byte disk id.
    pub fn disk_id(&self) -> [u8; 2] {
        let bam = self.bam();
        [bam[DISK_ID_OFFSET], bam[DISK_ID_OFFSET + 1]]
    }
}
