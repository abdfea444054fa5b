//! Side sectors for relative files.
//!
//! A relative file indexes its data chain through up to six side sectors,
//! each listing up to 120 (track, sector) pairs in chain order.  Every
//! side sector also carries the record size and a table naming the whole
//! side-sector group, so a drive can reach any record from any member.

use crate::disk::chain::ChainLink;
use crate::disk::error::{DiskError, Result};
use crate::disk::geometry::Location;
use crate::disk::D64;

pub(crate) const MAX_SIDE_SECTORS: usize = 6;

const BLOCK_NUMBER_OFFSET: usize = 0x02;
const RECORD_SIZE_OFFSET: usize = 0x03;
const GROUP_TABLE_OFFSET: usize = 0x04;
const CHAIN_OFFSET: usize = 0x10;

/// Chain entries that fit in one side sector.
pub(crate) const CHAIN_ENTRIES_PER_SIDE_SECTOR: usize = (256 - CHAIN_OFFSET) / 2;

impl D64 {
    /// Build the side-sector group indexing `data_sectors`, allocating one
    /// side sector per 120 data sectors.  Returns the first side sector of
    /// the group.
    pub(crate) fn build_side_sectors(
        &mut self,
        data_sectors: &[Location],
        record_length: u8,
    ) -> Result<Location> {
        let groups: Vec<&[Location]> = data_sectors.chunks(CHAIN_ENTRIES_PER_SIDE_SECTOR).collect();
        if groups.len() > MAX_SIDE_SECTORS {
            return Err(DiskError::RelTooLarge);
        }

        let mut side_sectors = Vec::with_capacity(groups.len());
        for _ in &groups {
            side_sectors.push(self.find_and_allocate_free_sector()?);
        }

        for (index, group) in groups.iter().enumerate() {
            let link = match side_sectors.get(index + 1) {
                Some(&next) => ChainLink::Next(next),
                None => ChainLink::Tail(CHAIN_OFFSET + 2 * group.len()),
            };
            let location = side_sectors[index];
            let block = self.block_mut(location);
            for byte in block.iter_mut() {
                *byte = 0;
            }
            link.write(block);
            block[BLOCK_NUMBER_OFFSET] = index as u8;
            block[RECORD_SIZE_OFFSET] = record_length;
            for (i, side) in side_sectors.iter().enumerate() {
                side.write_bytes(&mut block[GROUP_TABLE_OFFSET + 2 * i..]);
            }
            for (i, sector) in group.iter().enumerate() {
                sector.write_bytes(&mut block[CHAIN_OFFSET + 2 * i..]);
            }
        }
        Ok(side_sectors[0])
    }

    /// Walk a side-sector group.  Returns the group's own sectors and the
    /// indexed data sectors, both in order.
    pub(crate) fn parse_side_sectors(
        &self,
        first: Location,
    ) -> Result<(Vec<Location>, Vec<Location>)> {
        let mut side_sectors = vec![];
        let mut data_sectors = vec![];
        for sector in self.chain_iter(first) {
            let sector = sector?;
            side_sectors.push(sector.location);
            if side_sectors.len() > MAX_SIDE_SECTORS {
                return Err(DiskError::InvalidRel("too many side sectors"));
            }
            if sector.used < CHAIN_OFFSET || (sector.used - CHAIN_OFFSET) % 2 != 0 {
                return Err(DiskError::InvalidRel("truncated side sector"));
            }
            for pair in sector.data[CHAIN_OFFSET..sector.used].chunks(2) {
                if pair[0] == 0 {
                    break;
                }
                data_sectors.push(Location(pair[0], pair[1]));
            }
        }
        Ok((side_sectors, data_sectors))
    }
}
