//! Sector chains.
//!
//! Files, the directory, and side sectors are all stored as singly-linked
//! chains of sectors.  The first two bytes of each sector either name the
//! next sector in the chain, or, when the track byte is zero, mark the
//! tail and record how much of the sector is in use.

use std::collections::HashSet;

use crate::disk::error::{DiskError, Result};
use crate::disk::geometry::{Location, SECTOR_SIZE};
use crate::disk::D64;

/// Data bytes carried by one chained sector.
pub(crate) const CHAIN_CAPACITY: usize = SECTOR_SIZE - 2;

/// The two-byte link heading every chained sector.
///
/// `Tail(used)` counts the used bytes of the sector including the link
/// itself, so the stored sector byte is `used - 1`, the offset of the last
/// used byte.  A full tail sector is therefore stored as (0, 0xFF).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChainLink {
    Next(Location),
    Tail(usize),
}

impl ChainLink {
    pub fn parse(block: &[u8], location: Location) -> Result<ChainLink> {
        if block[0] == 0 {
            if block[1] == 0 {
                // A tail must at least contain its own link bytes.
                return Err(DiskError::InvalidChain(location));
            }
            Ok(ChainLink::Tail(block[1] as usize + 1))
        } else {
            Ok(ChainLink::Next(Location(block[0], block[1])))
        }
    }

    pub fn write(&self, block: &mut [u8]) {
        match self {
            ChainLink::Next(location) => location.write_bytes(block),
            ChainLink::Tail(used) => {
                block[0] = 0;
                block[1] = (used - 1) as u8;
            }
        }
    }
}

/// One sector visited while walking a chain.  `data` holds the full 256
/// bytes; `used` counts the meaningful ones, link included.
pub(crate) struct ChainSector {
    pub location: Location,
    pub data: Vec<u8>,
    pub used: usize,
}

/// Forward iterator over a chain.  Detects loops so that a corrupt image
/// cannot hang the caller.
pub(crate) struct ChainIter<'a> {
    disk: &'a D64,
    next: Option<Location>,
    visited: HashSet<Location>,
}

impl<'a> Iterator for ChainIter<'a> {
    type Item = Result<ChainSector>;

    fn next(&mut self) -> Option<Result<ChainSector>> {
        let location = self.next.take()?;
        if !self.visited.insert(location) {
            return Some(Err(DiskError::ChainLoop(location)));
        }
        let data = match self.disk.sector(location) {
            Ok(block) => block.to_vec(),
            Err(e) => return Some(Err(e)),
        };
        let used = match ChainLink::parse(&data, location) {
            Ok(ChainLink::Next(next)) => {
                self.next = Some(next);
                SECTOR_SIZE
            }
            Ok(ChainLink::Tail(used)) => used,
            Err(e) => return Some(Err(e)),
        };
        Some(Ok(ChainSector {
            location,
            data,
            used,
        }))
    }
}

impl D64 {
    pub(crate) fn chain_iter(&self, start: Location) -> ChainIter {
        ChainIter {
            disk: self,
            next: Some(start),
            visited: HashSet::new(),
        }
    }

    /// Every sector of a chain, in order.
    pub(crate) fn chain_locations(&self, start: Location) -> Result<Vec<Location>> {
        self.chain_iter(start)
            .map(|sector| sector.map(|s| s.location))
            .collect()
    }

    /// Read a whole chain's payload into memory.
    pub(crate) fn read_chain(&self, start: Location) -> Result<Vec<u8>> {
        let mut data = vec![];
        for sector in self.chain_iter(start) {
            let sector = sector?;
            data.extend_from_slice(&sector.data[2..sector.used]);
        }
        Ok(data)
    }

    /// Stream a payload into a chain beginning at `start`, which the caller
    /// has already allocated.  Additional sectors are allocated as the
    /// payload demands; the unused tail of the last sector is zeroed.
    /// Returns every sector of the chain in order.
    ///
    /// Runs out of space with `DiskFull`, in which case the sectors already
    /// allocated stay allocated.
    pub(crate) fn write_chain(&mut self, start: Location, data: &[u8]) -> Result<Vec<Location>> {
        let mut locations = vec![start];
        if data.is_empty() {
            let block = self.block_mut(start);
            for byte in block.iter_mut() {
                *byte = 0;
            }
            ChainLink::Tail(2).write(block);
            return Ok(locations);
        }

        let mut location = start;
        let mut chunks = data.chunks(CHAIN_CAPACITY).peekable();
        while let Some(chunk) = chunks.next() {
            let link = if chunks.peek().is_some() {
                let next = self.find_and_allocate_free_sector()?;
                locations.push(next);
                ChainLink::Next(next)
            } else {
                ChainLink::Tail(chunk.len() + 2)
            };
            let block = self.block_mut(location);
            link.write(block);
            block[2..2 + chunk.len()].copy_from_slice(chunk);
            for byte in block[2 + chunk.len()..].iter_mut() {
                *byte = 0;
            }
            if let ChainLink::Next(next) = link {
                location = next;
            }
        }
        Ok(locations)
    }

    /// Walk a chain and free every sector of it.  The whole chain is read
    /// first so a broken link frees nothing.
    pub(crate) fn free_chain(&mut self, start: Location) -> Result<usize> {
        let locations = self.chain_locations(start)?;
        for &location in &locations {
            self.free_sector(location)?;
        }
        Ok(locations.len())
    }
}
