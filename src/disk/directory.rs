//! The disk directory.
//!
//! The directory is a chain of sectors starting at (18,1).  Each sector
//! holds eight 32-byte slots; a slot's first two bytes are the sector link
//! (slot 0) or unused padding, followed by the 30-byte entry proper.  A
//! slot holds a live file exactly when bit 7 of its file-type byte is set.

use std::cmp::Ordering;
use std::fmt;

use crate::disk::chain::ChainLink;
use crate::disk::error::{DiskError, Result};
use crate::disk::geometry::{Location, SECTOR_SIZE};
use crate::disk::{D64, DIRECTORY_START, DIRECTORY_TRACK};
use crate::petscii::Petscii;

pub(crate) const ENTRIES_PER_SECTOR: usize = 8;
pub(crate) const FILE_NAME_SIZE: usize = 16;

const SLOT_SIZE: usize = 32;
const ENTRY_SIZE: usize = 30;

// Offsets within the 30-byte entry.
const TYPE_OFFSET: usize = 0x00;
const START_OFFSET: usize = 0x01;
const NAME_OFFSET: usize = 0x03;
const SIDE_OFFSET: usize = 0x13;
const RECORD_LENGTH_OFFSET: usize = 0x15;
const REPLACE_OFFSET: usize = 0x1a;
const FILE_SIZE_OFFSET: usize = 0x1c;

const FILE_TYPE_DEL: u8 = 0x00;
const FILE_TYPE_SEQ: u8 = 0x01;
const FILE_TYPE_PRG: u8 = 0x02;
const FILE_TYPE_USR: u8 = 0x03;
const FILE_TYPE_REL: u8 = 0x04;
const ATTRIB_TYPE_MASK: u8 = 0x0f;
const ATTRIB_UNUSED_MASK: u8 = 0x10;
const ATTRIB_REPLACE_MASK: u8 = 0x20;
const ATTRIB_LOCKED_MASK: u8 = 0x40;
const ATTRIB_CLOSED_MASK: u8 = 0x80;

/// The CBM file types, plus the DEL pseudo-type.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum FileType {
    DEL,
    SEQ,
    PRG,
    USR,
    REL,
    Unknown(u8),
}

impl FileType {
    fn from_code(code: u8) -> FileType {
        match code {
            FILE_TYPE_DEL => FileType::DEL,
            FILE_TYPE_SEQ => FileType::SEQ,
            FILE_TYPE_PRG => FileType::PRG,
            FILE_TYPE_USR => FileType::USR,
            FILE_TYPE_REL => FileType::REL,
            code => FileType::Unknown(code),
        }
    }

    fn code(self) -> u8 {
        match self {
            FileType::DEL => FILE_TYPE_DEL,
            FileType::SEQ => FILE_TYPE_SEQ,
            FileType::PRG => FILE_TYPE_PRG,
            FileType::USR => FILE_TYPE_USR,
            FileType::REL => FILE_TYPE_REL,
            FileType::Unknown(code) => code,
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            FileType::DEL => "del",
            FileType::SEQ => "seq",
            FileType::PRG => "prg",
            FileType::USR => "usr",
            FileType::REL => "rel",
            FileType::Unknown(_) => "unk",
        })
    }
}

/// The full 8-bit file-type field: the type code in the low nibble plus
/// several flag bits.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub struct FileAttributes {
    /// Bits 0-3 are the file type.
    pub file_type: FileType,
    /// Bit 4 is unused but preserved verbatim.
    pub unused_bit: bool,
    /// Bit 5 marks a save-with-replace in progress.
    pub replace_flag: bool,
    /// Bit 6 locks the file, shown as "<" in directory listings.
    pub locked_flag: bool,
    /// Bit 7 is the "closed" flag.  A slot with this bit clear is free,
    /// whatever the other bits say.
    pub closed_flag: bool,
}

impl FileAttributes {
    pub fn from_byte(byte: u8) -> FileAttributes {
        FileAttributes {
            file_type: FileType::from_code(byte & ATTRIB_TYPE_MASK),
            unused_bit: byte & ATTRIB_UNUSED_MASK != 0,
            replace_flag: byte & ATTRIB_REPLACE_MASK != 0,
            locked_flag: byte & ATTRIB_LOCKED_MASK != 0,
            closed_flag: byte & ATTRIB_CLOSED_MASK != 0,
        }
    }

    pub fn to_byte(&self) -> u8 {
        let mut byte = self.file_type.code();
        if self.unused_bit {
            byte |= ATTRIB_UNUSED_MASK;
        }
        if self.replace_flag {
            byte |= ATTRIB_REPLACE_MASK;
        }
        if self.locked_flag {
            byte |= ATTRIB_LOCKED_MASK;
        }
        if self.closed_flag {
            byte |= ATTRIB_CLOSED_MASK;
        }
        byte
    }

    fn closed(file_type: FileType) -> FileAttributes {
        FileAttributes {
            file_type,
            unused_bit: false,
            replace_flag: false,
            locked_flag: false,
            closed_flag: true,
        }
    }
}

impl fmt::Display for FileAttributes {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            if self.closed_flag { ' ' } else { '*' },
            self.file_type,
            match (self.locked_flag, self.replace_flag) {
                (true, false) => "<",
                (false, true) => "@",
                (true, true) => "<@",
                (false, false) => " ",
            },
        )
    }
}

/// A directory entry viewed by what the file is.  Only relative files
/// carry extra structure.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum FileKind {
    DEL,
    SEQ,
    PRG,
    USR,
    REL {
        side: Location,
        record_length: u8,
    },
    Unknown(u8),
}

/// Identifies one directory slot: the sector holding it and the slot
/// index within that sector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlotHandle {
    pub(crate) sector: Location,
    pub(crate) index: u8,
}

impl SlotHandle {
    fn entry_offset(&self) -> usize {
        SLOT_SIZE * self.index as usize + 2
    }
}

/// A directory entry.
///
/// Equality compares the stored fields only, not the slot the entry was
/// read from, so a reordered-but-identical directory compares equal.
#[derive(Clone, Debug)]
pub struct DirectoryEntry {
    pub attributes: FileAttributes,
    pub start: Location,
    pub name: Petscii,
    /// First side sector; (0,0) for non-relative files.
    pub side: Location,
    /// Record length; 0 for non-relative files.
    pub record_length: u8,
    /// Track and sector of the replacement file during an @-save.
    pub replace: Location,
    /// Size in data sectors, as shown in directory listings.
    pub file_size: u16,
    pub(crate) slot: SlotHandle,
}

impl DirectoryEntry {
    fn from_bytes(bytes: &[u8], slot: SlotHandle) -> DirectoryEntry {
        DirectoryEntry {
            attributes: FileAttributes::from_byte(bytes[TYPE_OFFSET]),
            start: Location::from_bytes(&bytes[START_OFFSET..]),
            name: Petscii::from_padded_bytes(&bytes[NAME_OFFSET..NAME_OFFSET + FILE_NAME_SIZE]),
            side: Location::from_bytes(&bytes[SIDE_OFFSET..]),
            record_length: bytes[RECORD_LENGTH_OFFSET],
            replace: Location::from_bytes(&bytes[REPLACE_OFFSET..]),
            file_size: u16::from_le_bytes([bytes[FILE_SIZE_OFFSET], bytes[FILE_SIZE_OFFSET + 1]]),
            slot,
        }
    }

    fn to_bytes(&self, bytes: &mut [u8]) {
        for byte in bytes[..ENTRY_SIZE].iter_mut() {
            *byte = 0;
        }
        bytes[TYPE_OFFSET] = self.attributes.to_byte();
        self.start.write_bytes(&mut bytes[START_OFFSET..]);
        self.name
            .write_padded_bytes(&mut bytes[NAME_OFFSET..NAME_OFFSET + FILE_NAME_SIZE]);
        self.side.write_bytes(&mut bytes[SIDE_OFFSET..]);
        bytes[RECORD_LENGTH_OFFSET] = self.record_length;
        self.replace.write_bytes(&mut bytes[REPLACE_OFFSET..]);
        bytes[FILE_SIZE_OFFSET..FILE_SIZE_OFFSET + 2].copy_from_slice(&self.file_size.to_le_bytes());
    }

    #[inline]
    pub fn file_type(&self) -> FileType {
        self.attributes.file_type
    }

    pub fn is_locked(&self) -> bool {
        self.attributes.locked_flag
    }

    /// The entry viewed through its file type.
    pub fn kind(&self) -> FileKind {
        match self.attributes.file_type {
            FileType::DEL => FileKind::DEL,
            FileType::SEQ => FileKind::SEQ,
            FileType::PRG => FileKind::PRG,
            FileType::USR => FileKind::USR,
            FileType::REL => FileKind::REL {
                side: self.side,
                record_length: self.record_length,
            },
            FileType::Unknown(code) => FileKind::Unknown(code),
        }
    }
}

impl PartialEq for DirectoryEntry {
    fn eq(&self, other: &DirectoryEntry) -> bool {
        self.attributes == other.attributes
            && self.start == other.start
            && self.name == other.name
            && self.side == other.side
            && self.record_length == other.record_length
            && self.replace == other.replace
            && self.file_size == other.file_size
    }
}

impl fmt::Display for DirectoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{:<4} {:18}{}",
            self.file_size,
            format!("\"{}\"", self.name),
            self.attributes
        )
    }
}

/// Iterates over the live entries of the directory.
pub struct DirectoryIter<'a> {
    chain: crate::disk::chain::ChainIter<'a>,
    sector: Option<(Location, Vec<u8>)>,
    slot: usize,
    failed: bool,
}

impl<'a> Iterator for DirectoryIter<'a> {
    type Item = Result<DirectoryEntry>;

    fn next(&mut self) -> Option<Result<DirectoryEntry>> {
        if self.failed {
            return None;
        }
        loop {
            if let Some((location, data)) = &self.sector {
                while self.slot < ENTRIES_PER_SECTOR {
                    let handle = SlotHandle {
                        sector: *location,
                        index: self.slot as u8,
                    };
                    self.slot += 1;
                    let offset = handle.entry_offset();
                    if data[offset + TYPE_OFFSET] & ATTRIB_CLOSED_MASK == 0 {
                        continue;
                    }
                    let entry =
                        DirectoryEntry::from_bytes(&data[offset..offset + ENTRY_SIZE], handle);
                    return Some(Ok(entry));
                }
                self.sector = None;
            }
            match self.chain.next() {
                Some(Ok(sector)) => {
                    self.sector = Some((sector.location, sector.data));
                    self.slot = 0;
                }
                Some(Err(e)) => {
                    self.failed = true;
                    return Some(Err(e));
                }
                None => return None,
            }
        }
    }
}

impl D64 {
    /// Iterate over the live directory entries.
    pub fn directory_iter(&self) -> DirectoryIter {
        DirectoryIter {
            chain: self.chain_iter(DIRECTORY_START),
            sector: None,
            slot: 0,
            failed: false,
        }
    }

    /// All live directory entries, in directory order.
    pub fn directory(&self) -> Result<Vec<DirectoryEntry>> {
        self.directory_iter().collect()
    }

    /// Locate a directory entry by filename.
    pub fn find_file(&self, name: &str) -> Result<DirectoryEntry> {
        let query = Self::file_name(name);
        self.lookup(&query)?
            .ok_or_else(|| DiskError::NotFound(name.to_string()))
    }

    fn lookup(&self, name: &Petscii) -> Result<Option<DirectoryEntry>> {
        for entry in self.directory_iter() {
            let entry = entry?;
            if entry.name == *name {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    /// Store a file on the disk.  `file_type` must be SEQ, PRG, or USR;
    /// use [`D64::add_rel_file`] for relative files.
    pub fn add_file(&mut self, name: &str, file_type: FileType, data: &[u8]) -> Result<()> {
        match file_type {
            FileType::SEQ | FileType::PRG | FileType::USR => {}
            _ => return Err(DiskError::Argument("file type must be SEQ, PRG, or USR")),
        }
        self.add_file_entry(name, file_type, None, data)
    }

    /// Store a relative file with the given record length.  The data must
    /// be a whole number of records.
    pub fn add_rel_file(&mut self, name: &str, record_length: u8, data: &[u8]) -> Result<()> {
        self.add_file_entry(name, FileType::REL, Some(record_length), data)
    }

    fn add_file_entry(
        &mut self,
        name: &str,
        file_type: FileType,
        record_length: Option<u8>,
        data: &[u8],
    ) -> Result<()> {
        if name.is_empty() {
            return Err(DiskError::Argument("file name must not be empty"));
        }
        if data.is_empty() {
            return Err(DiskError::Argument("file data must not be empty"));
        }
        if let Some(record_length) = record_length {
            if record_length == 0 || record_length as usize > 254 {
                return Err(DiskError::InvalidRel("record length must be 1-254"));
            }
            if data.len() % record_length as usize != 0 {
                return Err(DiskError::Argument("data is not a whole number of records"));
            }
        }
        let name = Self::file_name(name);
        if self.lookup(&name)?.is_some() {
            return Err(DiskError::AlreadyExists(name.to_string()));
        }

        let sectors_needed = (data.len() + 253) / 254;
        if (self.free_sector_count() as usize) < sectors_needed {
            return Err(DiskError::DiskFull);
        }

        let start = self.find_and_allocate_free_sector()?;
        let sectors = self.write_chain(start, data)?;
        let side = match record_length {
            Some(record_length) => self.build_side_sectors(&sectors, record_length)?,
            None => Location(0, 0),
        };

        let slot = self.find_or_create_free_slot()?;
        let entry = DirectoryEntry {
            attributes: FileAttributes::closed(file_type),
            start,
            name,
            side,
            record_length: record_length.unwrap_or(0),
            replace: start,
            file_size: sectors.len() as u16,
            slot,
        };
        self.write_entry(&entry)
    }

    /// Delete a file: free its data chain and clear its directory slot.
    pub fn remove_file(&mut self, name: &str) -> Result<()> {
        let entry = self.find_file(name)?;
        self.free_chain(entry.start)?;
        // Side sectors of relative files are left allocated; verify_bam
        // reports and can reclaim them.
        self.clear_slot(entry.slot)
    }

    /// Give a file a new name.
    pub fn rename_file(&mut self, name: &str, new_name: &str) -> Result<()> {
        if new_name.is_empty() {
            return Err(DiskError::Argument("file name must not be empty"));
        }
        let mut entry = self.find_file(name)?;
        let new_name = Self::file_name(new_name);
        if entry.name == new_name {
            return Ok(());
        }
        if self.lookup(&new_name)?.is_some() {
            return Err(DiskError::AlreadyExists(new_name.to_string()));
        }
        entry.name = new_name;
        self.write_entry(&entry)
    }

    /// Set the file's locked flag.
    pub fn lock_file(&mut self, name: &str) -> Result<()> {
        let mut entry = self.find_file(name)?;
        entry.attributes.locked_flag = true;
        self.write_entry(&entry)
    }

    /// Clear the file's locked flag.
    pub fn unlock_file(&mut self, name: &str) -> Result<()> {
        let mut entry = self.find_file(name)?;
        entry.attributes.locked_flag = false;
        self.write_entry(&entry)
    }

    /// Rewrite the directory in the given order.  The list must be a
    /// permutation of the current live entries.  Returns false without
    /// touching the buffer when the order already matches.
    pub fn reorder_directory(&mut self, files: &[DirectoryEntry]) -> Result<bool> {
        let current = self.directory()?;
        if current.len() != files.len() {
            return Err(DiskError::Argument(
                "reorder list must contain every live entry",
            ));
        }
        if current.as_slice() == files {
            return Ok(false);
        }
        self.write_directory_entries(files)?;
        Ok(true)
    }

    /// Stable-sort the directory with a caller-supplied comparison.
    pub fn reorder_directory_by<F>(&mut self, mut compare: F) -> Result<bool>
    where
        F: FnMut(&DirectoryEntry, &DirectoryEntry) -> Ordering,
    {
        let mut files = self.directory()?;
        files.sort_by(|a, b| compare(a, b));
        self.reorder_directory(&files)
    }

    /// Move the named files to the front of the directory, in the order
    /// given; all other entries keep their relative order.  Names that
    /// match nothing are ignored.
    pub fn reorder_directory_by_names(&mut self, order: &[&str]) -> Result<bool> {
        let mut remaining = self.directory()?;
        let mut files = Vec::with_capacity(remaining.len());
        for name in order {
            let query = Self::file_name(name);
            if let Some(position) = remaining.iter().position(|entry| entry.name == query) {
                files.push(remaining.remove(position));
            }
        }
        files.append(&mut remaining);
        self.reorder_directory(&files)
    }

    /// Swap the named file into the first directory position.
    pub fn move_file_first(&mut self, name: &str) -> Result<bool> {
        let mut files = self.directory()?;
        let position = self.position_of(&files, name)?;
        if position == 0 {
            return Ok(false);
        }
        files.swap(0, position);
        self.reorder_directory(&files)
    }

    /// Move the named file one position up (or down) in the directory.
    pub fn move_file(&mut self, name: &str, up: bool) -> Result<bool> {
        let mut files = self.directory()?;
        let position = self.position_of(&files, name)?;
        if (up && position == 0) || (!up && position + 1 == files.len()) {
            return Ok(false);
        }
        let other = if up { position - 1 } else { position + 1 };
        files.swap(position, other);
        self.reorder_directory(&files)
    }

    fn position_of(&self, files: &[DirectoryEntry], name: &str) -> Result<usize> {
        let query = Self::file_name(name);
        files
            .iter()
            .position(|entry| entry.name == query)
            .ok_or_else(|| DiskError::NotFound(name.to_string()))
    }

    /// Pack all live entries to the front of the directory and free any
    /// directory sectors that fall empty.  The first directory sector is
    /// always kept.  Returns false if the directory was already compact.
    pub fn compact_directory(&mut self) -> Result<bool> {
        let files = self.directory()?;
        let sectors = self.chain_locations(DIRECTORY_START)?;
        let needed = ((files.len() + ENTRIES_PER_SECTOR - 1) / ENTRIES_PER_SECTOR).max(1);

        let packed = files.iter().enumerate().all(|(i, entry)| {
            entry.slot.sector == sectors[i / ENTRIES_PER_SECTOR]
                && entry.slot.index as usize == i % ENTRIES_PER_SECTOR
        });
        if packed && sectors.len() == needed {
            return Ok(false);
        }

        for (n, &location) in sectors.iter().take(needed).enumerate() {
            let link = if n + 1 < needed {
                ChainLink::Next(sectors[n + 1])
            } else {
                ChainLink::Tail(SECTOR_SIZE)
            };
            let block = self.block_mut(location);
            for byte in block.iter_mut() {
                *byte = 0;
            }
            link.write(block);
        }
        for (i, entry) in files.iter().enumerate() {
            let mut entry = entry.clone();
            entry.slot = SlotHandle {
                sector: sectors[i / ENTRIES_PER_SECTOR],
                index: (i % ENTRIES_PER_SECTOR) as u8,
            };
            self.write_entry(&entry)?;
        }
        for &location in &sectors[needed..] {
            let block = self.block_mut(location);
            for byte in block.iter_mut() {
                *byte = 0;
            }
            self.free_sector(location)?;
        }
        Ok(true)
    }

    /// Rewrite every slot of the existing directory chain with the given
    /// entries, eight per sector.  The chain is not shrunk.
    fn write_directory_entries(&mut self, files: &[DirectoryEntry]) -> Result<()> {
        let sectors = self.chain_locations(DIRECTORY_START)?;
        for &location in &sectors {
            let block = self.block_mut(location);
            for byte in block[2..].iter_mut() {
                *byte = 0;
            }
        }
        for (i, entry) in files.iter().enumerate() {
            let mut entry = entry.clone();
            entry.slot = SlotHandle {
                sector: sectors[i / ENTRIES_PER_SECTOR],
                index: (i % ENTRIES_PER_SECTOR) as u8,
            };
            self.write_entry(&entry)?;
        }
        Ok(())
    }

    /// Find a free slot, extending the directory chain with a fresh sector
    /// on the directory track when every slot is taken.
    fn find_or_create_free_slot(&mut self) -> Result<SlotHandle> {
        let mut last = DIRECTORY_START;
        {
            let mut chain = self.chain_iter(DIRECTORY_START);
            while let Some(sector) = chain.next() {
                let sector = sector?;
                last = sector.location;
                for index in 0..ENTRIES_PER_SECTOR {
                    let handle = SlotHandle {
                        sector: sector.location,
                        index: index as u8,
                    };
                    if sector.data[handle.entry_offset() + TYPE_OFFSET] & ATTRIB_CLOSED_MASK == 0 {
                        return Ok(handle);
                    }
                }
            }
        }

        let grown = self.find_and_allocate_on_track(DIRECTORY_TRACK)?;
        {
            let block = self.block_mut(grown);
            for byte in block.iter_mut() {
                *byte = 0;
            }
            ChainLink::Tail(SECTOR_SIZE).write(block);
        }
        grown.write_bytes(self.block_mut(last));
        Ok(SlotHandle {
            sector: grown,
            index: 0,
        })
    }

    fn write_entry(&mut self, entry: &DirectoryEntry) -> Result<()> {
        let offset = entry.slot.entry_offset();
        let block = self.sector_mut(entry.slot.sector)?;
        entry.to_bytes(&mut block[offset..offset + ENTRY_SIZE]);
        Ok(())
    }

    fn clear_slot(&mut self, slot: SlotHandle) -> Result<()> {
        let offset = slot.entry_offset();
        let block = self.sector_mut(slot.sector)?;
        for byte in block[offset..offset + ENTRY_SIZE].iter_mut() {
            *byte = 0;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::DiskType;

    const MAX_DIRECTORY_ENTRIES: usize = 144;

    fn fresh_disk() -> D64 {
        D64::new(DiskType::ThirtyFiveTrack)
    }

    fn names(disk: &D64) -> Vec<String> {
        disk.directory()
            .unwrap()
            .iter()
            .map(|entry| entry.name.to_string())
            .collect()
    }

    #[test]
    fn test_directory_entry_round_trip() {
        // A real-world entry: a closed PRG named "ASCII CODES", six
        // sectors long, starting at (17,5).
        #[rustfmt::skip]
        static BUFFER: [u8; ENTRY_SIZE] = [
            0x82, 0x11, 0x05, 0x41, 0x53, 0x43, 0x49, 0x49, 0x20, 0x43,
            0x4f, 0x44, 0x45, 0x53, 0xa0, 0xa0, 0xa0, 0xa0, 0xa0, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x06, 0x00,
        ];
        let slot = SlotHandle {
            sector: Location(18, 1),
            index: 1,
        };
        let entry = DirectoryEntry::from_bytes(&BUFFER, slot);
        assert_eq!(entry.file_type(), FileType::PRG);
        assert!(entry.attributes.closed_flag);
        assert!(!entry.attributes.locked_flag);
        assert_eq!(entry.start, Location(0x11, 0x05));
        assert_eq!(entry.name, Petscii::from("ASCII CODES"));
        assert_eq!(entry.side, Location(0, 0));
        assert_eq!(entry.record_length, 0);
        assert_eq!(entry.file_size, 6);

        let mut output = [0u8; ENTRY_SIZE];
        entry.to_bytes(&mut output);
        assert_eq!(output, BUFFER);
    }

    #[test]
    fn test_file_attributes_round_trip() {
        for byte in 0..=255u8 {
            let attributes = FileAttributes::from_byte(byte);
            assert_eq!(attributes.to_byte(), byte);
        }
        let attributes = FileAttributes::from_byte(0xc2);
        assert_eq!(attributes.file_type, FileType::PRG);
        assert!(attributes.closed_flag);
        assert!(attributes.locked_flag);
        assert!(!attributes.replace_flag);
    }

    #[test]
    fn test_add_file_populates_entry() {
        let mut disk = fresh_disk();
        disk.add_file("FILE1", FileType::PRG, &[0x01; 66]).unwrap();
        let directory = disk.directory().unwrap();
        assert_eq!(directory.len(), 1);
        let entry = &directory[0];
        assert_eq!(entry.name, Petscii::from("FILE1"));
        assert_eq!(entry.file_type(), FileType::PRG);
        assert!(entry.attributes.closed_flag);
        assert_eq!(entry.file_size, 1);
        assert_ne!(entry.start.0, 0);
        assert_eq!(entry.replace, entry.start);
        assert_eq!(entry.side, Location(0, 0));
    }

    #[test]
    fn test_add_file_argument_validation() {
        let mut disk = fresh_disk();
        assert!(matches!(
            disk.add_file("", FileType::PRG, &[1]),
            Err(DiskError::Argument(_))
        ));
        assert!(matches!(
            disk.add_file("X", FileType::PRG, &[]),
            Err(DiskError::Argument(_))
        ));
        assert!(matches!(
            disk.add_file("X", FileType::DEL, &[1]),
            Err(DiskError::Argument(_))
        ));
        assert!(matches!(
            disk.add_rel_file("X", 0, &[1]),
            Err(DiskError::InvalidRel(_))
        ));
        assert!(matches!(
            disk.add_rel_file("X", 64, &[1; 100]),
            Err(DiskError::Argument(_))
        ));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut disk = fresh_disk();
        disk.add_file("SAME", FileType::SEQ, &[1, 2, 3]).unwrap();
        assert!(matches!(
            disk.add_file("SAME", FileType::PRG, &[4, 5]),
            Err(DiskError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_long_names_truncate_consistently() {
        let mut disk = fresh_disk();
        let long = "ABCDEFGHIJKLMNOPQRST";
        disk.add_file(long, FileType::SEQ, &[1]).unwrap();
        let entry = disk.find_file(long).unwrap();
        assert_eq!(entry.name.len(), FILE_NAME_SIZE);
        assert!(disk.find_file("ABCDEFGHIJKLMNOP").is_ok());
    }

    #[test]
    fn test_remove_file() {
        let mut disk = fresh_disk();
        let free = disk.free_sector_count();
        disk.add_file("A", FileType::SEQ, &[1; 600]).unwrap();
        disk.add_file("B", FileType::SEQ, &[2; 600]).unwrap();
        assert_eq!(disk.free_sector_count(), free - 6);
        disk.remove_file("A").unwrap();
        assert_eq!(names(&disk), vec!["B"]);
        assert_eq!(disk.free_sector_count(), free - 3);
        assert!(matches!(
            disk.remove_file("A"),
            Err(DiskError::NotFound(_))
        ));
    }

    #[test]
    fn test_rename_file() {
        let mut disk = fresh_disk();
        disk.add_file("OLD", FileType::PRG, &[1]).unwrap();
        disk.add_file("TAKEN", FileType::PRG, &[2]).unwrap();
        assert!(matches!(
            disk.rename_file("OLD", "TAKEN"),
            Err(DiskError::AlreadyExists(_))
        ));
        disk.rename_file("OLD", "NEW").unwrap();
        assert!(disk.find_file("NEW").is_ok());
        assert!(matches!(
            disk.find_file("OLD"),
            Err(DiskError::NotFound(_))
        ));
        assert_eq!(disk.read_file("NEW").unwrap(), vec![1]);
    }

    #[test]
    fn test_lock_and_unlock() {
        let mut disk = fresh_disk();
        disk.add_file("KEEP", FileType::PRG, &[1]).unwrap();
        disk.lock_file("KEEP").unwrap();
        assert!(disk.find_file("KEEP").unwrap().is_locked());
        disk.unlock_file("KEEP").unwrap();
        assert!(!disk.find_file("KEEP").unwrap().is_locked());
    }

    #[test]
    fn test_directory_fills_at_144_entries() {
        let mut disk = fresh_disk();
        for i in 0..MAX_DIRECTORY_ENTRIES {
            disk.add_file(&format!("FILE{}", i), FileType::PRG, &[0x60])
                .unwrap();
        }
        assert_eq!(disk.directory().unwrap().len(), MAX_DIRECTORY_ENTRIES);
        match disk.add_file("ONE MORE", FileType::PRG, &[0x60]) {
            Err(DiskError::DiskFull) => {}
            other => panic!("expected disk full, got {:?}", other),
        }
    }

    #[test]
    fn test_reorder_by_names() {
        let mut disk = fresh_disk();
        for name in ["A", "B", "C"].iter() {
            disk.add_file(name, FileType::PRG, &[1]).unwrap();
        }
        assert!(disk.reorder_directory_by_names(&["C"]).unwrap());
        assert_eq!(names(&disk), vec!["C", "A", "B"]);
        // Re-applying the current order changes nothing.
        assert!(!disk.reorder_directory_by_names(&["C", "A", "B"]).unwrap());
        // Files keep their contents across a reorder.
        assert_eq!(disk.read_file("B").unwrap(), vec![1]);
    }

    #[test]
    fn test_reorder_by_comparator() {
        let mut disk = fresh_disk();
        for name in ["DELTA", "ALPHA", "CHARLIE", "BRAVO"].iter() {
            disk.add_file(name, FileType::PRG, &[1]).unwrap();
        }
        assert!(disk
            .reorder_directory_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()))
            .unwrap());
        assert_eq!(names(&disk), vec!["ALPHA", "BRAVO", "CHARLIE", "DELTA"]);
        assert!(!disk
            .reorder_directory_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()))
            .unwrap());
    }

    #[test]
    fn test_move_file() {
        let mut disk = fresh_disk();
        for name in ["A", "B", "C"].iter() {
            disk.add_file(name, FileType::PRG, &[1]).unwrap();
        }
        assert!(disk.move_file_first("C").unwrap());
        assert_eq!(names(&disk), vec!["C", "B", "A"]);
        assert!(!disk.move_file_first("C").unwrap());
        assert!(disk.move_file("B", false).unwrap());
        assert_eq!(names(&disk), vec!["C", "A", "B"]);
        assert!(!disk.move_file("B", false).unwrap());
        assert!(disk.move_file("A", true).unwrap());
        assert_eq!(names(&disk), vec!["A", "C", "B"]);
        assert!(matches!(
            disk.move_file("MISSING", true),
            Err(DiskError::NotFound(_))
        ));
    }

    #[test]
    fn test_compact_directory() {
        let mut disk = fresh_disk();
        for i in 0..12 {
            disk.add_file(&format!("FILE{}", i), FileType::PRG, &[1])
                .unwrap();
        }
        // Two directory sectors are now in use.
        assert_eq!(disk.chain_locations(DIRECTORY_START).unwrap().len(), 2);
        for i in 0..8 {
            disk.remove_file(&format!("FILE{}", i)).unwrap();
        }
        let free = disk.free_sector_count();
        assert!(disk.compact_directory().unwrap());
        assert_eq!(disk.chain_locations(DIRECTORY_START).unwrap().len(), 1);
        assert_eq!(names(&disk), vec!["FILE8", "FILE9", "FILE10", "FILE11"]);
        // The freed directory sector is on track 18, so the data-sector
        // count is unchanged.
        assert_eq!(disk.free_sector_count(), free);
        assert!(!disk.compact_directory().unwrap());
        assert_eq!(disk.read_file("FILE10").unwrap(), vec![1]);
    }
}
