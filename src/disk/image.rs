//! Loading and saving disk image files.
//!
//! An image file is the raw sector-major byte stream, nothing more: no
//! header, no checksum.  The file size alone selects the disk type.

use std::fs;
use std::path::Path;

use log::warn;

use crate::disk::error::{DiskError, Result};
use crate::disk::geometry::{DiskType, Location};
use crate::disk::{D64, BAM_LOCATION, DEFAULT_DISK_NAME, DIRECTORY_START, DIRECTORY_TRACK};

impl D64 {
    /// Take ownership of raw image bytes.  A buffer whose BAM structure is
    /// not recognizable is reformatted as a blank disk rather than
    /// rejected, since such images are otherwise unusable.
    pub fn from_bytes(data: Vec<u8>) -> Result<D64> {
        let disk_type = DiskType::from_image_size(data.len()).ok_or_else(|| {
            DiskError::InvalidImage(format!("unrecognized image size: {} bytes", data.len()))
        })?;
        let mut disk = D64 {
            data,
            disk_type,
            last_sector_used: vec![1; disk_type.track_count() as usize],
        };
        if !disk.has_valid_structure() {
            warn!("BAM structure not recognizable; formatting as a blank disk");
            disk.format(DEFAULT_DISK_NAME);
        }
        Ok(disk)
    }

    /// Load a disk image file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<D64> {
        Self::from_bytes(fs::read(path)?)
    }

    /// Write the image to a host file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, &self.data)?;
        Ok(())
    }

    /// The raw image bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// The BAM must point at the first directory sector, and that sector
    /// must either continue the chain within the directory track or
    /// terminate it.
    fn has_valid_structure(&self) -> bool {
        let bam = self.block(BAM_LOCATION);
        if Location::from_bytes(&bam[0..2]) != DIRECTORY_START {
            return false;
        }
        let directory = self.block(DIRECTORY_START);
        directory[0] == DIRECTORY_TRACK || (directory[0] == 0 && directory[1] == 0xff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::directory::FileType;

    #[test]
    fn test_bytes_round_trip() {
        let mut disk = D64::new(DiskType::ThirtyFiveTrack);
        disk.add_file("PAYLOAD", FileType::PRG, &[3; 4000]).unwrap();
        let bytes = disk.as_bytes().to_vec();
        let reloaded = D64::from_bytes(bytes.clone()).unwrap();
        assert_eq!(reloaded.as_bytes(), &bytes[..]);
        assert_eq!(reloaded.disk_type(), DiskType::ThirtyFiveTrack);
        assert_eq!(reloaded.read_file("PAYLOAD").unwrap(), vec![3; 4000]);
    }

    #[test]
    fn test_size_selects_disk_type() {
        let disk = D64::from_bytes(D64::new(DiskType::FortyTrack).as_bytes().to_vec()).unwrap();
        assert_eq!(disk.disk_type(), DiskType::FortyTrack);
        match D64::from_bytes(vec![0; 1000]) {
            Err(DiskError::InvalidImage(_)) => {}
            other => panic!("expected invalid image, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_unrecognizable_structure_reformats() {
        let disk = D64::from_bytes(vec![0; DiskType::ThirtyFiveTrack.image_size()]).unwrap();
        assert_eq!(disk.disk_name().to_string(), DEFAULT_DISK_NAME);
        assert_eq!(disk.free_sector_count(), 664);
        assert!(disk.directory().unwrap().is_empty());
    }
}
