//! BAM integrity checking.
//!
//! The check rebuilds the expected allocation state by visiting every
//! sector reachable from the directory, then compares that against the
//! BAM bitmaps and free counts.  Findings are written as plain-text
//! `ERROR:`, `WARNING:`, and `FIXING:` lines to a caller-supplied sink.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::disk::directory::FileType;
use crate::disk::error::Result;
use crate::disk::geometry::{self, Location};
use crate::disk::{D64, BAM_LOCATION, DIRECTORY_START};

fn mark(usage: &mut [Vec<bool>], location: Location) {
    let track = location.0 as usize;
    if track >= 1 && track <= usage.len() {
        let row = &mut usage[track - 1];
        if (location.1 as usize) < row.len() {
            row[location.1 as usize] = true;
        }
    }
}

impl D64 {
    /// Cross-check the BAM against the sectors actually reachable from the
    /// directory, writing findings to `log_file` (or standard error when
    /// none is given).  With `fix`, bitmap bits and free counts are
    /// corrected in place.  Returns true iff no inconsistencies were found.
    pub fn verify_bam(&mut self, fix: bool, log_file: Option<&Path>) -> Result<bool> {
        match log_file {
            Some(path) => {
                let mut file = File::create(path)?;
                self.verify_bam_with(fix, &mut file)
            }
            None => self.verify_bam_with(fix, &mut io::stderr()),
        }
    }

    /// As [`D64::verify_bam`], reporting to any writer.
    pub fn verify_bam_with(&mut self, fix: bool, log: &mut dyn Write) -> Result<bool> {
        let track_count = self.disk_type.track_count();
        let mut usage: Vec<Vec<bool>> = (1..=track_count)
            .map(|track| vec![false; geometry::sectors_in_track(track) as usize])
            .collect();
        let mut errors_found = false;

        // Everything reachable: the BAM itself, the directory chain, and
        // each live file's sectors.
        mark(&mut usage, BAM_LOCATION);
        for location in self.chain_locations(DIRECTORY_START)? {
            mark(&mut usage, location);
        }
        for entry in self.directory_iter() {
            let entry = entry?;
            match self.chain_locations(entry.start) {
                Ok(locations) => {
                    for location in locations {
                        mark(&mut usage, location);
                    }
                }
                Err(e) => {
                    writeln!(log, "ERROR: Unable to scan file {:?}: {}", entry.name, e)?;
                    errors_found = true;
                }
            }
            if entry.file_type() == FileType::REL && entry.side.0 != 0 {
                match self.parse_side_sectors(entry.side) {
                    Ok((side_sectors, data_sectors)) => {
                        for location in side_sectors.into_iter().chain(data_sectors) {
                            mark(&mut usage, location);
                        }
                    }
                    Err(e) => {
                        writeln!(
                            log,
                            "ERROR: Unable to scan side sectors of {:?}: {}",
                            entry.name, e
                        )?;
                        errors_found = true;
                    }
                }
            }
        }

        for track in 1..=track_count {
            let mut expected_free: u8 = 0;
            for sector in 0..geometry::sectors_in_track(track) {
                let location = Location(track, sector);
                let used = usage[track as usize - 1][sector as usize];
                let free_in_bam = self.bam_bit(location);

                if !used && !free_in_bam {
                    writeln!(
                        log,
                        "ERROR: Sector {} on Track {} is incorrectly marked as used in BAM.",
                        sector, track
                    )?;
                    errors_found = true;
                    if fix {
                        writeln!(log, "FIXING: Freeing sector {} on Track {}.", sector, track)?;
                        self.set_bam_bit(location, true);
                    }
                } else if used && free_in_bam {
                    writeln!(
                        log,
                        "ERROR: Sector {} on Track {} is incorrectly marked as free in BAM.",
                        sector, track
                    )?;
                    errors_found = true;
                    if fix {
                        writeln!(
                            log,
                            "FIXING: Marking sector {} on Track {} as used.",
                            sector, track
                        )?;
                        self.set_bam_bit(location, false);
                    }
                }

                if !used {
                    expected_free += 1;
                }
            }

            let bam_free = self.bam_free_count(track);
            if bam_free != expected_free {
                writeln!(
                    log,
                    "WARNING: BAM free sector count mismatch on Track {} (BAM: {}, Expected: {})",
                    track, bam_free, expected_free
                )?;
                errors_found = true;
                if fix {
                    writeln!(log, "FIXING: Correcting free sector count for Track {}.", track)?;
                    self.set_bam_free_count(track, expected_free);
                }
            }
        }

        Ok(!errors_found)
    }
}

#[cfg(test)]
mod tests {
    use crate::disk::directory::FileType;
    use crate::disk::{DiskType, Location, D64};

    fn verify(disk: &mut D64, fix: bool) -> (bool, String) {
        let mut log = Vec::new();
        let clean = disk.verify_bam_with(fix, &mut log).unwrap();
        (clean, String::from_utf8(log).unwrap())
    }

    #[test]
    fn test_fresh_disk_is_clean() {
        for &disk_type in &[DiskType::ThirtyFiveTrack, DiskType::FortyTrack] {
            let mut disk = D64::new(disk_type);
            let (clean, log) = verify(&mut disk, false);
            assert!(clean);
            assert!(log.is_empty());
        }
    }

    #[test]
    fn test_disk_with_files_is_clean() {
        let mut disk = D64::new(DiskType::ThirtyFiveTrack);
        disk.add_file("ONE", FileType::PRG, &[1; 500]).unwrap();
        disk.add_rel_file("TWO", 50, &[2; 5000]).unwrap();
        let (clean, log) = verify(&mut disk, false);
        assert!(clean, "unexpected report:\n{}", log);
    }

    #[test]
    fn test_leaked_sector_reported_and_fixed() {
        let mut disk = D64::new(DiskType::ThirtyFiveTrack);
        let leaked = disk.find_and_allocate_free_sector().unwrap();
        let (clean, log) = verify(&mut disk, false);
        assert!(!clean);
        assert!(log.contains("incorrectly marked as used"));
        assert!(log.contains(&format!(
            "Sector {} on Track {}",
            leaked.1, leaked.0
        )));

        let (clean, _) = verify(&mut disk, true);
        assert!(!clean);
        assert!(disk.is_sector_free(leaked).unwrap());
        let (clean, log) = verify(&mut disk, false);
        assert!(clean, "not clean after fix:\n{}", log);
    }

    #[test]
    fn test_misfreed_sector_reported_and_fixed() {
        let mut disk = D64::new(DiskType::ThirtyFiveTrack);
        disk.add_file("DATA", FileType::SEQ, &[7; 1000]).unwrap();
        let entry = disk.find_file("DATA").unwrap();
        disk.free_sector(entry.start).unwrap();

        let (clean, log) = verify(&mut disk, false);
        assert!(!clean);
        assert!(log.contains("incorrectly marked as free"));
        assert!(log.contains("free sector count mismatch"));

        verify(&mut disk, true);
        assert!(!disk.is_sector_free(entry.start).unwrap());
        let (clean, _) = verify(&mut disk, false);
        assert!(clean);
    }

    #[test]
    fn test_tampered_free_count_reported() {
        let mut disk = D64::new(DiskType::ThirtyFiveTrack);
        // Track 1's free count lives at offset 4 of the BAM sector.
        disk.write_sector_byte(18, 0, 4, 9).unwrap();
        let (clean, log) = verify(&mut disk, false);
        assert!(!clean);
        assert!(log.contains("mismatch on Track 1 (BAM: 9, Expected: 21)"));
        verify(&mut disk, true);
        let (clean, _) = verify(&mut disk, false);
        assert!(clean);
    }

    #[test]
    fn test_removed_rel_file_leaks_side_sectors() {
        // Removing a relative file frees only its data chain; the side
        // sectors are reported by the verifier and reclaimed by fix mode.
        let mut disk = D64::new(DiskType::ThirtyFiveTrack);
        disk.add_rel_file("R", 100, &[9; 10000]).unwrap();
        disk.remove_file("R").unwrap();
        let (clean, log) = verify(&mut disk, false);
        assert!(!clean);
        assert!(log.contains("incorrectly marked as used"));
        verify(&mut disk, true);
        let (clean, _) = verify(&mut disk, false);
        assert!(clean);
        assert_eq!(disk.free_sector_count(), 664);
    }

    #[test]
    fn test_verify_writes_log_file() {
        let directory = tempfile::tempdir().unwrap();
        let log_path = directory.path().join("verify.log");
        let mut disk = D64::new(DiskType::ThirtyFiveTrack);
        disk.allocate_sector(Location(1, 0)).unwrap();
        assert!(!disk.verify_bam(false, Some(log_path.as_path())).unwrap());
        let log = std::fs::read_to_string(&log_path).unwrap();
        assert!(log.contains("ERROR: Sector 0 on Track 1"));
    }
}
