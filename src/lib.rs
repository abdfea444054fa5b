//! This is a Rust library for working with disk images used by the
//! Commodore 1541 disk drive, commonly stored in "D64" files.  Images are
//! held in memory as the exact byte layout found on disk, so a freshly
//! formatted or modified image can be written back out and used with any
//! emulator or transfer tool.
//!
//! Features:
//!
//! * Format 35-track (standard CBM DOS) and 40-track (DolphinDOS layout)
//!   disk images.
//! * Load and save image files, with size-based disk type detection.
//! * List, add, read, extract, remove, rename, lock, and unlock files.
//! * Write relative (REL) files, including their side-sector index.
//! * Reorder and compact the directory.
//! * Emulate the DOS "next available track and sector" allocation policy,
//!   so written images have the same sector layout a real drive would
//!   produce.
//! * Cross-check the Block Availability Map against the directory, and
//!   optionally repair inconsistencies.
//!
//! Current shortcomings:
//!
//! * GEOS-formatted disks are not interpreted.
//! * Error tables appended to image files are not supported.
//! * D71 and D81 images are out of scope.
//!
//! # Example
//!
//! The following creates a blank disk image, stores a file on it, and reads
//! it back:
//!
//! ```
//! use d64::disk::{DiskType, D64};
//! use d64::disk::directory::FileType;
//!
//! let mut disk = D64::new(DiskType::ThirtyFiveTrack);
//! disk.rename_disk("DEMOS");
//! disk.add_file("README", FileType::SEQ, b"HELLO, 1541").unwrap();
//! assert_eq!(disk.read_file("README").unwrap(), b"HELLO, 1541");
//! assert_eq!(disk.directory().unwrap().len(), 1);
//! ```
//!
//! # Design of disk image access
//!
//! The image is a single owned byte buffer, and the buffer is the only
//! authoritative state.  Layered on top of it:
//!
//! 1. A geometry table maps (track, sector) coordinates to byte offsets.
//! 2. The BAM manager maintains the per-track free bitmaps stored inside
//!    the buffer and picks sectors by the drive's interleave policy.
//! 3. Files are chains of sectors linked through their first two bytes;
//!    relative files add a two-level side-sector index on top.
//! 4. The directory is itself a sector chain holding fixed-size slots.
//! 5. `D64` ties these together into one engine value.
//!
//! The only state kept outside the buffer is the per-track "last sector
//! allocated" cursor, which the original drives also kept in drive RAM
//! rather than on disk.
//!
//! # License
//!
//! Distributed under the terms of both the MIT license and the Apache
//! License (Version 2.0).

pub mod disk;

mod petscii;

pub use crate::petscii::Petscii;
