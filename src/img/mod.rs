//! # Disk Image Module
//!
//! Disk images are represented by objects implementing the `DiskImage` trait.
//! This object is best thought of as the diskette plus the mechanism that reads it:
//! it knows how to find a 256 byte block given a (track,sector), but it does not
//! try to interpret the BAM or the directory, that is left to `vdrive`.
//!
//! ## Images
//!
//! * `store::ImageStore` keeps a file handle open for the life of the attachment
//!   and performs every block access directly on the file
//! * `mem::MemImage` holds the whole image in memory, for hosts that keep their
//!   own copy of the image, and for tests
//!
//! ## Formats
//!
//! The geometry of each format (tracks, sectors per track, location of BAM and
//! directory) is kept in `geometry`.  Recognizing an image is done by its exact
//! file size, except for the GCR container, which is recognized by its header,
//! see `gcr`.  GCR containers can be identified but not attached.

pub mod geometry;
pub mod store;
pub mod gcr;
pub mod mem;

use std::str::FromStr;
use std::fmt;
use crate::{STDRESULT,DYNERR};
pub use geometry::Geometry;

/// Enumerates disk image errors.  The `Display` trait will print equivalent long message.
#[derive(thiserror::Error,Debug)]
pub enum Error {
    #[error("unknown image type")]
    UnknownImageType,
    #[error("track count did not match request")]
    TrackCountMismatch,
    #[error("geometric coordinate out of range")]
    GeometryMismatch,
    #[error("image size did not match the request")]
    ImageSizeMismatch,
    #[error("unable to access sector")]
    SectorAccess,
    #[error("GCR images only support header detection")]
    GcrNotSupported
}

/// Kinds of image files that can be recognized
#[derive(PartialEq,Eq,Clone,Copy,Debug)]
pub enum DiskType {
    D64,
    D71,
    D81,
    D80,
    D82,
    G64
}

/// The DOS family that owns the on-disk structures
#[derive(PartialEq,Eq,Clone,Copy,Debug)]
pub enum DosFormat {
    Cbm1541 = 1541,
    Cbm1571 = 1571,
    Cbm1581 = 1581,
    Cbm8050 = 8050,
    Cbm8250 = 8250
}

impl FromStr for DiskType {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self,Self::Err> {
        match s {
            "d64" => Ok(Self::D64),
            "d71" => Ok(Self::D71),
            "d81" => Ok(Self::D81),
            "d80" => Ok(Self::D80),
            "d82" => Ok(Self::D82),
            "g64" => Ok(Self::G64),
            _ => Err(Error::UnknownImageType)
        }
    }
}

impl fmt::Display for DiskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::D64 => write!(f,"d64"),
            Self::D71 => write!(f,"d71"),
            Self::D81 => write!(f,"d81"),
            Self::D80 => write!(f,"d80"),
            Self::D82 => write!(f,"d82"),
            Self::G64 => write!(f,"g64")
        }
    }
}

impl fmt::Display for DosFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f,"{}",*self as u16)
    }
}

/// Accepted file extensions for image files
pub fn file_extensions() -> Vec<String> {
    ["d64","d71","d81","d80","d82","g64"].iter().map(|s| s.to_string()).collect()
}

/// Classify an image from its total length and first bytes.
/// The exact sizes are tried first, then the GCR header.
pub fn probe_bytes(len: u64,header: &[u8]) -> Result<Geometry,Error> {
    let maybe = match len {
        174848 | 175531 => Some((DiskType::D64,35)),
        196608 | 197376 => Some((DiskType::D64,40)),
        349696 => Some((DiskType::D71,70)),
        819200 => Some((DiskType::D81,80)),
        533248 => Some((DiskType::D80,77)),
        1066496 => Some((DiskType::D82,154)),
        _ => None
    };
    if let Some((typ,tracks)) = maybe {
        return Geometry::new(typ,tracks);
    }
    if let Some(gcr) = gcr::GcrHeader::from_bytes(header) {
        return Geometry::new(DiskType::G64,gcr.tracks());
    }
    Err(Error::UnknownImageType)
}

/// Does an image of this length carry an error-info table after the blocks
pub fn has_error_info(geometry: &Geometry,len: u64) -> bool {
    len == (geometry.total_blocks() * (geometry::SECTOR_SIZE + 1)) as u64
}

/// The main trait for working with any kind of disk image.
/// Block access is by (track,sector) with the CBM numbering (tracks from 1, sectors from 0).
pub trait DiskImage {
    fn geometry(&self) -> &Geometry;
    fn what_am_i(&self) -> DiskType {
        self.geometry().disk_type
    }
    fn is_read_only(&self) -> bool;
    /// Read exactly one 256 byte block
    fn read_block(&mut self,track: u8,sector: u8) -> Result<Vec<u8>,DYNERR>;
    /// Write exactly one 256 byte block, shorter data is padded with zeros
    fn write_block(&mut self,track: u8,sector: u8,dat: &[u8]) -> STDRESULT;
    /// The raw error-info byte of a block, if the image carries the table
    fn error_info(&self,track: u8,sector: u8) -> Option<u8>;
    /// Reload the error-info table from the underlying storage
    fn reload_error_info(&mut self) -> STDRESULT;
    /// Flush pending writes to the underlying storage
    fn sync(&mut self) -> STDRESULT {
        Ok(())
    }
    /// Get the whole image as it would be stored
    fn to_bytes(&mut self) -> Result<Vec<u8>,DYNERR>;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn classify_by_size() {
        assert_eq!(probe_bytes(174848,&[]).unwrap().tracks,35);
        assert_eq!(probe_bytes(175531,&[]).unwrap().disk_type,DiskType::D64);
        assert_eq!(probe_bytes(196608,&[]).unwrap().tracks,40);
        assert_eq!(probe_bytes(349696,&[]).unwrap().disk_type,DiskType::D71);
        assert_eq!(probe_bytes(819200,&[]).unwrap().disk_type,DiskType::D81);
        assert_eq!(probe_bytes(533248,&[]).unwrap().disk_type,DiskType::D80);
        assert_eq!(probe_bytes(1066496,&[]).unwrap().disk_type,DiskType::D82);
        assert!(probe_bytes(1000,&[0;12]).is_err());
    }

    #[test]
    fn error_table_sizes() {
        let d64 = Geometry::new(DiskType::D64,35).unwrap();
        assert!(has_error_info(&d64,175531));
        assert!(!has_error_info(&d64,174848));
        let d64 = Geometry::new(DiskType::D64,40).unwrap();
        assert!(has_error_info(&d64,197376));
    }
}
