//! # Format Catalog
//!
//! Static geometry of the CBM drive formats.  Every lookup is a pure function of
//! the `DiskType` and track count, there is no shared mutable table.
//!
//! Sector counts follow the speed zones of the drives.  Double sided formats
//! (D71, D82) repeat the single sided zone table on the second side, with the
//! second side's tracks numbered after the first side's.

use super::{DiskType,DosFormat,Error};

pub const SECTOR_SIZE: usize = 256;

/// (last track of zone, sectors in zone) for 1541 style media
const ZONES_1541: [(u8,usize);4] = [(17,21),(24,19),(30,18),(42,17)];
/// (last track of zone, sectors in zone) for 8050 style media
const ZONES_8050: [(u8,usize);4] = [(39,29),(53,27),(64,25),(77,23)];

pub const BLOCKS_1541: usize = 683;
pub const BLOCKS_8050: usize = 2083;
pub const SECTORS_1581: usize = 40;

fn zone_sectors(zones: &[(u8,usize)],track: u8) -> usize {
    if track==0 {
        return 0;
    }
    for (last,count) in zones {
        if track <= *last {
            return *count;
        }
    }
    0
}

/// Number of blocks in front of `track` on a single side described by `zones`
fn zone_index(zones: &[(u8,usize)],track: u8) -> usize {
    let mut ans = 0;
    for t in 1..track {
        ans += zone_sectors(zones,t);
    }
    ans
}

/// Everything the drive needs to know about the layout of a disk.
#[derive(Clone,Copy,Debug,PartialEq)]
pub struct Geometry {
    pub disk_type: DiskType,
    pub format: DosFormat,
    pub tracks: u8,
    pub bam_track: u8,
    pub bam_sector: u8,
    pub dir_track: u8,
    pub dir_sector: u8,
    /// offset of the disk name within the BAM header block
    pub bam_name: usize,
    /// offset of the disk id within the BAM header block
    pub bam_id: usize
}

impl Geometry {
    /// Geometry for a disk type; `tracks` only matters for D64 (35..=42) and GCR containers.
    pub fn new(disk_type: DiskType,tracks: u8) -> Result<Self,Error> {
        let (format,tracks) = match disk_type {
            DiskType::D64 | DiskType::G64 => {
                if tracks<35 || tracks>42 {
                    return Err(Error::TrackCountMismatch);
                }
                (DosFormat::Cbm1541,tracks)
            },
            DiskType::D71 => (DosFormat::Cbm1571,70),
            DiskType::D81 => (DosFormat::Cbm1581,80),
            DiskType::D80 => (DosFormat::Cbm8050,77),
            DiskType::D82 => (DosFormat::Cbm8250,154)
        };
        let ans = match format {
            DosFormat::Cbm1541 | DosFormat::Cbm1571 => Self {
                disk_type,format,tracks,
                bam_track: 18, bam_sector: 0,
                dir_track: 18, dir_sector: 1,
                bam_name: 0x90, bam_id: 0xa2
            },
            DosFormat::Cbm1581 => Self {
                disk_type,format,tracks,
                bam_track: 40, bam_sector: 0,
                dir_track: 40, dir_sector: 3,
                bam_name: 0x04, bam_id: 0x16
            },
            DosFormat::Cbm8050 | DosFormat::Cbm8250 => Self {
                disk_type,format,tracks,
                bam_track: 39, bam_sector: 0,
                dir_track: 39, dir_sector: 1,
                bam_name: 0x06, bam_id: 0x18
            }
        };
        Ok(ans)
    }
    /// Sectors on the given track, 0 if the track does not exist.
    pub fn sectors_in_track(&self,track: u8) -> usize {
        if track<1 || track>self.tracks {
            return 0;
        }
        match self.disk_type {
            DiskType::D64 | DiskType::G64 => zone_sectors(&ZONES_1541,track),
            DiskType::D71 => match track {
                t if t>35 => zone_sectors(&ZONES_1541,t-35),
                t => zone_sectors(&ZONES_1541,t)
            },
            DiskType::D81 => SECTORS_1581,
            DiskType::D80 => zone_sectors(&ZONES_8050,track),
            DiskType::D82 => match track {
                t if t>77 => zone_sectors(&ZONES_8050,t-77),
                t => zone_sectors(&ZONES_8050,t)
            }
        }
    }
    pub fn check_sector(&self,track: u8,sector: u8) -> bool {
        (sector as usize) < self.sectors_in_track(track)
    }
    /// Zero based block number of a (track,sector), or `GeometryMismatch`.
    pub fn block_index(&self,track: u8,sector: u8) -> Result<usize,Error> {
        if !self.check_sector(track,sector) {
            return Err(Error::GeometryMismatch);
        }
        let base = match self.disk_type {
            DiskType::D64 | DiskType::G64 => zone_index(&ZONES_1541,track),
            DiskType::D71 => match track {
                t if t>35 => BLOCKS_1541 + zone_index(&ZONES_1541,t-35),
                t => zone_index(&ZONES_1541,t)
            },
            DiskType::D81 => (track as usize - 1) * SECTORS_1581,
            DiskType::D80 => zone_index(&ZONES_8050,track),
            DiskType::D82 => match track {
                t if t>77 => BLOCKS_8050 + zone_index(&ZONES_8050,t-77),
                t => zone_index(&ZONES_8050,t)
            }
        };
        Ok(base + sector as usize)
    }
    /// Byte offset of a block in a headerless image
    pub fn track_sector_to_offset(&self,track: u8,sector: u8) -> Result<u64,Error> {
        Ok((self.block_index(track,sector)? * SECTOR_SIZE) as u64)
    }
    pub fn total_blocks(&self) -> usize {
        let mut ans = 0;
        for t in 1..=self.tracks {
            ans += self.sectors_in_track(t);
        }
        ans
    }
    pub fn byte_capacity(&self) -> usize {
        self.total_blocks() * SECTOR_SIZE
    }
    /// Largest distance from the directory track that still lands on the disk.
    pub fn max_distance(&self) -> u8 {
        u8::max(self.dir_track - 1,self.tracks - self.dir_track)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn capacities() {
        assert_eq!(Geometry::new(DiskType::D64,35).unwrap().total_blocks(),683);
        assert_eq!(Geometry::new(DiskType::D64,40).unwrap().total_blocks(),768);
        assert_eq!(Geometry::new(DiskType::D71,70).unwrap().byte_capacity(),349696);
        assert_eq!(Geometry::new(DiskType::D81,80).unwrap().byte_capacity(),819200);
        assert_eq!(Geometry::new(DiskType::D80,77).unwrap().total_blocks(),2083);
        assert_eq!(Geometry::new(DiskType::D82,154).unwrap().total_blocks(),4166);
    }

    #[test]
    fn offsets() {
        let d64 = Geometry::new(DiskType::D64,35).unwrap();
        assert_eq!(d64.track_sector_to_offset(1,0).unwrap(),0);
        assert_eq!(d64.track_sector_to_offset(18,0).unwrap(),357*256);
        assert_eq!(d64.track_sector_to_offset(35,16).unwrap(),682*256);
        assert!(d64.track_sector_to_offset(18,19).is_err());
        assert!(d64.track_sector_to_offset(36,0).is_err());
        assert!(d64.track_sector_to_offset(0,0).is_err());
        let d71 = Geometry::new(DiskType::D71,70).unwrap();
        assert_eq!(d71.block_index(36,0).unwrap(),683);
        assert_eq!(d71.block_index(53,0).unwrap(),683+357);
        let d82 = Geometry::new(DiskType::D82,154).unwrap();
        assert_eq!(d82.block_index(78,0).unwrap(),2083);
        assert_eq!(d82.sectors_in_track(154),23);
    }

    #[test]
    fn radiating_distance() {
        assert_eq!(Geometry::new(DiskType::D64,35).unwrap().max_distance(),17);
        assert_eq!(Geometry::new(DiskType::D64,40).unwrap().max_distance(),22);
        assert_eq!(Geometry::new(DiskType::D81,80).unwrap().max_distance(),40);
        assert_eq!(Geometry::new(DiskType::D80,77).unwrap().max_distance(),38);
    }
}
