//! ## File backed disk images
//!
//! The image file stays open for the lifetime of the attachment.  Every block access
//! seeks to the block's offset and transfers exactly 256 bytes; a short transfer is an
//! error that is passed up, never retried.  If the file cannot be opened for writing it
//! is opened read only, and the image reports itself as write protected.

use std::fs::{File,OpenOptions};
use std::io::{Read,Write,Seek,SeekFrom};
use std::path::{Path,PathBuf};
use log::{trace,debug,info,warn};
use super::{DiskImage,DiskType,Geometry,Error};
use super::geometry::SECTOR_SIZE;
use super::gcr;
use crate::{STDRESULT,DYNERR};

fn probe_file(file: &mut File) -> Result<(Geometry,u64),DYNERR> {
    let len = file.metadata()?.len();
    let mut header: Vec<u8> = Vec::new();
    file.seek(SeekFrom::Start(0))?;
    Read::by_ref(file).take(gcr::HEADER_LEN as u64).read_to_end(&mut header)?;
    Ok((super::probe_bytes(len,&header)?,len))
}

/// Identify the format of an image file without attaching it
pub fn probe(path: &Path) -> Result<Geometry,DYNERR> {
    let mut file = File::open(path)?;
    let (geometry,_len) = probe_file(&mut file)?;
    info!("identified {} image with {} tracks",geometry.disk_type,geometry.tracks);
    Ok(geometry)
}

/// Disk image accessed directly through an open file
pub struct ImageStore {
    path: PathBuf,
    file: File,
    geometry: Geometry,
    read_only: bool,
    error_info: Option<Vec<u8>>
}

impl ImageStore {
    /// Open an existing image read-write, falling back to read only.
    pub fn open(path: &Path) -> Result<Self,DYNERR> {
        let (mut file,read_only) = match OpenOptions::new().read(true).write(true).open(path) {
            Ok(f) => (f,false),
            Err(e) => {
                warn!("cannot open {} for writing: {}",path.display(),e);
                (File::open(path)?,true)
            }
        };
        let (geometry,_len) = probe_file(&mut file)?;
        if geometry.disk_type==DiskType::G64 {
            info!("{} is a GCR container",path.display());
            return Err(Box::new(Error::GcrNotSupported));
        }
        info!("attached {} image {}{}",geometry.disk_type,path.display(),match read_only {
            true => " (read only)",
            false => ""
        });
        let mut ans = Self {
            path: path.to_path_buf(),
            file,
            geometry,
            read_only,
            error_info: None
        };
        ans.reload_error_info()?;
        Ok(ans)
    }
    /// Create a zero filled image file of the exact size for the disk type, and open it.
    pub fn create(path: &Path,disk_type: DiskType,tracks: u8) -> Result<Self,DYNERR> {
        if disk_type==DiskType::G64 {
            return Err(Box::new(Error::GcrNotSupported));
        }
        let geometry = Geometry::new(disk_type,tracks)?;
        std::fs::write(path,vec![0;geometry.byte_capacity()])?;
        Self::open(path)
    }
    pub fn path(&self) -> &Path {
        &self.path
    }
    fn offset(&self,track: u8,sector: u8) -> Result<u64,Error> {
        self.geometry.track_sector_to_offset(track,sector)
    }
}

impl DiskImage for ImageStore {
    fn geometry(&self) -> &Geometry {
        &self.geometry
    }
    fn is_read_only(&self) -> bool {
        self.read_only
    }
    fn read_block(&mut self,track: u8,sector: u8) -> Result<Vec<u8>,DYNERR> {
        trace!("read {},{}",track,sector);
        let offset = self.offset(track,sector)?;
        let mut ans = vec![0;SECTOR_SIZE];
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(&mut ans)?;
        Ok(ans)
    }
    fn write_block(&mut self,track: u8,sector: u8,dat: &[u8]) -> STDRESULT {
        trace!("write {},{}",track,sector);
        if self.read_only {
            return Err(Box::new(Error::SectorAccess));
        }
        let offset = self.offset(track,sector)?;
        let mut buf = vec![0;SECTOR_SIZE];
        let n = usize::min(dat.len(),SECTOR_SIZE);
        buf[0..n].copy_from_slice(&dat[0..n]);
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&buf)?;
        Ok(())
    }
    fn error_info(&self,track: u8,sector: u8) -> Option<u8> {
        let idx = self.geometry.block_index(track,sector).ok()?;
        match &self.error_info {
            Some(table) => table.get(idx).copied(),
            None => None
        }
    }
    fn reload_error_info(&mut self) -> STDRESULT {
        let len = self.file.metadata()?.len();
        if !super::has_error_info(&self.geometry,len) {
            self.error_info = None;
            return Ok(());
        }
        let blocks = self.geometry.total_blocks();
        let mut table = vec![0;blocks];
        self.file.seek(SeekFrom::Start((blocks*SECTOR_SIZE) as u64))?;
        self.file.read_exact(&mut table)?;
        debug!("loaded error info for {} blocks",blocks);
        self.error_info = Some(table);
        Ok(())
    }
    fn sync(&mut self) -> STDRESULT {
        self.file.flush()?;
        Ok(())
    }
    fn to_bytes(&mut self) -> Result<Vec<u8>,DYNERR> {
        let mut ans = Vec::new();
        self.file.seek(SeekFrom::Start(0))?;
        self.file.read_to_end(&mut ans)?;
        Ok(ans)
    }
}
