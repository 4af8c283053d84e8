//! ## Memory backed disk images
//!
//! Holds a headerless block dump in memory.  Nothing is persisted until the caller
//! takes the bytes with `to_bytes`.

use log::trace;
use super::{DiskImage,DiskType,Geometry,Error};
use super::geometry::SECTOR_SIZE;
use crate::{STDRESULT,DYNERR};

pub struct MemImage {
    geometry: Geometry,
    data: Vec<u8>,
    read_only: bool,
    error_info: Option<Vec<u8>>
}

impl MemImage {
    pub fn create(disk_type: DiskType,tracks: u8) -> Result<Self,Error> {
        if disk_type==DiskType::G64 {
            return Err(Error::GcrNotSupported);
        }
        let geometry = Geometry::new(disk_type,tracks)?;
        Ok(Self {
            geometry,
            data: vec![0;geometry.byte_capacity()],
            read_only: false,
            error_info: None
        })
    }
    /// Interpret a byte stream using the same size rules as an image file
    pub fn from_bytes(buf: &[u8]) -> Result<Self,Error> {
        let header_len = usize::min(buf.len(),super::gcr::HEADER_LEN);
        let geometry = super::probe_bytes(buf.len() as u64,&buf[0..header_len])?;
        if geometry.disk_type==DiskType::G64 {
            return Err(Error::GcrNotSupported);
        }
        let capacity = geometry.byte_capacity();
        let error_info = match super::has_error_info(&geometry,buf.len() as u64) {
            true => Some(buf[capacity..].to_vec()),
            false => None
        };
        Ok(Self {
            geometry,
            data: buf[0..capacity].to_vec(),
            read_only: false,
            error_info
        })
    }
    pub fn set_read_only(&mut self,read_only: bool) {
        self.read_only = read_only;
    }
}

impl DiskImage for MemImage {
    fn geometry(&self) -> &Geometry {
        &self.geometry
    }
    fn is_read_only(&self) -> bool {
        self.read_only
    }
    fn read_block(&mut self,track: u8,sector: u8) -> Result<Vec<u8>,DYNERR> {
        trace!("read {},{}",track,sector);
        let offset = self.geometry.block_index(track,sector)? * SECTOR_SIZE;
        Ok(self.data[offset..offset+SECTOR_SIZE].to_vec())
    }
    fn write_block(&mut self,track: u8,sector: u8,dat: &[u8]) -> STDRESULT {
        trace!("write {},{}",track,sector);
        if self.read_only {
            return Err(Box::new(Error::SectorAccess));
        }
        let offset = self.geometry.block_index(track,sector)? * SECTOR_SIZE;
        let n = usize::min(dat.len(),SECTOR_SIZE);
        self.data[offset..offset+n].copy_from_slice(&dat[0..n]);
        for i in offset+n..offset+SECTOR_SIZE {
            self.data[i] = 0;
        }
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
        Ok(())
    }
    fn to_bytes(&mut self) -> Result<Vec<u8>,DYNERR> {
        let mut ans = self.data.clone();
        if let Some(table) = &self.error_info {
            ans.extend_from_slice(table);
        }
        Ok(ans)
    }
}
