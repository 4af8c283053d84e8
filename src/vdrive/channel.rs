//! ## Channel Buffer Manager
//!
//! Each of the 16 channels carries its own 256 byte buffer and cursor.
//! Sequential files are streamed through the buffer one block at a time, with the
//! first two bytes of every block holding the chain link.

use log::{trace,debug,warn};
use crate::img::DiskImage;
use super::bam::Bam;
use super::directory::{self,DirCursor,DirectorySlot,SlotPosition,SlotQuery};
use super::names::parse_name;
use super::types::*;
use super::{Drive,mounted};
use crate::{STDRESULT,DYNERR};

/// State of one channel
pub struct ChannelBuffer {
    pub mode: ChannelMode,
    pub access: AccessMode,
    pub buf: Vec<u8>,
    pub ptr: usize,
    /// bytes in a listing, or index of the last byte on the command channel
    pub length: usize,
    /// block currently held in the buffer, for sequential files
    pub track: u8,
    pub sector: u8,
    /// directory entry of a file being written
    pub slot: Option<DirectorySlot>,
    /// where that entry sits in the directory, claimed at open
    pub entry: Option<SlotPosition>
}

impl ChannelBuffer {
    pub fn new() -> Self {
        Self {
            mode: ChannelMode::NotInUse,
            access: AccessMode::Read,
            buf: Vec::new(),
            ptr: 0,
            length: 0,
            track: 0,
            sector: 0,
            slot: None,
            entry: None
        }
    }
    pub fn command() -> Self {
        Self {
            mode: ChannelMode::CommandChannel,
            buf: vec![0;BLOCK_SIZE],
            ..Self::new()
        }
    }
    /// Back to `NotInUse`, the command channel is never released
    pub fn release(&mut self) {
        if self.mode != ChannelMode::CommandChannel {
            *self = Self::new();
        }
    }
    fn writing(&self) -> bool {
        self.access==AccessMode::Write || self.access==AccessMode::Append
    }
}

/// How a sequential buffer is flushed to the chain
enum Flush {
    /// buffer is full, the chain continues
    Full,
    /// final block, `usize` bytes are valid including the link
    Last(usize)
}

/// Read a block that is to be interpreted as file data.
/// Blocks marked bad in the error-info table produce the matching DOS error.
pub fn read_data_block(img: &mut Box<dyn DiskImage>,track: u8,sector: u8) -> Result<Vec<u8>,DYNERR> {
    if !img.geometry().check_sector(track,sector) {
        return Err(Box::new(DosError::at(ErrorCode::IllegalTrackOrSector,track,sector)));
    }
    if let Some(info) = img.error_info(track,sector) {
        let code = ErrorCode::from_error_info(info);
        if !code.is_ok() {
            debug!("error info {} at {},{}",info,track,sector);
            return Err(Box::new(DosError::at(code,track,sector)));
        }
    }
    img.read_block(track,sector)
}

/// Write the channel buffer into the file's chain, claiming blocks as needed.
/// The slot's block count goes up by one for every block written.
fn write_sequential_buffer(ch: &mut ChannelBuffer,img: &mut Box<dyn DiskImage>,bam: &mut Bam,flush: Flush) -> STDRESULT {
    let slot = match ch.slot.as_mut() {
        Some(s) => s,
        None => return Err(Box::new(ErrorCode::FileNotOpen))
    };
    if slot.first.0 == 0 {
        let (t,s) = bam.alloc_first_free_sector()?;
        slot.first = (t,s);
        ch.track = t;
        ch.sector = s;
    }
    match flush {
        Flush::Full => {
            let (t,s) = bam.alloc_next_free_sector(ch.track,ch.sector)?;
            ch.buf[0..2].copy_from_slice(&SectorLink::Next(t,s).to_bytes());
            img.write_block(ch.track,ch.sector,&ch.buf)?;
            trace!("chain {},{} -> {},{}",ch.track,ch.sector,t,s);
            ch.track = t;
            ch.sector = s;
        },
        Flush::Last(len) => {
            let last = usize::max(len,1) - 1;
            ch.buf[0..2].copy_from_slice(&SectorLink::Last(last as u8).to_bytes());
            img.write_block(ch.track,ch.sector,&ch.buf)?;
        }
    }
    slot.blocks = slot.blocks.wrapping_add(1);
    Ok(())
}

impl Drive {
    /// Start reading a chain of data blocks at (track,sector)
    fn open_sequential_read(&mut self,idx: usize,track: u8,sector: u8) -> Result<Status,DYNERR> {
        let disk = mounted(&mut self.disk)?;
        let buf = read_data_block(&mut disk.img,track,sector)?;
        let ch = &mut self.channels[idx];
        ch.mode = ChannelMode::Sequential;
        ch.access = AccessMode::Read;
        ch.buf = buf;
        ch.ptr = 2;
        ch.track = track;
        ch.sector = sector;
        Ok(Status::Ok)
    }
    /// Open a data channel (not the command channel).  The sticky error has been cleared.
    pub(super) fn open_file(&mut self,name: &[u8],idx: usize) -> Result<Status,DYNERR> {
        if self.channels[idx].mode != ChannelMode::NotInUse {
            debug!("channel {} is busy",idx);
            return Err(Box::new(ErrorCode::NoChannel));
        }
        let parsed = match parse_name(name) {
            Ok(p) => p,
            Err(code) => return Err(Box::new(code))
        };
        let mut access = parsed.access.unwrap_or(match idx {
            1 => AccessMode::Write,
            _ => AccessMode::Read
        });
        match idx {
            0 => access = AccessMode::Read,
            1 => access = AccessMode::Write,
            _ => {}
        }
        let mut realname = parsed.name;
        realname.truncate(MAX_NAME_LEN);

        if name[0]==b'#' {
            let ch = &mut self.channels[idx];
            ch.mode = ChannelMode::MemoryBuffer;
            ch.buf = vec![0;BLOCK_SIZE];
            ch.ptr = 0;
            return Ok(Status::Ok);
        }

        if name[0]==b'$' {
            if idx > 0 {
                let disk = mounted(&mut self.disk)?;
                let dir_track = disk.img.geometry().dir_track;
                return self.open_sequential_read(idx,dir_track,0);
            }
            let disk = mounted(&mut self.disk)?;
            let listing = directory::create_listing(&mut disk.img,&mut disk.bam,&realname,parsed.ftype)?;
            let ch = &mut self.channels[idx];
            ch.mode = ChannelMode::DirectoryRead;
            ch.length = listing.len();
            ch.buf = listing;
            ch.ptr = 0;
            return Ok(Status::Ok);
        }

        let ftype = parsed.ftype.unwrap_or(match idx {
            0 | 1 => FileType::Prg,
            _ => FileType::Seq
        });
        if ftype==FileType::Rel {
            return Err(Box::new(ErrorCode::FileTypeMismatch));
        }
        let disk = mounted(&mut self.disk)?;
        let mut cursor = DirCursor::find_first(&mut disk.img,SlotQuery::named(&realname,None))?;
        let mut found: Option<DirectorySlot> = None;
        while let Some(slot) = cursor.find_next(&mut disk.img,&mut disk.bam)? {
            if slot.file_type() != FileType::Del {
                found = Some(slot);
                break;
            }
        }
        let found_at = cursor.position();
        debug!("open {} for {:?} on channel {}",String::from_utf8_lossy(&realname),access,idx);

        match access {
            AccessMode::Read => {
                let slot = match found {
                    Some(s) => s,
                    None => return Err(Box::new(ErrorCode::FileNotFound))
                };
                if slot.file_type()==FileType::Rel {
                    return Err(Box::new(ErrorCode::FileTypeMismatch));
                }
                if !slot.is_closed() {
                    return Err(Box::new(ErrorCode::WriteFileOpen));
                }
                self.open_sequential_read(idx,slot.first.0,slot.first.1)
            },
            AccessMode::Append => {
                if disk.img.is_read_only() {
                    return Err(Box::new(ErrorCode::WriteProtectOn));
                }
                let mut slot = match found {
                    Some(s) if s.file_type()==FileType::Seq && s.is_closed() => s,
                    _ => return Err(Box::new(ErrorCode::FileNotFound))
                };
                let pos = match found_at {
                    Some(p) => p,
                    None => return Err(Box::new(ErrorCode::FileNotFound))
                };
                let ch = &mut self.channels[idx];
                ch.buf = vec![0;BLOCK_SIZE];
                ch.ptr = 2;
                if slot.first.0 != 0 {
                    // find the end of the chain
                    let (mut t,mut s) = slot.first;
                    let mut count = 0;
                    loop {
                        let buf = read_data_block(&mut disk.img,t,s)?;
                        count += 1;
                        match SectorLink::from_bytes(&buf) {
                            SectorLink::Next(nt,ns) if count < disk.img.geometry().total_blocks() => {
                                t = nt;
                                s = ns;
                            },
                            SectorLink::Next(_,_) => {
                                warn!("chain of {} does not end",String::from_utf8_lossy(&realname));
                                return Err(Box::new(DosError::at(ErrorCode::IllegalTrackOrSector,t,s)));
                            },
                            SectorLink::Last(n) => {
                                ch.ptr = usize::max(n as usize + 1,2);
                                ch.buf = buf;
                                break;
                            }
                        }
                    }
                    ch.track = t;
                    ch.sector = s;
                    slot.blocks = slot.blocks.saturating_sub(1);
                }
                // unclosed until the channel is closed
                slot.type_byte &= !CLOSED;
                directory::write_slot(&mut disk.img,pos,&slot)?;
                ch.mode = ChannelMode::Sequential;
                ch.access = AccessMode::Append;
                ch.slot = Some(slot);
                ch.entry = Some(pos);
                Ok(Status::Ok)
            },
            AccessMode::Write => {
                if disk.img.is_read_only() {
                    return Err(Box::new(ErrorCode::WriteProtectOn));
                }
                if let Some(slot) = found {
                    if name[0]==b'@' {
                        debug!("replacing {}",String::from_utf8_lossy(&realname));
                        directory::remove_slot(&mut disk.img,&mut disk.bam,&slot)?;
                    } else {
                        return Err(Box::new(ErrorCode::FileExists));
                    }
                }
                let slot = DirectorySlot::new(&realname,ftype);
                let mut cursor = DirCursor::find_first(&mut disk.img,SlotQuery::Empty)?;
                if cursor.find_next(&mut disk.img,&mut disk.bam)?.is_none() {
                    debug!("no room in the directory for {}",String::from_utf8_lossy(&realname));
                    return Err(Box::new(ErrorCode::DiskFull));
                }
                cursor.update(&mut disk.img,&slot)?;
                // the directory may have grown
                disk.bam.store(&mut disk.img)?;
                let ch = &mut self.channels[idx];
                ch.mode = ChannelMode::Sequential;
                ch.access = AccessMode::Write;
                ch.buf = vec![0;BLOCK_SIZE];
                ch.ptr = 2;
                ch.track = 0;
                ch.sector = 0;
                ch.slot = Some(slot);
                ch.entry = cursor.position();
                Ok(Status::Ok)
            }
        }
    }
    /// Read a byte from a data channel
    pub(super) fn read_file(&mut self,idx: usize) -> Result<(u8,Status),DYNERR> {
        let ch = &mut self.channels[idx];
        match ch.mode {
            ChannelMode::NotInUse => Err(Box::new(ErrorCode::FileNotOpen)),
            ChannelMode::DirectoryRead => {
                if ch.ptr >= ch.length {
                    return Ok((EOF_BYTE,Status::Eof));
                }
                ch.ptr += 1;
                Ok((ch.buf[ch.ptr-1],Status::Ok))
            },
            ChannelMode::MemoryBuffer => {
                if ch.ptr >= BLOCK_SIZE {
                    return Ok((EOF_BYTE,Status::Eof));
                }
                ch.ptr += 1;
                Ok((ch.buf[ch.ptr-1],Status::Ok))
            },
            ChannelMode::Sequential => {
                if ch.access != AccessMode::Read {
                    return Ok((EOF_BYTE,Status::Error));
                }
                match SectorLink::from_bytes(&ch.buf) {
                    SectorLink::Next(t,s) => {
                        if ch.ptr >= BLOCK_SIZE {
                            let disk = mounted(&mut self.disk)?;
                            ch.buf = read_data_block(&mut disk.img,t,s)?;
                            ch.track = t;
                            ch.sector = s;
                            ch.ptr = 2;
                        }
                    },
                    SectorLink::Last(n) => {
                        if ch.ptr > n as usize {
                            return Ok((EOF_BYTE,Status::Eof));
                        }
                    }
                }
                ch.ptr += 1;
                Ok((ch.buf[ch.ptr-1],Status::Ok))
            },
            // handled by the facade
            ChannelMode::CommandChannel => Ok((EOF_BYTE,Status::Error))
        }
    }
    /// Write a byte to a data channel
    pub(super) fn write_file(&mut self,idx: usize,byte: u8) -> Result<Status,DYNERR> {
        let disk = mounted(&mut self.disk)?;
        if disk.img.is_read_only() {
            return Err(Box::new(ErrorCode::WriteProtectOn));
        }
        let ch = &mut self.channels[idx];
        match ch.mode {
            ChannelMode::NotInUse => Err(Box::new(ErrorCode::FileNotOpen)),
            ChannelMode::DirectoryRead => Err(Box::new(ErrorCode::WriteFileOpen)),
            ChannelMode::MemoryBuffer => {
                if ch.ptr >= BLOCK_SIZE {
                    return Ok(Status::Error);
                }
                ch.buf[ch.ptr] = byte;
                ch.ptr += 1;
                Ok(Status::Ok)
            },
            ChannelMode::Sequential => {
                if !ch.writing() {
                    return Ok(Status::Error);
                }
                if ch.ptr >= BLOCK_SIZE {
                    write_sequential_buffer(ch,&mut disk.img,&mut disk.bam,Flush::Full)?;
                    ch.ptr = 2;
                }
                ch.buf[ch.ptr] = byte;
                ch.ptr += 1;
                Ok(Status::Ok)
            },
            ChannelMode::CommandChannel => Ok(Status::Error)
        }
    }
    /// Finish a data channel.  Files being written get their last block, directory entry and BAM
    /// written out.  The caller releases the channel.
    pub(super) fn close_file(&mut self,idx: usize) -> STDRESULT {
        let ch = &mut self.channels[idx];
        if ch.mode != ChannelMode::Sequential || !ch.writing() {
            return Ok(());
        }
        let disk = mounted(&mut self.disk)?;
        if disk.img.is_read_only() {
            return Err(Box::new(ErrorCode::WriteProtectOn));
        }
        let len = ch.ptr;
        write_sequential_buffer(ch,&mut disk.img,&mut disk.bam,Flush::Last(len))?;
        let mut slot = match ch.slot.take() {
            Some(s) => s,
            None => return Err(Box::new(ErrorCode::FileNotOpen))
        };
        let pos = match ch.entry.take() {
            Some(p) => p,
            None => return Err(Box::new(ErrorCode::FileNotOpen))
        };
        slot.type_byte |= CLOSED;
        debug!("closing {} with {} blocks",String::from_utf8_lossy(&slot.short_name()),slot.blocks);
        directory::write_slot(&mut disk.img,pos,&slot)?;
        disk.bam.store(&mut disk.img)?;
        Ok(())
    }
    /// Give up on a file being written: the data so far is kept, but the directory entry
    /// is left unclosed, as happens when the disk fills up during a copy.
    pub(super) fn abandon_file(&mut self,idx: usize) -> STDRESULT {
        let ch = &mut self.channels[idx];
        if ch.mode != ChannelMode::Sequential || !ch.writing() {
            ch.release();
            return Ok(());
        }
        let disk = mounted(&mut self.disk)?;
        let mut slot = match ch.slot.take() {
            Some(s) => s,
            None => return Ok(())
        };
        if slot.first.0 != 0 {
            let last = usize::max(ch.ptr,1) - 1;
            ch.buf[0..2].copy_from_slice(&SectorLink::Last(last as u8).to_bytes());
            disk.img.write_block(ch.track,ch.sector,&ch.buf)?;
            slot.blocks = slot.blocks.wrapping_add(1);
        }
        slot.type_byte &= !CLOSED;
        if let Some(pos) = ch.entry.take() {
            directory::write_slot(&mut disk.img,pos,&slot)?;
        }
        disk.bam.store(&mut disk.img)?;
        ch.release();
        Ok(())
    }
}
