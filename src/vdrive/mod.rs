//! # Virtual Drive Module
//!
//! This emulates the file level behavior of a CBM-DOS disk drive on top of a disk image.
//! The bus layer talks to the `Drive` one transaction at a time through the facade
//! `open`, `read`, `write`, `close` and `flush`, each taking a secondary address.
//!
//! * Secondary addresses 0..=14 are data channels, opened with a file name
//! * Secondary address 15 is the command channel, bytes written to it are DOS commands,
//!   bytes read from it are the status text, e.g., `62,FILE NOT FOUND,00,00\r`
//!
//! The drive takes ownership of the image when it is attached.  If the image fails at the
//! I/O level the drive lets go of it and reports `74,DRIVE NOT READY` until a new image
//! is attached.
//!
//! ```text
//! let img = cbmdrive::img::mem::MemImage::create(DiskType::D64,35)?;
//! let mut drive = Drive::attach(Box::new(img),8)?;
//! drive.command("N:SCRATCH,01");
//! assert_eq!(drive.error_string(),"00,OK,00,00\r");
//! ```

pub mod types;
pub mod bam;
pub mod directory;
pub mod names;
mod channel;
mod command;


use std::fmt;
use log::{debug,info,error};
use crate::img::DiskImage;
use bam::Bam;
use channel::ChannelBuffer;
use directory::{DirCursor,DirectorySlot,SlotQuery};
pub use types::{ErrorCode,DosError,Status,FileType};
use types::*;
use crate::{STDRESULT,DYNERR};

/// The sticky status shown on the command channel.
/// Once a failure is recorded it stays until `clear` is called at the start of the
/// next transaction, so a later OK cannot hide it.
#[derive(Debug,Clone,Copy,PartialEq)]
pub struct StickyError {
    pub code: ErrorCode,
    pub track: u8,
    pub sector: u8,
    latched: bool
}

impl StickyError {
    fn new() -> Self {
        Self { code: ErrorCode::Ok, track: 0, sector: 0, latched: false }
    }
    fn clear(&mut self) {
        *self = Self::new();
    }
    /// Record a status, returns false if an earlier failure is holding the record
    fn set(&mut self,code: ErrorCode,track: u8,sector: u8) -> bool {
        if self.latched {
            return false;
        }
        self.code = code;
        self.track = track;
        self.sector = sector;
        self.latched = !code.is_ok();
        true
    }
}

impl fmt::Display for StickyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f,"{:02},{},{:02},{:02}\r",self.code as u8,self.code,self.track,self.sector)
    }
}

/// Image and BAM, present while something is attached
pub(crate) struct Mount {
    img: Box<dyn DiskImage>,
    bam: Bam
}

fn mounted(disk: &mut Option<Mount>) -> Result<&mut Mount,DYNERR> {
    match disk.as_mut() {
        Some(m) => Ok(m),
        None => Err(Box::new(DosError::at(ErrorCode::DriveNotReady,18,0)))
    }
}

/// The primary interface for drive operations.
pub struct Drive {
    unit: u8,
    disk: Option<Mount>,
    channels: Vec<ChannelBuffer>,
    error: StickyError
}

impl Drive {
    /// Attach an image to a new drive with the given unit number.  The drive takes ownership
    /// of the image, and reports the DOS version on the command channel.
    pub fn attach(mut img: Box<dyn DiskImage>,unit: u8) -> Result<Self,DYNERR> {
        img.reload_error_info()?;
        let bam = Bam::load(&mut img)?;
        info!("unit {} attached {} image",unit,img.what_am_i());
        let mut channels: Vec<ChannelBuffer> = (0..CHANNELS).map(|_| ChannelBuffer::new()).collect();
        channels[COMMAND_CHANNEL as usize] = ChannelBuffer::command();
        let mut ans = Self {
            unit,
            disk: Some(Mount { img, bam }),
            channels,
            error: StickyError::new()
        };
        ans.set_error(ErrorCode::DosVersion,0,0);
        Ok(ans)
    }
    /// Close every channel and give up the image.
    pub fn detach(&mut self) -> Option<Box<dyn DiskImage>> {
        if let Err(e) = self.close_all() {
            error!("error closing channels: {}",e);
        }
        let mut ans = self.disk.take()?;
        if let Err(e) = ans.img.sync() {
            error!("error syncing image: {}",e);
        }
        info!("unit {} detached",self.unit);
        Some(ans.img)
    }
    pub fn unit(&self) -> u8 {
        self.unit
    }
    pub fn is_attached(&self) -> bool {
        self.disk.is_some()
    }
    pub fn bam(&self) -> Option<&Bam> {
        self.disk.as_ref().map(|m| &m.bam)
    }
    pub fn image(&mut self) -> Option<&mut Box<dyn DiskImage>> {
        self.disk.as_mut().map(|m| &mut m.img)
    }
    /// The status text as it would be read from the command channel
    pub fn error_string(&self) -> String {
        self.error.to_string()
    }
    pub fn error_code(&self) -> ErrorCode {
        self.error.code
    }
    pub fn error(&self) -> StickyError {
        self.error
    }
    fn render_error(&mut self) {
        let ch = &mut self.channels[COMMAND_CHANNEL as usize];
        let txt = self.error.to_string();
        ch.buf = vec![0;BLOCK_SIZE];
        ch.buf[0..txt.len()].copy_from_slice(txt.as_bytes());
        ch.length = txt.len() - 1;
        ch.ptr = 0;
        ch.access = AccessMode::Read;
    }
    pub(crate) fn set_error(&mut self,code: ErrorCode,track: u8,sector: u8) {
        if !self.error.set(code,track,sector) {
            return;
        }
        if !code.is_ok() && code!=ErrorCode::DosVersion {
            info!("ERR = {:02}, {}, {:02}, {:02}",code as u8,code,track,sector);
        }
        self.render_error();
    }
    pub(crate) fn clear_error(&mut self) {
        self.error.clear();
        self.render_error();
    }
    /// Turn an internal failure into the sticky status.
    /// Anything that is not a DOS status is an image fault, which detaches the image.
    fn absorb(&mut self,e: DYNERR) {
        if let Some(code) = e.downcast_ref::<ErrorCode>() {
            self.set_error(*code,0,0);
        } else if let Some(dos) = e.downcast_ref::<DosError>() {
            self.set_error(dos.code,dos.track,dos.sector);
        } else {
            error!("image fault on unit {}: {}",self.unit,e);
            for (i,ch) in self.channels.iter_mut().enumerate() {
                if i != COMMAND_CHANNEL as usize {
                    ch.release();
                }
            }
            self.disk = None;
            self.set_error(ErrorCode::DriveNotReady,0,0);
        }
    }
    fn status_of(&mut self,res: Result<Status,DYNERR>) -> Status {
        match res {
            Ok(status) => status,
            Err(e) => {
                self.absorb(e);
                Status::Error
            }
        }
    }
    /// Close every data channel, finishing files that are open for writing
    pub(crate) fn close_all(&mut self) -> STDRESULT {
        let mut ans: STDRESULT = Ok(());
        for i in 0..CHANNELS {
            if i == COMMAND_CHANNEL as usize || self.channels[i].mode==ChannelMode::NotInUse {
                continue;
            }
            if let Err(e) = self.close_file(i) {
                if ans.is_ok() {
                    ans = Err(e);
                }
            }
            self.channels[i].release();
        }
        ans
    }
    /// Open a channel.  On the command channel the name is executed as a command
    /// once the bus layer calls `flush`.
    pub fn open(&mut self,name: &[u8],secondary: u8) -> Status {
        let idx = (secondary & 0x0f) as usize;
        debug!("open channel {} with name {}",idx,crate::escaped_ascii_from_bytes(name));
        if self.channels[idx].mode==ChannelMode::CommandChannel {
            let mut status = Status::Ok;
            for b in name {
                status = self.write(secondary,*b);
            }
            self.channels[idx].access = match name.len() {
                0 => AccessMode::Read,
                _ => AccessMode::Write
            };
            return status;
        }
        if name.len()==0 {
            return Status::Error;
        }
        if self.disk.is_none() && name[0]!=b'#' {
            self.set_error(ErrorCode::DriveNotReady,18,0);
            return Status::Error;
        }
        self.clear_error();
        let res = self.open_file(name,idx);
        self.status_of(res)
    }
    /// Read one byte.  With `Status::Eof` the byte is a filler and should be ignored.
    pub fn read(&mut self,secondary: u8) -> (u8,Status) {
        let idx = (secondary & 0x0f) as usize;
        if self.channels[idx].mode==ChannelMode::CommandChannel {
            if self.channels[idx].ptr > self.channels[idx].length {
                self.clear_error();
                return (EOF_BYTE,Status::Eof);
            }
            let ch = &mut self.channels[idx];
            ch.ptr += 1;
            return (ch.buf[ch.ptr-1],Status::Ok);
        }
        match self.read_file(idx) {
            Ok(ans) => ans,
            Err(e) => {
                self.absorb(e);
                (EOF_BYTE,Status::Error)
            }
        }
    }
    /// Write one byte.  On the command channel bytes accumulate until `flush`.
    pub fn write(&mut self,secondary: u8,byte: u8) -> Status {
        let idx = (secondary & 0x0f) as usize;
        if self.channels[idx].mode==ChannelMode::CommandChannel {
            let ch = &mut self.channels[idx];
            if ch.access==AccessMode::Read {
                ch.ptr = 0;
                ch.access = AccessMode::Write;
            }
            if ch.ptr >= BLOCK_SIZE {
                return Status::Error;
            }
            ch.buf[ch.ptr] = byte;
            ch.ptr += 1;
            return Status::Ok;
        }
        let res = self.write_file(idx,byte);
        self.status_of(res)
    }
    /// Close a channel.  Closing the command channel closes every channel.
    pub fn close(&mut self,secondary: u8) -> Status {
        let idx = (secondary & 0x0f) as usize;
        if self.channels[idx].mode==ChannelMode::CommandChannel {
            self.clear_error();
            let res = self.close_all().map(|_| Status::Ok);
            return self.status_of(res);
        }
        let res = self.close_file(idx).map(|_| Status::Ok);
        let ans = self.status_of(res);
        self.channels[idx].release();
        ans
    }
    /// Execute whatever has been written to the command channel
    pub fn flush(&mut self,secondary: u8) {
        let idx = (secondary & 0x0f) as usize;
        let ch = &mut self.channels[idx];
        if ch.mode!=ChannelMode::CommandChannel || ch.access==AccessMode::Read || ch.ptr==0 {
            return;
        }
        let cmd = ch.buf[0..ch.ptr].to_vec();
        ch.ptr = 0;
        self.execute(&cmd);
    }
    /// Send a command as the bus layer would, and return the resulting status code
    pub fn command(&mut self,cmd: &str) -> ErrorCode {
        self.command_bytes(cmd.as_bytes())
    }
    /// Same as `command`, for commands that carry binary parameters
    pub fn command_bytes(&mut self,cmd: &[u8]) -> ErrorCode {
        self.open(cmd,COMMAND_CHANNEL);
        self.flush(COMMAND_CHANNEL);
        self.error.code
    }
    /// Every used directory slot, in directory order
    pub fn entries(&mut self) -> Result<Vec<DirectorySlot>,DYNERR> {
        let disk = mounted(&mut self.disk)?;
        let mut cursor = DirCursor::find_first(&mut disk.img,SlotQuery::named(b"*",None))?;
        let mut ans = Vec::new();
        while let Some(slot) = cursor.find_next(&mut disk.img,&mut disk.bam)? {
            ans.push(slot);
        }
        Ok(ans)
    }
}
