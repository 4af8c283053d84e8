//! ## Command Interpreter
//!
//! Commands arrive as the bytes written to channel 15.  The first letter selects the
//! command, the operand usually follows a colon.  Every command ends with exactly one
//! status being recorded, unless an earlier status in the same command is holding the
//! error channel.

use log::{debug,warn};
use crate::img::DosFormat;
use super::bam::Bam;
use super::channel::read_data_block;
use super::directory::{self,DirCursor,SlotQuery};
use super::names::parse_name;
use super::types::*;
use super::{Drive,mounted};
use crate::{STDRESULT,DYNERR};

/// Is this a DOS status, as opposed to an image fault
fn is_dos_error(e: &DYNERR) -> bool {
    e.downcast_ref::<ErrorCode>().is_some() || e.downcast_ref::<DosError>().is_some()
}

/// The part after the first colon, or all of it
fn after_colon(s: &[u8]) -> &[u8] {
    match s.iter().position(|c| *c==b':') {
        Some(i) => &s[i+1..],
        None => s
    }
}

/// Up to 4 decimal numbers separated by any of ` ),#`.
/// Alphanumeric text after a 4th number is a syntax error.
pub fn block_parameters(args: &[u8]) -> Result<Vec<usize>,ErrorCode> {
    let mut ans = Vec::new();
    let mut i = 0;
    for _ in 0..4 {
        while i < args.len() && [b' ',b')',b',',b'#'].contains(&args[i]) {
            i += 1;
        }
        if i >= args.len() || args[i]==0 {
            break;
        }
        let mut val: usize = 0;
        while i < args.len() && args[i].is_ascii_digit() {
            val = val.saturating_mul(10).saturating_add((args[i] - b'0') as usize);
            i += 1;
        }
        ans.push(val);
    }
    if ans.len()==4 && i < args.len() && args[i].is_ascii_alphanumeric() {
        return Err(ErrorCode::Syntax);
    }
    Ok(ans)
}

/// Check that parameters name a real block, converting to (track,sector)
fn block_address(img_tracks: &crate::img::Geometry,track: usize,sector: usize) -> Result<(u8,u8),DYNERR> {
    if track > 255 || sector > 255 || !img_tracks.check_sector(track as u8,sector as u8) {
        return Err(Box::new(DosError::at(ErrorCode::IllegalTrackOrSector,
            u8::try_from(track).unwrap_or(255),u8::try_from(sector).unwrap_or(255))));
    }
    Ok((track as u8,sector as u8))
}

impl Drive {
    /// Execute one command and record its status
    pub(super) fn execute(&mut self,cmd: &[u8]) -> ErrorCode {
        self.clear_error();
        match self.dispatch(cmd) {
            Ok(code) => self.set_error(code,0,0),
            Err(e) => self.absorb(e)
        }
        self.error.code
    }
    fn dispatch(&mut self,raw: &[u8]) -> Result<ErrorCode,DYNERR> {
        if raw.len()==0 {
            return Ok(ErrorCode::Ok);
        }
        if raw.len() > MAX_COMMAND_LEN {
            return Ok(ErrorCode::LineTooLong);
        }
        let p = match raw.last() {
            Some(0x0d) => &raw[0..raw.len()-1],
            _ => raw
        };
        if p.len()==0 {
            return Ok(ErrorCode::Ok);
        }
        debug!("command {}",crate::escaped_ascii_from_bytes(p));
        let colon = p.iter().position(|c| *c==b':');
        let minus = p.iter().position(|c| *c==b'-');
        let name = colon.map(|i| &p[i..]);
        let ans = match p[0] {
            b'C' => self.copy(name)?,
            b'D' => ErrorCode::InvalidCommand,
            b'R' => self.rename(name)?,
            b'S' => self.scratch(name)?,
            b'I' => self.initialize()?,
            b'N' => match name {
                Some(n) => self.format(&n[1..])?,
                None => ErrorCode::Syntax
            },
            b'V' => self.validate()?,
            b'B' => match minus {
                Some(m) if m+1 < p.len() => {
                    let args = match colon {
                        Some(i) => &p[i+1..],
                        None => &p[usize::min(3,p.len())..]
                    };
                    self.block(p[m+1],args)?
                },
                _ => ErrorCode::InvalidCommand
            },
            b'M' => match minus {
                Some(_) => ErrorCode::Unimplemented,
                None => ErrorCode::InvalidCommand
            },
            b'P' => self.position(p),
            b'U' => self.user(p,colon)?,
            _ => ErrorCode::InvalidCommand
        };
        if ans==ErrorCode::InvalidCommand {
            warn!("invalid command {}",crate::escaped_ascii_from_bytes(p));
        }
        Ok(ans)
    }
    /// `I`: close the data channels and reload the BAM and error table
    fn initialize(&mut self) -> Result<ErrorCode,DYNERR> {
        self.close_all()?;
        let disk = mounted(&mut self.disk)?;
        disk.bam = Bam::load(&mut disk.img)?;
        disk.img.reload_error_info()?;
        Ok(ErrorCode::Ok)
    }
    /// `V`: rebuild the BAM from the directory.  Unclosed files are deleted.
    /// If a chain is broken the BAM is put back the way it was.
    pub(super) fn validate(&mut self) -> Result<ErrorCode,DYNERR> {
        self.initialize()?;
        let disk = mounted(&mut self.disk)?;
        if disk.img.is_read_only() {
            return Ok(ErrorCode::WriteProtectOn);
        }
        let geometry = *disk.img.geometry();
        let snapshot = disk.bam.clone();
        disk.bam.clear_all();
        disk.bam.free_all();
        if let Err(e) = directory::allocate_chain(&mut disk.img,&mut disk.bam,geometry.bam_track,geometry.bam_sector) {
            disk.bam = snapshot;
            return Err(e);
        }
        match geometry.format {
            DosFormat::Cbm1571 => {
                for s in 0..geometry.sectors_in_track(geometry.dir_track+35) {
                    disk.bam.allocate_sector(geometry.dir_track+35,s as u8);
                }
            },
            DosFormat::Cbm1581 => {
                disk.bam.allocate_sector(geometry.bam_track,geometry.bam_sector+1);
                disk.bam.allocate_sector(geometry.bam_track,geometry.bam_sector+2);
            },
            _ => {}
        }
        let mut cursor = DirCursor::find_first(&mut disk.img,SlotQuery::named(b"*",None))?;
        while let Some(slot) = cursor.find_next(&mut disk.img,&mut disk.bam)? {
            if !slot.is_closed() {
                continue;
            }
            // side sectors are always walked, whatever the file type
            for (t,s) in [slot.first,slot.side] {
                if let Err(e) = directory::allocate_chain(&mut disk.img,&mut disk.bam,t,s) {
                    disk.bam = snapshot;
                    return Err(e);
                }
            }
        }
        // nothing is written until every chain checks out
        let mut cursor = DirCursor::find_first(&mut disk.img,SlotQuery::named(b"*",None))?;
        while let Some(mut slot) = cursor.find_next(&mut disk.img,&mut disk.bam)? {
            if !slot.is_closed() {
                debug!("validate removes unclosed {}",String::from_utf8_lossy(&slot.short_name()));
                slot.type_byte = 0;
                cursor.update(&mut disk.img,&slot)?;
            }
        }
        disk.bam.store(&mut disk.img)?;
        Ok(ErrorCode::Ok)
    }
    /// `N:name,id`: write an empty directory and BAM, then validate
    fn format(&mut self,arg: &[u8]) -> Result<ErrorCode,DYNERR> {
        let disk = mounted(&mut self.disk)?;
        if disk.img.is_read_only() {
            return Ok(ErrorCode::WriteProtectOn);
        }
        let (name,id): (Vec<u8>,[u8;2]) = match arg.iter().position(|c| *c==b',') {
            Some(i) => {
                let name = match i {
                    0 => vec![b' '],
                    _ => arg[0..i].to_vec()
                };
                let id = match (arg.get(i+1),arg.get(i+2)) {
                    (Some(a),Some(b)) => [*a,*b],
                    (Some(a),None) => [*a,b' '],
                    _ => [b' ',b' ']
                };
                (name,id)
            },
            None => (arg.to_vec(),[b' ',b' '])
        };
        // files open on the old directory are dropped, not closed
        for (i,ch) in self.channels.iter_mut().enumerate() {
            if i != COMMAND_CHANNEL as usize {
                ch.release();
            }
        }
        let geometry = *disk.img.geometry();
        debug!("format {} as {}",disk.img.what_am_i(),String::from_utf8_lossy(&name));
        let mut dir = vec![0;BLOCK_SIZE];
        dir[1] = 0xff;
        disk.img.write_block(geometry.dir_track,geometry.dir_sector,&dir)?;
        disk.bam = Bam::create_empty(&geometry,&name,id);
        disk.bam.store(&mut disk.img)?;
        self.validate()
    }
    /// `S:pattern`: remove every matching file
    fn scratch(&mut self,name: Option<&[u8]>) -> Result<ErrorCode,DYNERR> {
        let parsed = match name.map(parse_name) {
            Some(Ok(p)) => p,
            _ => return Ok(ErrorCode::NoFileName)
        };
        let disk = mounted(&mut self.disk)?;
        if disk.img.is_read_only() {
            return Ok(ErrorCode::WriteProtectOn);
        }
        let mut count: usize = 0;
        loop {
            // removing a slot restarts the search
            let mut cursor = DirCursor::find_first(&mut disk.img,SlotQuery::named(&parsed.name,parsed.ftype))?;
            match cursor.find_next(&mut disk.img,&mut disk.bam)? {
                Some(slot) => directory::remove_slot(&mut disk.img,&mut disk.bam,&slot)?,
                None => break
            }
            count += 1;
        }
        debug!("scratched {} files",count);
        if count > 0 {
            self.set_error(ErrorCode::FilesScratched,u8::try_from(count).unwrap_or(255),0);
            return Ok(ErrorCode::FilesScratched);
        }
        Ok(ErrorCode::FileNotFound)
    }
    /// `R:new=old`
    fn rename(&mut self,name: Option<&[u8]>) -> Result<ErrorCode,DYNERR> {
        let n = match name {
            Some(n) => n,
            None => return Ok(ErrorCode::Syntax)
        };
        let eq = match n.iter().position(|c| *c==b'=') {
            Some(i) => i,
            None => return Ok(ErrorCode::Syntax)
        };
        let (dst,src) = match (parse_name(&n[0..eq]),parse_name(&n[eq+1..])) {
            (Ok(d),Ok(s)) => (d,s),
            _ => return Ok(ErrorCode::Syntax)
        };
        let disk = mounted(&mut self.disk)?;
        if disk.img.is_read_only() {
            return Ok(ErrorCode::WriteProtectOn);
        }
        let mut cursor = DirCursor::find_first(&mut disk.img,SlotQuery::named(&dst.name,dst.ftype))?;
        if cursor.find_next(&mut disk.img,&mut disk.bam)?.is_some() {
            return Ok(ErrorCode::FileExists);
        }
        let mut cursor = DirCursor::find_first(&mut disk.img,SlotQuery::named(&src.name,src.ftype))?;
        let mut slot = match cursor.find_next(&mut disk.img,&mut disk.bam)? {
            Some(s) => s,
            None => return Ok(ErrorCode::FileNotFound)
        };
        slot.set_name(&dst.name[0..usize::min(dst.name.len(),MAX_NAME_LEN)]);
        if let Some(ftype) = dst.ftype {
            slot.set_file_type(ftype);
        }
        cursor.update(&mut disk.img,&slot)?;
        Ok(ErrorCode::Ok)
    }
    /// `C:dest=src1,src2,...`: concatenate files into a new file.
    /// Channels 0 and 1 are used for the transfer.
    fn copy(&mut self,name: Option<&[u8]>) -> Result<ErrorCode,DYNERR> {
        let n = match name {
            Some(n) => n,
            None => return Ok(ErrorCode::Syntax)
        };
        let eq = match n.iter().position(|c| *c==b'=') {
            Some(i) => i,
            None => return Ok(ErrorCode::Syntax)
        };
        let dest = after_colon(&n[0..eq]);
        match self.open_file(dest,1) {
            Ok(Status::Ok) => {},
            Ok(_) => return Ok(ErrorCode::FileExists),
            Err(e) => return Err(e)
        }
        for src in n[eq+1..].split(|c| *c==b',') {
            let src = after_colon(src);
            if src.len()==0 {
                break;
            }
            match self.open_file(src,0) {
                Ok(Status::Ok) => {},
                Ok(_) => {
                    self.close_channel_quietly(1)?;
                    return Ok(ErrorCode::FileNotFound);
                },
                Err(e) if is_dos_error(&e) => {
                    self.close_channel_quietly(1)?;
                    return Ok(ErrorCode::FileNotFound);
                },
                Err(e) => return Err(e)
            }
            loop {
                let (byte,status) = match self.read_file(0) {
                    Ok(ans) => ans,
                    Err(e) if is_dos_error(&e) => {
                        self.channels[0].release();
                        self.abandon_file(1)?;
                        return Err(e);
                    },
                    Err(e) => return Err(e)
                };
                if status != Status::Ok {
                    break;
                }
                let res = self.write_file(1,byte);
                match res {
                    Ok(Status::Ok) => {},
                    Err(e) if !is_dos_error(&e) => return Err(e),
                    _ => {
                        self.channels[0].release();
                        self.abandon_file(1)?;
                        return Ok(ErrorCode::DiskFull);
                    }
                }
            }
            self.channels[0].release();
        }
        self.close_file(1)?;
        self.channels[1].release();
        Ok(ErrorCode::Ok)
    }
    fn close_channel_quietly(&mut self,idx: usize) -> STDRESULT {
        let ans = self.close_file(idx);
        self.channels[idx].release();
        match ans {
            Err(e) if !is_dos_error(&e) => Err(e),
            _ => Ok(())
        }
    }
    /// `B-R`,`B-W`,`B-A`,`B-F`,`B-P`
    fn block(&mut self,cmd: u8,args: &[u8]) -> Result<ErrorCode,DYNERR> {
        let params = match block_parameters(args) {
            Ok(p) => p,
            Err(code) => return Ok(code)
        };
        let arg = |i: usize| params.get(i).copied().unwrap_or(0);
        match cmd {
            b'R' | b'W' => {
                if params.len()==0 {
                    return Ok(ErrorCode::Syntax);
                }
                let idx = arg(0);
                if idx >= CHANNELS || self.channels[idx].mode != ChannelMode::MemoryBuffer {
                    return Ok(ErrorCode::NoChannel);
                }
                let disk = mounted(&mut self.disk)?;
                let (t,s) = block_address(disk.img.geometry(),arg(2),arg(3))?;
                let ch = &mut self.channels[idx];
                if cmd==b'W' {
                    if disk.img.is_read_only() {
                        return Ok(ErrorCode::WriteProtectOn);
                    }
                    disk.img.write_block(t,s,&ch.buf)?;
                } else {
                    ch.buf = read_data_block(&mut disk.img,t,s)?;
                }
                ch.ptr = 0;
                Ok(ErrorCode::Ok)
            },
            b'A' | b'F' => {
                if params.len() < 3 {
                    return Ok(ErrorCode::Syntax);
                }
                let disk = mounted(&mut self.disk)?;
                if disk.img.is_read_only() {
                    return Ok(ErrorCode::WriteProtectOn);
                }
                let (t,s) = block_address(disk.img.geometry(),arg(1),arg(2))?;
                if cmd==b'A' {
                    if !disk.bam.allocate_sector(t,s) {
                        // only suggest the next free block, do not take it
                        let (st,ss) = match disk.bam.alloc_next_free_sector(t,s) {
                            Ok((st,ss)) => {
                                disk.bam.free_sector(st,ss);
                                (st,ss)
                            },
                            Err(_) => (0,0)
                        };
                        return Err(Box::new(DosError::at(ErrorCode::NoBlock,st,ss)));
                    }
                } else {
                    disk.bam.free_sector(t,s);
                }
                disk.bam.store(&mut disk.img)?;
                Ok(ErrorCode::Ok)
            },
            b'P' => {
                if params.len() < 2 {
                    return Ok(ErrorCode::Syntax);
                }
                let idx = arg(0);
                if idx >= CHANNELS || self.channels[idx].mode != ChannelMode::MemoryBuffer {
                    return Ok(ErrorCode::NoChannel);
                }
                self.channels[idx].ptr = arg(1);
                Ok(ErrorCode::Ok)
            },
            _ => Ok(ErrorCode::InvalidCommand)
        }
    }
    /// `P`: there are no relative file channels, so a well formed request has no channel
    fn position(&self,p: &[u8]) -> ErrorCode {
        match p.len() {
            l if l < 5 => ErrorCode::RecordNotPresent,
            _ => ErrorCode::NoChannel
        }
    }
    /// `U0`..`UP`
    fn user(&mut self,p: &[u8],colon: Option<usize>) -> Result<ErrorCode,DYNERR> {
        let c = p.get(1).copied().unwrap_or(0);
        if c==b'0' {
            return Ok(ErrorCode::Ok);
        }
        let args = match colon {
            Some(i) => &p[i+1..],
            None => &p[usize::min(2,p.len())..]
        };
        match c.wrapping_sub(1) & 0x0f {
            0 => self.block(b'R',args),
            1 => self.block(b'W',args),
            8 => match p.get(2) {
                Some(b'+') | Some(b'-') => Ok(ErrorCode::Ok),
                _ => {
                    self.close_all()?;
                    Ok(ErrorCode::DosVersion)
                }
            },
            9 => {
                self.close_all()?;
                Ok(ErrorCode::DosVersion)
            },
            _ => Ok(ErrorCode::DriveNotReady)
        }
    }
}
