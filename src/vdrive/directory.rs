//! # Directory Manager
//!
//! The directory is a chain of blocks starting at the format's directory (track,sector).
//! Each block holds 8 slots of 32 bytes, the chain link lives in the first two bytes
//! of the block, i.e., in the unused link field of slot 0.
//!
//! Searching is done with a `DirCursor`, which remembers the block that holds the
//! last slot it returned, so the slot can be updated and written back in place.

use log::{trace,debug,warn};
use crate::img::{DiskImage,DosFormat,Geometry};
use super::bam::Bam;
use super::types::*;
use crate::{STDRESULT,DYNERR};

pub const SLOT_SIZE: usize = 32;
pub const SLOTS_PER_BLOCK: usize = 8;

/// One directory entry, decoded from its 32 byte record.
/// The chain link bytes (0,1) are not part of the slot.
#[derive(Clone,Debug,PartialEq)]
pub struct DirectorySlot {
    pub type_byte: u8,
    pub first: (u8,u8),
    pub name: [u8;16],
    pub side: (u8,u8),
    pub record_len: u8,
    pub aux: [u8;6],
    pub blocks: u16
}

impl DirectorySlot {
    /// Fresh closed-bit-clear slot with a padded name
    pub fn new(name: &[u8],ftype: FileType) -> Self {
        let mut ans = Self {
            type_byte: ftype as u8,
            first: (0,0),
            name: [PAD;16],
            side: (0,0),
            record_len: 0,
            aux: [0;6],
            blocks: 0
        };
        ans.set_name(name);
        ans
    }
    /// Decode from a 32 byte record (link bytes included)
    pub fn from_bytes(rec: &[u8]) -> Self {
        let mut name = [0;16];
        name.copy_from_slice(&rec[5..21]);
        let mut aux = [0;6];
        aux.copy_from_slice(&rec[24..30]);
        Self {
            type_byte: rec[2],
            first: (rec[3],rec[4]),
            name,
            side: (rec[21],rec[22]),
            record_len: rec[23],
            aux,
            blocks: u16::from_le_bytes([rec[30],rec[31]])
        }
    }
    /// Encode into a 32 byte record, leaving the link bytes alone
    pub fn write_to(&self,rec: &mut [u8]) {
        rec[2] = self.type_byte;
        rec[3] = self.first.0;
        rec[4] = self.first.1;
        rec[5..21].copy_from_slice(&self.name);
        rec[21] = self.side.0;
        rec[22] = self.side.1;
        rec[23] = self.record_len;
        rec[24..30].copy_from_slice(&self.aux);
        rec[30..32].copy_from_slice(&u16::to_le_bytes(self.blocks));
    }
    pub fn set_name(&mut self,name: &[u8]) {
        for i in 0..16 {
            self.name[i] = match name.get(i) {
                Some(c) => *c,
                None => PAD
            };
        }
    }
    pub fn name_len(&self) -> usize {
        self.name.iter().position(|c| *c==PAD).unwrap_or(16)
    }
    /// Name with the padding removed
    pub fn short_name(&self) -> Vec<u8> {
        self.name[0..self.name_len()].to_vec()
    }
    pub fn file_type(&self) -> FileType {
        FileType::from_type_byte(self.type_byte)
    }
    pub fn set_file_type(&mut self,ftype: FileType) {
        self.type_byte = (self.type_byte & !TYPE_MASK) | ftype as u8;
    }
    pub fn is_closed(&self) -> bool {
        self.type_byte & CLOSED > 0
    }
    pub fn is_locked(&self) -> bool {
        self.type_byte & LOCKED > 0
    }
    pub fn is_empty(&self) -> bool {
        self.type_byte == 0
    }
}

/// What a directory search is looking for
#[derive(Clone,Debug,PartialEq)]
pub enum SlotQuery {
    /// an unused slot, the directory is extended if there is none
    Empty,
    /// a used slot whose name matches the pattern, optionally of one type
    Matching { pattern: Vec<u8>, ftype: Option<FileType> }
}

impl SlotQuery {
    /// Query for a name pattern, a `Del` type means any type
    pub fn named(pattern: &[u8],ftype: Option<FileType>) -> Self {
        let n = usize::min(pattern.len(),MAX_NAME_LEN);
        Self::Matching {
            pattern: pattern[0..n].to_vec(),
            ftype: match ftype {
                Some(FileType::Del) => None,
                t => t
            }
        }
    }
    /// Match against a 32 byte record.  `?` matches any one character, `*` matches the rest.
    pub fn matches(&self,rec: &[u8]) -> bool {
        let type_byte = rec[2];
        let (pattern,ftype) = match self {
            Self::Empty => return type_byte == 0,
            Self::Matching { pattern, ftype } => (pattern,ftype)
        };
        if type_byte == 0 {
            return false;
        }
        let name = &rec[5..21];
        let mut i = 0;
        while i < pattern.len() {
            match pattern[i] {
                b'?' => {},
                b'*' => {
                    i = 16;
                    break;
                },
                c => if c != name[i] {
                    return false;
                }
            }
            i += 1;
        }
        if i < 16 && name[i] != PAD {
            return false;
        }
        match ftype {
            Some(t) => *t as u8 == type_byte & TYPE_MASK,
            None => true
        }
    }
}

/// Where a slot lives: directory block and record index
#[derive(Clone,Copy,Debug,PartialEq)]
pub struct SlotPosition {
    pub track: u8,
    pub sector: u8,
    pub index: usize
}

/// Position in the directory chain
pub struct DirCursor {
    query: SlotQuery,
    pub track: u8,
    pub sector: u8,
    /// the directory block holding the current slot
    pub buf: Vec<u8>,
    /// index of the current slot, `None` before the first call to `find_next`
    pub slot: Option<usize>,
    reps: usize
}

/// Sectors that may be claimed when the directory has to grow, in order of preference
fn growth_sectors(geometry: &Geometry) -> Vec<(u8,u8)> {
    let dir = geometry.dir_track;
    let mut ans = Vec::new();
    match geometry.format {
        DosFormat::Cbm1581 => {
            for s in 3..geometry.sectors_in_track(dir) {
                ans.push((dir,s as u8));
            }
        },
        DosFormat::Cbm1571 => {
            for s in 1..geometry.sectors_in_track(dir) {
                ans.push((dir,s as u8));
            }
            for s in 0..geometry.sectors_in_track(dir+35) {
                ans.push((dir+35,s as u8));
            }
        },
        _ => {
            for s in 1..geometry.sectors_in_track(dir) {
                ans.push((dir,s as u8));
            }
        }
    }
    ans
}

impl DirCursor {
    /// Start a search at the first directory block
    pub fn find_first(img: &mut Box<dyn DiskImage>,query: SlotQuery) -> Result<Self,DYNERR> {
        let (track,sector) = (img.geometry().dir_track,img.geometry().dir_sector);
        trace!("directory search {:?}",query);
        Ok(Self {
            query,
            track,
            sector,
            buf: img.read_block(track,sector)?,
            slot: None,
            reps: 0
        })
    }
    fn record(&self,idx: usize) -> &[u8] {
        &self.buf[idx*SLOT_SIZE..(idx+1)*SLOT_SIZE]
    }
    /// Next matching slot.  When looking for an empty slot and the chain is exhausted,
    /// a new directory block is claimed from the BAM and linked in.
    pub fn find_next(&mut self,img: &mut Box<dyn DiskImage>,bam: &mut Bam) -> Result<Option<DirectorySlot>,DYNERR> {
        let mut idx = match self.slot {
            None => 0,
            Some(i) => i + 1
        };
        loop {
            while idx < SLOTS_PER_BLOCK {
                if self.query.matches(self.record(idx)) {
                    self.slot = Some(idx);
                    return Ok(Some(DirectorySlot::from_bytes(self.record(idx))));
                }
                idx += 1;
            }
            if self.buf[0] == 0 {
                break;
            }
            let (next_t,next_s) = (self.buf[0],self.buf[1]);
            self.reps += 1;
            if self.reps > MAX_DIRECTORY_REPS || !img.geometry().check_sector(next_t,next_s) {
                warn!("directory chain broken at {},{}",self.track,self.sector);
                break;
            }
            self.track = next_t;
            self.sector = next_s;
            self.buf = img.read_block(next_t,next_s)?;
            idx = 0;
        }
        self.slot = Some(SLOTS_PER_BLOCK);
        if self.query == SlotQuery::Empty {
            return self.grow(img,bam);
        }
        Ok(None)
    }
    fn grow(&mut self,img: &mut Box<dyn DiskImage>,bam: &mut Bam) -> Result<Option<DirectorySlot>,DYNERR> {
        let geometry = *img.geometry();
        for (t,s) in growth_sectors(&geometry) {
            if bam.allocate_sector(t,s) {
                debug!("directory extended to {},{}",t,s);
                self.buf[0] = t;
                self.buf[1] = s;
                img.write_block(self.track,self.sector,&self.buf)?;
                self.buf = vec![0;BLOCK_SIZE];
                self.buf[1] = 0xff;
                self.track = t;
                self.sector = s;
                self.slot = Some(0);
                return Ok(Some(DirectorySlot::from_bytes(self.record(0))));
            }
        }
        Ok(None)
    }
    /// Block and record of the current slot, if the cursor is on one
    pub fn position(&self) -> Option<SlotPosition> {
        match self.slot {
            Some(index) if index < SLOTS_PER_BLOCK => Some(SlotPosition { track: self.track, sector: self.sector, index }),
            _ => None
        }
    }
    /// Put the slot into the current position and write the directory block
    pub fn update(&mut self,img: &mut Box<dyn DiskImage>,slot: &DirectorySlot) -> STDRESULT {
        if let Some(idx) = self.slot {
            if idx < SLOTS_PER_BLOCK {
                slot.write_to(&mut self.buf[idx*SLOT_SIZE..(idx+1)*SLOT_SIZE]);
                img.write_block(self.track,self.sector,&self.buf)?;
            }
        }
        Ok(())
    }
}

/// Rewrite the slot at a position found earlier
pub fn write_slot(img: &mut Box<dyn DiskImage>,pos: SlotPosition,slot: &DirectorySlot) -> STDRESULT {
    let mut buf = img.read_block(pos.track,pos.sector)?;
    slot.write_to(&mut buf[pos.index*SLOT_SIZE..(pos.index+1)*SLOT_SIZE]);
    img.write_block(pos.track,pos.sector,&buf)
}

/// Free a chain of blocks, stopping at an illegal link or a block that is already free
pub fn free_chain(img: &mut Box<dyn DiskImage>,bam: &mut Bam,track: u8,sector: u8) -> STDRESULT {
    let (mut t,mut s) = (track,sector);
    while t != 0 {
        if !img.geometry().check_sector(t,s) {
            break;
        }
        if !bam.free_sector(t,s) {
            break;
        }
        let buf = img.read_block(t,s)?;
        t = buf[0];
        s = buf[1];
    }
    Ok(())
}

/// Mark every block of a chain as used.  An illegal link or a block that is already in use
/// stops the walk with the matching DOS error.
pub fn allocate_chain(img: &mut Box<dyn DiskImage>,bam: &mut Bam,track: u8,sector: u8) -> STDRESULT {
    let (mut t,mut s) = (track,sector);
    while t != 0 {
        if !img.geometry().check_sector(t,s) {
            return Err(Box::new(DosError::at(ErrorCode::IllegalTrackOrSector,t,s)));
        }
        if !bam.allocate_sector(t,s) {
            return Err(Box::new(DosError::at(ErrorCode::NoBlock,t,s)));
        }
        let buf = img.read_block(t,s)?;
        t = buf[0];
        s = buf[1];
    }
    Ok(())
}

/// Find the slot again by name and type, free its data and side chains, and zero its type byte.
/// The BAM is written before the directory.
pub fn remove_slot(img: &mut Box<dyn DiskImage>,bam: &mut Bam,slot: &DirectorySlot) -> STDRESULT {
    let query = SlotQuery::named(&slot.short_name(),Some(slot.file_type()));
    let mut cursor = DirCursor::find_first(img,query)?;
    if let Some(mut found) = cursor.find_next(img,bam)? {
        free_chain(img,bam,found.first.0,found.first.1)?;
        free_chain(img,bam,found.side.0,found.side.1)?;
        bam.store(img)?;
        found.type_byte = 0;
        cursor.update(img,&found)?;
    }
    Ok(())
}

fn no_pads(buf: &[u8]) -> Vec<u8> {
    buf.iter().map(|c| match *c {
        PAD => b' ',
        x => x
    }).collect()
}

/// Render the directory as a BASIC program, as the drive sends it for `LOAD"$",8`.
/// Each line is linked with a dummy 0x0101 link, the loader relinks the program.
pub fn create_listing(img: &mut Box<dyn DiskImage>,bam: &mut Bam,pattern: &[u8],ftype: Option<FileType>) -> Result<Vec<u8>,DYNERR> {
    let mut pat = pattern;
    if pat.first()==Some(&b'$') {
        pat = &pat[1..];
    }
    if pat.first()==Some(&b':') {
        pat = &pat[1..];
    }
    if pat.len()==0 {
        pat = b"*";
    }
    let mut ans: Vec<u8> = vec![0x01,0x04];
    // header line
    ans.extend_from_slice(&[1,1,0,0,0x12,b'"']);
    ans.append(&mut no_pads(&bam.header.name));
    ans.extend_from_slice(&[b'"',b' ']);
    ans.append(&mut no_pads(&bam.id_field()));
    ans.push(0);
    let mut cursor = DirCursor::find_first(img,SlotQuery::named(pat,ftype))?;
    while let Some(slot) = cursor.find_next(img,bam)? {
        let start = ans.len();
        ans.extend_from_slice(&[1,1]);
        ans.extend_from_slice(&u16::to_le_bytes(slot.blocks));
        if slot.blocks < 10 {
            ans.push(b' ');
        }
        if slot.blocks < 100 {
            ans.push(b' ');
        }
        ans.extend_from_slice(&[b' ',b'"']);
        let mut name = no_pads(&slot.name);
        name.push(b' ');
        name[slot.name_len()] = b'"';
        ans.append(&mut name);
        ans.push(match slot.is_closed() {
            true => b' ',
            false => b'*'
        });
        ans.extend_from_slice(slot.file_type().mnemonic().as_bytes());
        ans.push(match slot.is_locked() {
            true => b'<',
            false => b' '
        });
        while ans.len() - start < 31 {
            ans.push(b' ');
        }
        ans.push(0);
    }
    ans.extend_from_slice(&[1,1]);
    ans.extend_from_slice(&u16::to_le_bytes(bam.free_block_count() as u16));
    ans.extend_from_slice(b"BLOCKS FREE.");
    ans.extend_from_slice(&[b' ';13]);
    ans.extend_from_slice(&[0,0,0]);
    Ok(ans)
}

#[cfg(test)]
mod test {
    use super::*;

    fn record(name: &[u8],type_byte: u8) -> Vec<u8> {
        let mut rec = vec![0;32];
        let mut slot = DirectorySlot::new(name,FileType::Prg);
        slot.type_byte = type_byte;
        slot.blocks = 300;
        slot.write_to(&mut rec);
        rec
    }

    #[test]
    fn slot_record() {
        let rec = record(b"HELLO",0x82);
        assert_eq!(rec[2],0x82);
        assert_eq!(&rec[5..10],b"HELLO");
        assert_eq!(rec[10],PAD);
        assert_eq!(&rec[30..32],&[44,1]);
        let slot = DirectorySlot::from_bytes(&rec);
        assert_eq!(slot.short_name(),b"HELLO".to_vec());
        assert!(slot.is_closed());
        assert!(!slot.is_locked());
        assert_eq!(slot.file_type(),FileType::Prg);
    }

    #[test]
    fn wildcards() {
        let rec = record(b"HELLO",0x82);
        assert!(SlotQuery::named(b"HELLO",None).matches(&rec));
        assert!(SlotQuery::named(b"H?LLO",None).matches(&rec));
        assert!(SlotQuery::named(b"HE*",None).matches(&rec));
        assert!(SlotQuery::named(b"*",Some(FileType::Prg)).matches(&rec));
        assert!(!SlotQuery::named(b"*",Some(FileType::Seq)).matches(&rec));
        assert!(!SlotQuery::named(b"HELL",None).matches(&rec));
        assert!(!SlotQuery::named(b"HELLO2",None).matches(&rec));
        assert!(!SlotQuery::named(b"hello",None).matches(&rec));
        assert!(!SlotQuery::Empty.matches(&rec));
        assert!(SlotQuery::Empty.matches(&record(b"GONE",0)));
        assert!(!SlotQuery::named(b"*",None).matches(&record(b"GONE",0)));
    }
}
