use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use std::str::FromStr;
use std::fmt;

pub const BLOCK_SIZE: usize = 256;
pub const CHANNELS: usize = 16;
pub const COMMAND_CHANNEL: u8 = 15;
pub const MAX_COMMAND_LEN: usize = 128;
pub const MAX_NAME_LEN: usize = 16;
/// Padding byte for names on disk
pub const PAD: u8 = 0xa0;
/// Byte handed back with an EOF status
pub const EOF_BYTE: u8 = 0xc7;
pub const MAX_DIRECTORY_REPS: usize = 300;
pub const DOS_VERSION_TEXT: &str = "VIRTUAL DRIVE EMULATION V2.2";

/// Enumerates CBM-DOS status codes.  The `Display` trait will print the message the drive
/// puts on the error channel, such as `FILE NOT FOUND`.  `ErrorCode::from_u8` recovers a code
/// from its number.
#[derive(thiserror::Error,FromPrimitive,Debug,Clone,Copy,PartialEq,Eq)]
pub enum ErrorCode {
    #[error("OK")]
    Ok = 0,
    #[error("FILES SCRATCHED")]
    FilesScratched = 1,
    #[error("SELECTED PARTITION")]
    SelectedPartition = 2,
    #[error("UNIMPLEMENTED")]
    Unimplemented = 3,
    #[error("READ ERROR")]
    HeaderNotFound = 20,
    #[error("READ ERROR")]
    NoSync = 21,
    #[error("READ ERROR")]
    DataNotPresent = 22,
    #[error("READ ERROR")]
    DataChecksum = 23,
    #[error("READ ERROR")]
    ByteDecoding = 24,
    #[error("WRITE ERROR")]
    WriteVerify = 25,
    #[error("WRITE PROTECT ON")]
    WriteProtectOn = 26,
    #[error("READ ERROR")]
    HeaderChecksum = 27,
    #[error("WRITE ERROR")]
    LongDataBlock = 28,
    #[error("DISK ID MISMATCH")]
    DiskIdMismatch = 29,
    #[error("SYNTAX ERROR")]
    Syntax = 30,
    #[error("SNERR INVALID COMMAND")]
    InvalidCommand = 31,
    #[error("SNERR LINE TOO LONG")]
    LineTooLong = 32,
    #[error("SNERR INVAL FILE NAME")]
    InvalidFileName = 33,
    #[error("SNERR NO FILE NAME")]
    NoFileName = 34,
    #[error("RECORD NOT PRESENT")]
    RecordNotPresent = 50,
    #[error("WRITE FILE OPEN")]
    WriteFileOpen = 60,
    #[error("FILE NOT OPEN")]
    FileNotOpen = 61,
    #[error("FILE NOT FOUND")]
    FileNotFound = 62,
    #[error("FILE EXISTS")]
    FileExists = 63,
    #[error("FILE TYPE MISMATCH")]
    FileTypeMismatch = 64,
    #[error("NO BLOCK")]
    NoBlock = 65,
    #[error("ILLEGAL TRACK OR SECTOR")]
    IllegalTrackOrSector = 66,
    #[error("ILLEGAL SYSTEM T OR S")]
    IllegalSystemTS = 67,
    #[error("NO CHANNEL")]
    NoChannel = 70,
    #[error("DISK FULL")]
    DiskFull = 72,
    #[error("VIRTUAL DRIVE EMULATION V2.2")]
    DosVersion = 73,
    #[error("DRIVE NOT READY")]
    DriveNotReady = 74,
    #[error("SELECTED PARTITION ILLEGAL")]
    PartitionIllegal = 77,
    #[error("DIRECTORY NOT EMPTY")]
    DirectoryNotEmpty = 80,
    #[error("PERMISSION DENIED")]
    PermissionDenied = 81
}

impl ErrorCode {
    /// Map the error-info byte stored with some D64 images
    pub fn from_error_info(info: u8) -> Self {
        match info {
            0x2 => Self::HeaderNotFound,
            0x3 => Self::NoSync,
            0x4 => Self::DataNotPresent,
            0x5 => Self::DataChecksum,
            0x7 => Self::WriteVerify,
            0x8 => Self::WriteProtectOn,
            0x9 => Self::HeaderChecksum,
            0xa => Self::LongDataBlock,
            0xb => Self::DiskIdMismatch,
            0xf => Self::DriveNotReady,
            0x10 => Self::ByteDecoding,
            _ => Self::Ok
        }
    }
    pub fn is_ok(&self) -> bool {
        *self==Self::Ok
    }
}

/// A DOS status that refers to a particular block, such as `66,ILLEGAL TRACK OR SECTOR,40,01`
#[derive(thiserror::Error,Debug,Clone,Copy,PartialEq,Eq)]
#[error("{code}")]
pub struct DosError {
    pub code: ErrorCode,
    pub track: u8,
    pub sector: u8
}

impl DosError {
    pub fn at(code: ErrorCode,track: u8,sector: u8) -> Self {
        Self { code, track, sector }
    }
}

/// Status handed back to the bus layer for each transaction
#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub enum Status {
    Ok,
    Eof,
    Error
}

/// File types stored in the low 3 bits of the directory type byte,
/// available conversions are:
/// * u8 to FileType: `FileType::from_u8` (use FromPrimitive trait)
/// * &str to FileType: `FileType::from_str`, str can be the number, or mnemonic such as `prg`
#[derive(FromPrimitive,Debug,Clone,Copy,PartialEq,Eq)]
pub enum FileType {
    Del = 0,
    Seq = 1,
    Prg = 2,
    Usr = 3,
    Rel = 4,
    Cbm = 5,
    Djj = 6,
    Fab = 7
}

pub const TYPE_MASK: u8 = 0x07;
pub const LOCKED: u8 = 0x40;
pub const CLOSED: u8 = 0x80;

impl FileType {
    /// Type from the raw directory type byte, flags are ignored
    pub fn from_type_byte(b: u8) -> Self {
        // every 3 bit value has a variant
        FileType::from_u8(b & TYPE_MASK).unwrap_or(FileType::Del)
    }
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Self::Del => "DEL",
            Self::Seq => "SEQ",
            Self::Prg => "PRG",
            Self::Usr => "USR",
            Self::Rel => "REL",
            Self::Cbm => "CBM",
            Self::Djj => "DJJ",
            Self::Fab => "FAB"
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f,"{}",self.mnemonic())
    }
}

impl FromStr for FileType {
    type Err = ErrorCode;
    fn from_str(s: &str) -> Result<Self,Self::Err> {
        // string can be the number itself
        if let Ok(num) = u8::from_str(s) {
            return match FileType::from_u8(num) {
                Some(typ) => Ok(typ),
                _ => Err(ErrorCode::FileTypeMismatch)
            };
        }
        // or a mnemonic
        match s.to_lowercase().as_str() {
            "del" => Ok(Self::Del),
            "seq" => Ok(Self::Seq),
            "prg" => Ok(Self::Prg),
            "usr" => Ok(Self::Usr),
            "rel" => Ok(Self::Rel),
            _ => Err(ErrorCode::FileTypeMismatch)
        }
    }
}

/// The first two bytes of every chained block.
/// A nonzero track points at the next block, track 0 ends the chain
/// and the sector byte then holds the index of the last valid byte.
#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub enum SectorLink {
    Next(u8,u8),
    Last(u8)
}

impl SectorLink {
    pub fn from_bytes(buf: &[u8]) -> Self {
        match buf[0] {
            0 => Self::Last(buf[1]),
            t => Self::Next(t,buf[1])
        }
    }
    pub fn to_bytes(&self) -> [u8;2] {
        match self {
            Self::Next(t,s) => [*t,*s],
            Self::Last(n) => [0,*n]
        }
    }
}

#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub enum ChannelMode {
    NotInUse,
    Sequential,
    DirectoryRead,
    MemoryBuffer,
    CommandChannel
}

#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub enum AccessMode {
    Read,
    Write,
    Append
}
