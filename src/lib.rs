//! # `cbmdrive` main library
//!
//! This library emulates the file level behavior of Commodore disk drives on top of
//! disk image files.  It is meant to sit behind a serial bus emulation, which forwards
//! each bus transaction (open, read a byte, write a byte, close) to the drive.
//!
//! ## Architecture
//!
//! Drive operations are built around two objects:
//! * `img::DiskImage` is a trait object that finds 256 byte blocks by (track,sector), it does
//!   not try to interpret the BAM or the directory
//! * `vdrive::Drive` imposes CBM-DOS on an attached image, managing the BAM, the directory,
//!   16 channels, the command interpreter, and the error channel
//!
//! When a `Drive` is attached it takes ownership of some `DiskImage`.
//! An `img::store::ImageStore` writes every block straight through to the image file,
//! so changes are permanent as soon as the drive makes them.
//!
//! ## Disk Images
//!
//! As of this writing `cbmdrive` supports
//! * D64 (35 or 40 tracks, with or without error info)
//! * D71
//! * D81
//! * D80, D82
//! * G64 (detection only)

pub mod img;
pub mod vdrive;
pub mod commands;

use std::fmt::Write;
use std::path::Path;
use log::{info,warn};
use regex::Regex;
use hex;

type DYNERR = Box<dyn std::error::Error>;
type STDRESULT = Result<(),Box<dyn std::error::Error>>;

/// Open the image file and attach it to a new drive.
/// The drive owns the open file until it is detached or dropped.
pub fn attach_file(img_path: &str,unit: u8) -> Result<vdrive::Drive,DYNERR> {
    let img = img::store::ImageStore::open(Path::new(img_path))?;
    info!("opened {}",img_path);
    vdrive::Drive::attach(Box::new(img),unit)
}

/// Create a zero filled image file, attach it, and format it with the `N` command.
/// The `header` has the form `NAME,ID`.
pub fn create_file(img_path: &str,disk_type: img::DiskType,tracks: u8,header: &[u8],unit: u8) -> Result<vdrive::Drive,DYNERR> {
    let img = img::store::ImageStore::create(Path::new(img_path),disk_type,tracks)?;
    let mut drive = vdrive::Drive::attach(Box::new(img),unit)?;
    let mut cmd = b"N:".to_vec();
    cmd.extend_from_slice(header);
    let code = drive.command_bytes(&cmd);
    if !code.is_ok() {
        warn!("format failed with {}",drive.error_string().trim_end());
        drive.detach();
        return Err(Box::new(code));
    }
    Ok(drive)
}

/// Display binary to stdout in columns of hex, +ascii, and -ascii.
/// The -ascii column shows shifted PETSCII, including the 0xa0 name padding, with the high bit cleared.
pub fn display_block(start_addr: u16,block: &[u8]) {
    let mut slice_start = 0;
    loop {
        let row_label = start_addr as usize + slice_start;
        let slice_end = usize::min(slice_start + 16,block.len());
        let slice = &block[slice_start..slice_end];
        let txt: Vec<u8> = slice.iter().map(|c| match *c {
            x if x>=32 && x<127 => x,
            _ => b'.'
        }).collect();
        let neg_txt: Vec<u8> = slice.iter().map(|c| match *c {
            x if x>=160 && x<255 => x - 128,
            _ => b'.'
        }).collect();
        print!("{:04X} : ",row_label);
        for byte in slice {
            print!("{:02X} ",byte);
        }
        for _blank in slice_end..slice_start+16 {
            print!("   ");
        }
        print!("|+| {} ",String::from_utf8_lossy(&txt));
        for _blank in slice_end..slice_start+16 {
            print!(" ");
        }
        println!("|-| {}",String::from_utf8_lossy(&neg_txt));
        slice_start += 16;
        if slice_end==block.len() {
            break;
        }
    }
}

/// This takes any bytes and makes an ascii friendly string
/// by using hex escapes, e.g., `\xA0`.  Used for file names and commands in log messages.
pub fn escaped_ascii_from_bytes(bytes: &[u8]) -> String {
    let mut result = String::new();
    for b in bytes {
        match *b {
            x if x>=0x20 && x<0x7f => result.push(x as char),
            x => {
                // writing to a String cannot fail
                let _ = write!(&mut result,"\\x{:02X}",x);
            }
        }
    }
    result
}

/// Interpret a UTF8 string as pure ascii and put into bytes.
/// Non-ascii characters are omitted from the result, but arbitrary
/// bytes can be introduced using escapes, e.g., `\x0D`.
/// if `caps` is true the ascii is put in upper case.
pub fn parse_escaped_ascii(s: &str,caps: bool) -> Result<Vec<u8>,DYNERR> {
    let mut ans: Vec<u8> = Vec::new();
    let hex_patt = Regex::new(r"\\x[0-9A-Fa-f][0-9A-Fa-f]")?;
    let mut curs = 0;
    let push_ascii = |ans: &mut Vec<u8>,txt: &str| {
        for c in txt.chars().filter(|c| c.is_ascii()) {
            ans.push(match caps {
                true => c.to_ascii_uppercase() as u8,
                false => c as u8
            });
        }
    };
    for hex in hex_patt.find_iter(s) {
        push_ascii(&mut ans,&s[curs..hex.start()]);
        ans.append(&mut hex::decode(&s[hex.start()+2..hex.end()])?);
        curs = hex.end();
    }
    push_ascii(&mut ans,&s[curs..]);
    Ok(ans)
}

#[test]
fn test_escapes() {
    assert_eq!(escaped_ascii_from_bytes(b"HELLO\xa0\x0d"),"HELLO\\xA0\\x0D");
    assert_eq!(parse_escaped_ascii("b-p 2 0\\x0d",true).unwrap(),b"B-P 2 0\x0d".to_vec());
    assert_eq!(parse_escaped_ascii("\\xA0\\xa0x",false).unwrap(),vec![0xa0,0xa0,b'x']);
    assert_eq!(parse_escaped_ascii("caf\u{e9}",false).unwrap(),b"caf".to_vec());
}
