//! ## get block
//!
//! Reads a block the way a program on the bus would: open a buffer channel with `#`,
//! issue `U1` to fill it, then read the 256 bytes.

use clap;
use std::io::Write;
use crate::STDRESULT;

const BUFFER_CHANNEL: u8 = 2;

pub fn get_block(cmd: &clap::ArgMatches) -> STDRESULT {
    let track = cmd.get_one::<u8>("track").copied().ok_or(super::CommandError::MissingArgument)?;
    let sector = cmd.get_one::<u8>("sector").copied().ok_or(super::CommandError::MissingArgument)?;
    let mut drive = super::attach(cmd)?;
    if drive.open(b"#",BUFFER_CHANNEL) != crate::vdrive::Status::Ok {
        super::check(&drive)?;
        return Err(Box::new(super::CommandError::InvalidCommand));
    }
    let u1 = format!("U1 {} 0 {} {}",BUFFER_CHANNEL,track,sector);
    if let Err(e) = super::send_command(&mut drive,u1.as_bytes()) {
        drive.detach();
        return Err(e);
    }
    let mut dat = Vec::new();
    for _i in 0..crate::vdrive::types::BLOCK_SIZE {
        dat.push(drive.read(BUFFER_CHANNEL).0);
    }
    drive.close(BUFFER_CHANNEL);
    drive.detach();
    if atty::is(atty::Stream::Stdout) {
        crate::display_block(0,&dat);
    } else {
        std::io::stdout().write_all(&dat)?;
    }
    Ok(())
}
