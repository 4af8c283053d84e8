//! # CLI Subcommands
//!
//! Contains modules that run the subcommands.  Every subcommand attaches the image
//! to a `Drive` and works through the bus facade, so the CLI exercises the same paths
//! a serial bus emulation would.

pub mod mkdsk;
pub mod get;
pub mod put;
pub mod get_img;
pub mod modify;
pub mod stat;
pub mod completions;

use log::{debug,error};
use crate::vdrive::{Drive,ErrorCode,Status};
use crate::{STDRESULT,DYNERR};

#[derive(thiserror::Error,Debug)]
pub enum CommandError {
    #[error("Command could not be interpreted")]
    InvalidCommand,
    #[error("One of the parameters was out of range")]
    OutOfRange,
    #[error("Item type is unknown")]
    UnknownItemType,
    #[error("Argument is missing")]
    MissingArgument
}

/// Get a string argument that clap has already required
fn arg<'a>(cmd: &'a clap::ArgMatches,id: &str) -> Result<&'a String,CommandError> {
    cmd.get_one::<String>(id).ok_or(CommandError::MissingArgument)
}

/// Attach the image named by `--dimg` using the unit from `--unit`
fn attach(cmd: &clap::ArgMatches) -> Result<Drive,DYNERR> {
    let img_path = arg(cmd,"dimg")?;
    let unit = cmd.get_one::<u8>("unit").copied().unwrap_or(8);
    crate::attach_file(img_path,unit)
}

/// Pass if the drive is happy, otherwise log the error channel and fail with the DOS code.
fn check(drive: &Drive) -> STDRESULT {
    match drive.error_code() {
        ErrorCode::Ok | ErrorCode::FilesScratched | ErrorCode::DosVersion => Ok(()),
        code => {
            error!("drive reports {}",drive.error_string().trim_end());
            Err(Box::new(code))
        }
    }
}

/// Open a channel, read it to the end, and close it
fn read_channel(drive: &mut Drive,name: &[u8],secondary: u8) -> Result<Vec<u8>,DYNERR> {
    if drive.open(name,secondary) != Status::Ok {
        check(drive)?;
        return Err(Box::new(CommandError::InvalidCommand));
    }
    let mut ans = Vec::new();
    loop {
        match drive.read(secondary) {
            (b,Status::Ok) => ans.push(b),
            (_,Status::Eof) => break,
            (_,Status::Error) => {
                drive.close(secondary);
                check(drive)?;
                return Err(Box::new(CommandError::InvalidCommand));
            }
        }
    }
    drive.close(secondary);
    debug!("read {} bytes from channel {}",ans.len(),secondary);
    Ok(ans)
}

/// Open a channel, write all the data, and close it
fn write_channel(drive: &mut Drive,name: &[u8],secondary: u8,dat: &[u8]) -> STDRESULT {
    if drive.open(name,secondary) != Status::Ok {
        check(drive)?;
        return Err(Box::new(CommandError::InvalidCommand));
    }
    for b in dat {
        if drive.write(secondary,*b) != Status::Ok {
            drive.close(secondary);
            check(drive)?;
            return Err(Box::new(CommandError::InvalidCommand));
        }
    }
    if drive.close(secondary) != Status::Ok {
        check(drive)?;
        return Err(Box::new(CommandError::InvalidCommand));
    }
    debug!("wrote {} bytes to channel {}",dat.len(),secondary);
    Ok(())
}

/// Send a command and check the outcome
fn send_command(drive: &mut Drive,cmd: &[u8]) -> STDRESULT {
    drive.command_bytes(cmd);
    check(drive)
}
