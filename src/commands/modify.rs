use clap;
use log::info;
use super::CommandError;
use crate::STDRESULT;

/// Attach, send one command, detach
fn one_command(cmd: &clap::ArgMatches,dos_cmd: &[u8]) -> STDRESULT {
    let mut drive = super::attach(cmd)?;
    let result = super::send_command(&mut drive,dos_cmd);
    if result.is_ok() {
        info!("{}",drive.error_string().trim_end());
    }
    drive.detach();
    result
}

pub fn delete(cmd: &clap::ArgMatches) -> STDRESULT {
    let mut dos_cmd = b"S0:".to_vec();
    dos_cmd.append(&mut crate::parse_escaped_ascii(super::arg(cmd,"file")?,false)?);
    one_command(cmd,&dos_cmd)
}

pub fn rename(cmd: &clap::ArgMatches) -> STDRESULT {
    let old = crate::parse_escaped_ascii(super::arg(cmd,"file")?,false)?;
    let new = crate::parse_escaped_ascii(super::arg(cmd,"name")?,false)?;
    if new.contains(&b'=') || new.contains(&b',') || new.contains(&b':') {
        log::error!("new name cannot contain `=`, `,` or `:`");
        return Err(Box::new(CommandError::InvalidCommand));
    }
    let dos_cmd = [b"R0:".as_slice(),&new,b"=",&old].concat();
    one_command(cmd,&dos_cmd)
}

pub fn validate(cmd: &clap::ArgMatches) -> STDRESULT {
    one_command(cmd,b"V0")
}

/// Send any command and print the error channel, the command failing is not an error
pub fn send(cmd: &clap::ArgMatches) -> STDRESULT {
    let dos_cmd = crate::parse_escaped_ascii(super::arg(cmd,"command")?,false)?;
    let mut drive = super::attach(cmd)?;
    drive.command_bytes(&dos_cmd);
    print!("{}",drive.error_string().trim_end());
    println!();
    drive.detach();
    Ok(())
}
