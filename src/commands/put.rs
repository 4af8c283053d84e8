use clap;
use std::io::Read;
use log::{info,error};
use super::CommandError;
use crate::STDRESULT;

pub fn put(cmd: &clap::ArgMatches) -> STDRESULT {
    if atty::is(atty::Stream::Stdin) {
        error!("cannot use `put` with console input, please pipe something in");
        return Err(Box::new(CommandError::InvalidCommand));
    }
    let name = crate::parse_escaped_ascii(super::arg(cmd,"file")?,false)?;
    if name.len()==0 || name.contains(&b',') || name.contains(&b':') {
        error!("file name cannot be empty or contain `,` or `:`");
        return Err(Box::new(CommandError::InvalidCommand));
    }
    let typ = match super::arg(cmd,"type")?.as_str() {
        "seq" => b'S',
        "usr" => b'U',
        "prg" => b'P',
        _ => return Err(Box::new(CommandError::UnknownItemType))
    };
    let mut file_data = Vec::new();
    std::io::stdin().read_to_end(&mut file_data)?;
    let mut full_name = match cmd.get_flag("replace") {
        true => b"@0:".to_vec(),
        false => Vec::new()
    };
    full_name.extend_from_slice(&name);
    full_name.extend_from_slice(&[b',',typ,b',',b'W']);
    let mut drive = super::attach(cmd)?;
    let result = super::write_channel(&mut drive,&full_name,2,&file_data);
    drive.detach();
    result?;
    info!("wrote {} bytes",file_data.len());
    Ok(())
}
