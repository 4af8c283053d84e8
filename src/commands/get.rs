use clap;
use std::io::Write;
use crate::STDRESULT;

/// Load a file through channel 0 and write it to stdout
pub fn get(cmd: &clap::ArgMatches) -> STDRESULT {
    let name = crate::parse_escaped_ascii(super::arg(cmd,"file")?,false)?;
    let mut drive = super::attach(cmd)?;
    let object = super::read_channel(&mut drive,&name,0)?;
    drive.detach();
    if atty::is(atty::Stream::Stdout) {
        crate::display_block(0,&object);
    } else {
        std::io::stdout().write_all(&object)?;
    }
    Ok(())
}
