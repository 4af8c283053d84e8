use clap;
use std::str::FromStr;
use log::{info,error};
use crate::img::DiskType;
use super::CommandError;
use crate::STDRESULT;

/// Track count to use when none is given
fn default_tracks(typ: DiskType) -> u8 {
    match typ {
        DiskType::D64 => 35,
        DiskType::D71 => 70,
        DiskType::D81 => 80,
        DiskType::D80 => 77,
        DiskType::D82 => 154,
        DiskType::G64 => 42
    }
}

pub fn mkdsk(cmd: &clap::ArgMatches) -> STDRESULT {
    let img_path = super::arg(cmd,"dimg")?;
    let volume = super::arg(cmd,"volume")?;
    let typ = DiskType::from_str(super::arg(cmd,"type")?)?;
    let tracks = match cmd.get_one::<u8>("tracks") {
        Some(t) => *t,
        None => default_tracks(typ)
    };
    if std::path::Path::new(img_path).exists() {
        error!("refusing to overwrite {}",img_path);
        return Err(Box::new(CommandError::InvalidCommand));
    }
    let header = crate::parse_escaped_ascii(volume,false)?;
    if header.len() > 19 {
        error!("disk name and id are limited to 16 and 2 characters");
        return Err(Box::new(CommandError::OutOfRange));
    }
    let unit = cmd.get_one::<u8>("unit").copied().unwrap_or(8);
    match crate::create_file(img_path,typ,tracks,&header,unit) {
        Ok(mut drive) => {
            drive.detach();
            info!("created {} with {} tracks",img_path,tracks);
            Ok(())
        },
        Err(e) => {
            // leave nothing half made behind
            if std::path::Path::new(img_path).exists() {
                std::fs::remove_file(img_path)?;
            }
            Err(e)
        }
    }
}
