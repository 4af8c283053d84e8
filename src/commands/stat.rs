//! ## catalog and info
//!
//! `catalog` loads `$` through channel 0 just as `LOAD"$",8` would, then detokenizes
//! the BASIC-shaped listing for the console.  `info` walks the directory and the BAM directly.

use clap;
use json;
use crate::vdrive::types::PAD;
use crate::STDRESULT;

/// Turn the program the drive sends for `$` into printable lines.
/// Each line is `BLOCKS TEXT`, control characters are dropped.
pub fn listing_lines(listing: &[u8]) -> Vec<String> {
    let mut ans = Vec::new();
    // skip load address
    let mut ptr = 2;
    while ptr + 4 <= listing.len() {
        if listing[ptr]==0 && listing[ptr+1]==0 {
            break;
        }
        let num = u16::from_le_bytes([listing[ptr+2],listing[ptr+3]]);
        ptr += 4;
        let end = match listing[ptr..].iter().position(|c| *c==0) {
            Some(i) => ptr + i,
            None => listing.len()
        };
        let txt: Vec<u8> = listing[ptr..end].iter().filter(|c| **c>=0x20).copied().collect();
        ans.push(format!("{} {}",num,crate::escaped_ascii_from_bytes(&txt)).trim_end().to_string());
        ptr = end + 1;
    }
    ans
}

pub fn catalog(cmd: &clap::ArgMatches) -> STDRESULT {
    let name = match cmd.get_one::<String>("file") {
        Some(pattern) => [b"$:".to_vec(),crate::parse_escaped_ascii(pattern,false)?].concat(),
        None => b"$".to_vec()
    };
    let mut drive = super::attach(cmd)?;
    let listing = super::read_channel(&mut drive,&name,0);
    drive.detach();
    for line in listing_lines(&listing?) {
        println!("{}",line);
    }
    Ok(())
}

fn unpad(name: &[u8]) -> String {
    let end = name.iter().position(|c| *c==PAD).unwrap_or(name.len());
    crate::escaped_ascii_from_bytes(&name[0..end])
}

pub fn info(cmd: &clap::ArgMatches) -> STDRESULT {
    let mut drive = super::attach(cmd)?;
    let entries = drive.entries();
    let read_only = match drive.image() {
        Some(img) => img.is_read_only(),
        None => true
    };
    let mut obj = json::JsonValue::new_object();
    if let Some(bam) = drive.bam() {
        let geometry = bam.geometry();
        obj["type"] = json::JsonValue::String(geometry.disk_type.to_string());
        obj["dos"] = json::JsonValue::Number(json::number::Number::from(geometry.format as u16));
        obj["tracks"] = json::JsonValue::Number(json::number::Number::from(geometry.tracks));
        obj["name"] = json::JsonValue::String(unpad(&bam.header.name));
        obj["id"] = json::JsonValue::String(crate::escaped_ascii_from_bytes(&bam.header.id));
        obj["free"] = json::JsonValue::Number(json::number::Number::from(bam.free_block_count()));
    }
    obj["read_only"] = json::JsonValue::Boolean(read_only);
    let mut files = json::JsonValue::new_array();
    for slot in entries? {
        let mut file = json::JsonValue::new_object();
        file["name"] = json::JsonValue::String(unpad(&slot.name));
        file["type"] = json::JsonValue::String(slot.file_type().mnemonic().to_lowercase());
        file["blocks"] = json::JsonValue::Number(json::number::Number::from(slot.blocks));
        file["closed"] = json::JsonValue::Boolean(slot.is_closed());
        file["locked"] = json::JsonValue::Boolean(slot.is_locked());
        files.push(file)?;
    }
    obj["files"] = files;
    drive.detach();
    let s = match cmd.get_one::<u16>("indent") {
        Some(spaces) => json::stringify_pretty(obj,*spaces),
        None => json::stringify(obj)
    };
    println!("{}",s);
    Ok(())
}

#[cfg(test)]
mod test {
    use super::listing_lines;

    #[test]
    fn detokenize() {
        let mut listing = vec![0x01,0x04];
        listing.extend_from_slice(&[1,1,0,0,0x12,b'"']);
        listing.extend_from_slice(b"GAMES\xa0\xa0\" 01 2A");
        listing.push(0);
        listing.extend_from_slice(&[1,1,3,0]);
        listing.extend_from_slice(b"   \"HELLO\"  PRG   ");
        listing.push(0);
        listing.extend_from_slice(&[1,1,0x94,0x02]);
        listing.extend_from_slice(b"BLOCKS FREE.             ");
        listing.extend_from_slice(&[0,0,0]);
        let lines = listing_lines(&listing);
        assert_eq!(lines.len(),3);
        assert_eq!(lines[0],"0 \"GAMES\\xA0\\xA0\" 01 2A");
        assert_eq!(lines[1],"3    \"HELLO\"  PRG");
        assert_eq!(lines[2],"660 BLOCKS FREE.");
    }

    #[test]
    fn truncated() {
        assert_eq!(listing_lines(&[0x01,0x04,1]).len(),0);
        assert_eq!(listing_lines(&[0x01,0x04,1,1,5,0,b'A']),vec!["5 A".to_string()]);
    }
}
