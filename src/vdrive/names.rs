//! ## File name parser
//!
//! A file name as sent with OPEN looks like `[@][drive:]name[,type][,mode]`.
//! The type letters are `S`,`P`,`U`,`L`,`C`,`J`,`F`, the mode letters are
//! `R`,`W`,`A`.  Only the first letter of each suffix is significant.

use super::types::*;

#[derive(Debug,Clone,PartialEq)]
pub struct ParsedName {
    pub name: Vec<u8>,
    pub ftype: Option<FileType>,
    pub access: Option<AccessMode>,
    pub record_len: u8
}

/// Split a raw name into the bare name and its suffixes.
/// A name ending in a dangling comma, an unknown suffix letter, or append without SEQ
/// is a `Syntax` error; callers may report something else.
pub fn parse_name(raw: &[u8]) -> Result<ParsedName,ErrorCode> {
    if raw.len()==0 || raw[0]==0 {
        return Err(ErrorCode::NoFileName);
    }
    let p: &[u8] = match raw.iter().position(|c| *c==b':') {
        Some(i) => &raw[i+1..],
        None => match raw[0] {
            b'$' => &[],
            b'@' => &raw[1..],
            _ => raw
        }
    };
    let mut i = p.iter().position(|c| *c==b',').unwrap_or(p.len());
    let mut ans = ParsedName {
        name: p[0..i].to_vec(),
        ftype: None,
        access: None,
        record_len: 0
    };
    while i < p.len() {
        // p[i] is a comma
        i += 1;
        if i >= p.len() {
            return Err(ErrorCode::Syntax);
        }
        match p[i] {
            b'S' => ans.ftype = Some(FileType::Seq),
            b'P' => ans.ftype = Some(FileType::Prg),
            b'U' => ans.ftype = Some(FileType::Usr),
            b'L' => {
                if i+2 < p.len() && p[i+1]==b',' {
                    ans.record_len = p[i+2];
                    if ans.record_len > 254 {
                        return Err(ErrorCode::Syntax);
                    }
                    i += 2;
                }
                ans.ftype = Some(FileType::Rel);
            },
            b'C' => ans.ftype = Some(FileType::Cbm),
            b'J' => ans.ftype = Some(FileType::Djj),
            b'F' => ans.ftype = Some(FileType::Fab),
            b'R' => ans.access = Some(AccessMode::Read),
            b'W' => ans.access = Some(AccessMode::Write),
            b'A' => {
                if ans.ftype != Some(FileType::Seq) {
                    return Err(ErrorCode::Syntax);
                }
                ans.access = Some(AccessMode::Append);
            },
            _ => return Err(ErrorCode::Syntax)
        }
        match p[i..].iter().position(|c| *c==b',') {
            Some(off) => i += off,
            None => break
        }
    }
    Ok(ans)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn plain_and_drive_prefix() {
        let n = parse_name(b"HELLO").unwrap();
        assert_eq!(n.name,b"HELLO".to_vec());
        assert_eq!(n.ftype,None);
        assert_eq!(n.access,None);
        assert_eq!(parse_name(b"0:HELLO").unwrap().name,b"HELLO".to_vec());
        assert_eq!(parse_name(b"@0:HELLO").unwrap().name,b"HELLO".to_vec());
        assert_eq!(parse_name(b"@HELLO").unwrap().name,b"HELLO".to_vec());
        assert_eq!(parse_name(b"$").unwrap().name,Vec::<u8>::new());
        assert_eq!(parse_name(b"$0:H*").unwrap().name,b"H*".to_vec());
    }

    #[test]
    fn suffixes() {
        let n = parse_name(b"DATA,S,W").unwrap();
        assert_eq!(n.name,b"DATA".to_vec());
        assert_eq!(n.ftype,Some(FileType::Seq));
        assert_eq!(n.access,Some(AccessMode::Write));
        let n = parse_name(b"DATA,SEQ,APPEND").unwrap();
        assert_eq!(n.access,Some(AccessMode::Append));
        assert_eq!(parse_name(b"PROG,P,R").unwrap().access,Some(AccessMode::Read));
        let n = parse_name(b"RECS,L,\x40").unwrap();
        assert_eq!(n.ftype,Some(FileType::Rel));
        assert_eq!(n.record_len,0x40);
    }

    #[test]
    fn bad_names() {
        assert_eq!(parse_name(b""),Err(ErrorCode::NoFileName));
        assert_eq!(parse_name(b"DATA,"),Err(ErrorCode::Syntax));
        assert_eq!(parse_name(b"DATA,X"),Err(ErrorCode::Syntax));
        assert_eq!(parse_name(b"DATA,P,A"),Err(ErrorCode::Syntax));
    }
}
