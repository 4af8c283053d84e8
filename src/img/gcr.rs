//! ## GCR container detection
//!
//! A GCR container stores the flux-level track data of a 1541 disk.  It starts with
//! a 12 byte header: the signature `GCR-1541`, a version byte, the number of half
//! tracks, and the size of each track field.  Only the header is interpreted here.

use log::debug;

pub const SIGNATURE: &[u8;8] = b"GCR-1541";
pub const HEADER_LEN: usize = 12;
pub const TRACK_FIELD_SIZE: u16 = 7928;
const MIN_HALF_TRACKS: u8 = 2*35;
const MAX_HALF_TRACKS: u8 = 2*42;

pub struct GcrHeader {
    pub version: u8,
    pub half_tracks: u8,
    pub track_size: u16
}

impl GcrHeader {
    /// Returns `None` unless all header fields are acceptable
    pub fn from_bytes(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_LEN || &buf[0..8] != SIGNATURE {
            return None;
        }
        let ans = Self {
            version: buf[8],
            half_tracks: buf[9],
            track_size: u16::from_le_bytes([buf[10],buf[11]])
        };
        if ans.version != 0 {
            debug!("GCR version {} is not supported",ans.version);
            return None;
        }
        if ans.half_tracks < MIN_HALF_TRACKS || ans.half_tracks > MAX_HALF_TRACKS {
            debug!("GCR half track count {} is out of range",ans.half_tracks);
            return None;
        }
        if ans.track_size != TRACK_FIELD_SIZE {
            debug!("GCR track size {} is not supported",ans.track_size);
            return None;
        }
        Some(ans)
    }
    pub fn tracks(&self) -> u8 {
        self.half_tracks / 2
    }
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut ans = SIGNATURE.to_vec();
        ans.push(self.version);
        ans.push(self.half_tracks);
        ans.extend_from_slice(&u16::to_le_bytes(self.track_size));
        ans
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn header() {
        let hdr = GcrHeader { version: 0, half_tracks: 84, track_size: 7928 };
        let buf = hdr.to_bytes();
        assert_eq!(GcrHeader::from_bytes(&buf).unwrap().tracks(),42);
        let mut bad = buf.clone();
        bad[8] = 1;
        assert!(GcrHeader::from_bytes(&bad).is_none());
        let mut bad = buf.clone();
        bad[9] = 69;
        assert!(GcrHeader::from_bytes(&bad).is_none());
        let mut bad = buf.clone();
        bad[10] = 0;
        assert!(GcrHeader::from_bytes(&bad).is_none());
    }
}
