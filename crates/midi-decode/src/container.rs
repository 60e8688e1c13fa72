//! Structural checks on the chunk container before event parsing.

use melody::DecodeError;

const HEADER_MAGIC: &[u8; 4] = b"MThd";
const TRACK_MAGIC: &[u8; 4] = b"MTrk";
const CHUNK_HEADER_LEN: usize = 8;
const SMPTE_BIT: u16 = 0x8000;

/// What the header chunk and chunk walk found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerInfo {
    pub format: u16,
    pub declared_tracks: u16,
    pub ticks_per_quarter: u16,
    pub track_chunks: usize,
}

fn read_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([bytes[at], bytes[at + 1]])
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn format_error(message: impl Into<String>) -> DecodeError {
    DecodeError::Format(message.into())
}

/// Validate the `MThd` header and walk every chunk, checking that each
/// lies inside the buffer.
///
/// SMPTE time division is reported as unsupported rather than malformed.
pub fn check_container(bytes: &[u8]) -> Result<ContainerInfo, DecodeError> {
    if bytes.len() < 14 {
        return Err(format_error("file too short for a MIDI header"));
    }
    if &bytes[0..4] != HEADER_MAGIC {
        return Err(format_error("missing MThd header chunk"));
    }
    let header_len = read_u32(bytes, 4);
    if header_len != 6 {
        return Err(format_error(format!(
            "header chunk length is {}, expected 6",
            header_len
        )));
    }

    let format = read_u16(bytes, 8);
    if format > 2 {
        return Err(format_error(format!("unknown MIDI file format {}", format)));
    }
    let declared_tracks = read_u16(bytes, 10);
    let division = read_u16(bytes, 12);
    if division & SMPTE_BIT != 0 {
        return Err(DecodeError::UnsupportedFeature(
            "SMPTE time division".to_string(),
        ));
    }
    if division == 0 {
        return Err(format_error("time division of zero ticks per quarter note"));
    }

    let mut pos = 14;
    let mut track_chunks = 0;
    while pos < bytes.len() {
        if bytes.len() - pos < CHUNK_HEADER_LEN {
            return Err(format_error(format!("truncated chunk header at byte {}", pos)));
        }
        let magic = &bytes[pos..pos + 4];
        if !magic.iter().all(|b| b.is_ascii_alphanumeric()) {
            return Err(format_error(format!("bad chunk magic at byte {}", pos)));
        }
        let len = read_u32(bytes, pos + 4) as usize;
        let body = pos + CHUNK_HEADER_LEN;
        if bytes.len() - body < len {
            return Err(format_error(format!(
                "truncated chunk at byte {}: {} bytes declared, {} available",
                pos,
                len,
                bytes.len() - body
            )));
        }
        if magic == TRACK_MAGIC {
            track_chunks += 1;
        }
        pos = body + len;
    }

    if track_chunks < usize::from(declared_tracks) {
        return Err(format_error(format!(
            "header declares {} tracks, found {}",
            declared_tracks, track_chunks
        )));
    }

    Ok(ContainerInfo {
        format,
        declared_tracks,
        ticks_per_quarter: division,
        track_chunks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn header(format: u16, tracks: u16, division: u16) -> Vec<u8> {
        let mut bytes = b"MThd".to_vec();
        bytes.extend(6u32.to_be_bytes());
        bytes.extend(format.to_be_bytes());
        bytes.extend(tracks.to_be_bytes());
        bytes.extend(division.to_be_bytes());
        bytes
    }

    fn end_of_track_chunk() -> Vec<u8> {
        let mut bytes = b"MTrk".to_vec();
        bytes.extend(4u32.to_be_bytes());
        bytes.extend([0x00, 0xFF, 0x2F, 0x00]);
        bytes
    }

    #[test]
    fn accepts_minimal_file() {
        let mut bytes = header(0, 1, 480);
        bytes.extend(end_of_track_chunk());

        let info = check_container(&bytes).unwrap();
        assert_eq!(
            info,
            ContainerInfo {
                format: 0,
                declared_tracks: 1,
                ticks_per_quarter: 480,
                track_chunks: 1,
            }
        );
    }

    #[test]
    fn alien_chunks_are_skipped() {
        let mut bytes = header(1, 1, 96);
        bytes.extend(b"XFIH");
        bytes.extend(2u32.to_be_bytes());
        bytes.extend([1, 2]);
        bytes.extend(end_of_track_chunk());

        assert_eq!(check_container(&bytes).unwrap().track_chunks, 1);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = header(0, 1, 480);
        bytes[0] = b'X';
        assert!(matches!(check_container(&bytes), Err(DecodeError::Format(_))));
    }

    #[test]
    fn rejects_bad_header_length() {
        let mut bytes = header(0, 1, 480);
        bytes[7] = 8;
        bytes.extend([0, 0]);
        assert!(matches!(check_container(&bytes), Err(DecodeError::Format(_))));
    }

    #[test]
    fn smpte_is_unsupported() {
        let bytes = header(0, 1, 0xE728);
        assert_eq!(
            check_container(&bytes),
            Err(DecodeError::UnsupportedFeature("SMPTE time division".to_string()))
        );
    }

    #[test]
    fn rejects_truncated_chunk() {
        let mut bytes = header(0, 1, 480);
        let mut track = end_of_track_chunk();
        track.truncate(10);
        bytes.extend(track);
        assert!(matches!(check_container(&bytes), Err(DecodeError::Format(m)) if m.contains("truncated")));
    }

    #[test]
    fn rejects_missing_tracks() {
        let mut bytes = header(1, 2, 480);
        bytes.extend(end_of_track_chunk());
        assert!(matches!(check_container(&bytes), Err(DecodeError::Format(m)) if m.contains("declares 2")));
    }
}
