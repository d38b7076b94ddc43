//! JPEG marker-segment scan used as the fast-read path: locate an
//! embedded EXIF preview thumbnail and the frame dimensions inside a
//! byte prefix, without decoding the image.

/// How much of a JPEG file is read for the thumbnail scan.
pub const THUMB_SCAN_BYTES: usize = 80 * 1024;

const EXIF_SIGNATURE: &[u8] = b"Exif\0\0";

/// Byte bounds of an embedded thumbnail (inclusive of its SOI/EOI marker
/// pairs) plus the full image's dimensions from the SOF0 header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmbeddedThumbnail {
    pub start: usize,
    pub end: usize,
    pub width: u32,
    pub height: u32,
}

/// Walk JPEG marker segments from the start of `bytes`. Returns a result
/// only when both an embedded thumbnail range and nonzero frame
/// dimensions were found; any truncated read ends the walk early.
pub fn locate_thumbnail(bytes: &[u8]) -> Option<EmbeddedThumbnail> {
    let mut thumb_start: Option<usize> = None;
    let mut thumb_end: Option<usize> = None;
    let mut width: Option<u32> = None;
    let mut height: Option<u32> = None;

    let mut i = 0usize;
    while i < bytes.len() {
        // Fill bytes: any run of 0xFF padding before the marker byte.
        while i < bytes.len() && bytes[i] == 0xFF {
            i += 1;
        }
        if i >= bytes.len() {
            break;
        }
        let marker = bytes[i];
        i += 1;

        match marker {
            0xD0..=0xD7 => continue, // RSTn
            0xD8 => continue,        // SOI
            0xD9 => break,           // EOI
            0x01 => continue,        // TEM
            0x00 => continue,        // escaped 0xFF data byte
            _ => {}
        }

        if i + 2 > bytes.len() {
            break;
        }
        let len = u16::from_be_bytes([bytes[i], bytes[i + 1]]) as usize;
        i += 2;
        if len < 2 {
            break;
        }

        if marker == 0xE1 && bytes.len() >= i + EXIF_SIGNATURE.len()
            && &bytes[i..i + EXIF_SIGNATURE.len()] == EXIF_SIGNATURE
        {
            // Search the APP1 payload for a nested SOI .. EOI pair.
            let seg_end = (i + len - 2).min(bytes.len());
            let mut j = i + EXIF_SIGNATURE.len();
            while j + 1 < seg_end {
                if bytes[j] == 0xFF {
                    if thumb_start.is_none() {
                        if bytes[j + 1] == 0xD8 {
                            thumb_start = Some(j);
                        }
                    } else if bytes[j + 1] == 0xD9 {
                        thumb_end = Some(j + 2);
                        break;
                    }
                }
                j += 1;
            }
        }

        if marker == 0xC0 {
            // Baseline SOF0: height then width, big-endian, after the
            // precision byte. The only dimensions available pre-decode.
            if i + 5 > bytes.len() {
                break;
            }
            height = Some(u16::from_be_bytes([bytes[i + 1], bytes[i + 2]]) as u32);
            width = Some(u16::from_be_bytes([bytes[i + 3], bytes[i + 4]]) as u32);
            break;
        }

        i += len - 2;
    }

    match (thumb_start, thumb_end, width, height) {
        (Some(start), Some(end), Some(width), Some(height)) if width > 0 && height > 0 => {
            Some(EmbeddedThumbnail {
                start,
                end,
                width,
                height,
            })
        }
        _ => None,
    }
}
