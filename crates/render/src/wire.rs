//! Private wire format for the worker-thread boundary.
//!
//! Each rectangle is an 8-byte little-endian header
//! `(x: u16, y: u16, w: u16, h: u16)` followed immediately by `w * h * 4`
//! raw RGBA bytes. Rectangles are concatenated into one batch buffer per
//! present. This format crosses only the control/worker thread boundary; it
//! is not an external file or network format.

use farview_common::RegionRect;

pub const HEADER_LEN: usize = 8;

/// Largest coordinate or dimension the u16 header can carry.
pub const MAX_COORD: u32 = u16::MAX as u32;

/// Whether every header field fits the u16 wire encoding. Rects that do not
/// are malformed input for the worker tier.
pub fn encodable(rect: &RegionRect) -> bool {
    rect.x <= MAX_COORD && rect.y <= MAX_COORD && rect.width <= MAX_COORD && rect.height <= MAX_COORD
}

/// Append one encoded rectangle to a batch buffer. The caller has already
/// validated the rect/payload pair.
pub fn encode_into(out: &mut Vec<u8>, rect: RegionRect, pixels: &[u8]) {
    debug_assert!(encodable(&rect));
    debug_assert_eq!(pixels.len(), rect.byte_len());
    out.reserve(HEADER_LEN + pixels.len());
    out.extend_from_slice(&(rect.x as u16).to_le_bytes());
    out.extend_from_slice(&(rect.y as u16).to_le_bytes());
    out.extend_from_slice(&(rect.width as u16).to_le_bytes());
    out.extend_from_slice(&(rect.height as u16).to_le_bytes());
    out.extend_from_slice(pixels);
}

/// Sequential reader over a frames batch.
///
/// Zero-dimension records are skipped (their payload length is zero, so the
/// record boundary is still known); a truncated record terminates the batch
/// and the remainder is discarded.
pub struct BatchReader<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> BatchReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, offset: 0 }
    }
}

impl<'a> Iterator for BatchReader<'a> {
    type Item = (RegionRect, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let rest = &self.buf[self.offset..];
            if rest.is_empty() {
                return None;
            }
            if rest.len() < HEADER_LEN {
                tracing::debug!(remaining = rest.len(), "discarding truncated batch header");
                self.offset = self.buf.len();
                return None;
            }

            let x = u16::from_le_bytes([rest[0], rest[1]]) as u32;
            let y = u16::from_le_bytes([rest[2], rest[3]]) as u32;
            let width = u16::from_le_bytes([rest[4], rest[5]]) as u32;
            let height = u16::from_le_bytes([rest[6], rest[7]]) as u32;
            let rect = RegionRect::new(x, y, width, height);

            if !rect.is_well_formed() {
                tracing::debug!(?rect, "skipping zero-dimension batch record");
                self.offset += HEADER_LEN;
                continue;
            }

            let payload_len = rect.byte_len();
            if rest.len() < HEADER_LEN + payload_len {
                tracing::debug!(
                    ?rect,
                    remaining = rest.len(),
                    "discarding truncated batch payload"
                );
                self.offset = self.buf.len();
                return None;
            }

            self.offset += HEADER_LEN + payload_len;
            return Some((rect, &rest[HEADER_LEN..HEADER_LEN + payload_len]));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(w: u32, h: u32, px: [u8; 4]) -> Vec<u8> {
        px.repeat((w * h) as usize)
    }

    #[test]
    fn batch_preserves_order_and_payloads() {
        let mut batch = Vec::new();
        let a = solid(2, 1, [1, 1, 1, 1]);
        let b = solid(1, 3, [2, 2, 2, 2]);
        encode_into(&mut batch, RegionRect::new(10, 20, 2, 1), &a);
        encode_into(&mut batch, RegionRect::new(30, 40, 1, 3), &b);

        let decoded: Vec<_> = BatchReader::new(&batch).collect();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].0, RegionRect::new(10, 20, 2, 1));
        assert_eq!(decoded[0].1, &a[..]);
        assert_eq!(decoded[1].0, RegionRect::new(30, 40, 1, 3));
        assert_eq!(decoded[1].1, &b[..]);
    }

    #[test]
    fn header_is_eight_bytes_little_endian() {
        let mut batch = Vec::new();
        encode_into(&mut batch, RegionRect::new(0x0201, 0x0403, 1, 1), &[9; 4]);
        assert_eq!(&batch[..HEADER_LEN], &[0x01, 0x02, 0x03, 0x04, 1, 0, 1, 0]);
        assert_eq!(batch.len(), HEADER_LEN + 4);
    }

    #[test]
    fn truncated_payload_discards_the_remainder() {
        let mut batch = Vec::new();
        encode_into(&mut batch, RegionRect::new(0, 0, 2, 2), &solid(2, 2, [5; 4]));
        batch.truncate(HEADER_LEN + 7);
        assert_eq!(BatchReader::new(&batch).count(), 0);
    }

    #[test]
    fn zero_dimension_record_is_skipped_not_fatal() {
        let mut batch = Vec::new();
        // Hand-rolled zero-height record.
        batch.extend_from_slice(&[0, 0, 0, 0, 1, 0, 0, 0]);
        encode_into(&mut batch, RegionRect::new(1, 1, 1, 1), &[7; 4]);

        let decoded: Vec<_> = BatchReader::new(&batch).collect();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].0, RegionRect::new(1, 1, 1, 1));
    }

    #[test]
    fn oversized_coordinates_are_not_encodable() {
        assert!(!encodable(&RegionRect::new(65536, 0, 1, 1)));
        assert!(!encodable(&RegionRect::new(0, 0, 1, 65536)));
        assert!(encodable(&RegionRect::new(65535, 65535, 65535, 65535)));
    }

    #[test]
    fn empty_batch_decodes_to_nothing() {
        assert_eq!(BatchReader::new(&[]).count(), 0);
    }
}
