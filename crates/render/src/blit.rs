//! Row-by-row RGBA8 region copies and the validation every tier applies
//! before painting.

use farview_common::{BYTES_PER_PIXEL, RegionRect};

/// The paint-input invariant: both dimensions non-zero and the payload is
/// exactly `width * height * 4` bytes. Input failing this is silently
/// dropped by every backend.
pub fn payload_matches(rect: &RegionRect, pixels: &[u8]) -> bool {
    rect.is_well_formed() && pixels.len() == rect.byte_len()
}

/// Copy an RGBA8 region into a `dst_width * dst_height` store.
///
/// Returns `false` without touching `dst` when the rect/payload pair is
/// malformed, the rect does not fit the store, or `dst` has the wrong
/// length. Keeping rectangles in bounds is the caller's job; this guard only
/// ensures a lying caller cannot crash the paint path.
pub fn copy_region(
    dst: &mut [u8],
    dst_width: u32,
    dst_height: u32,
    rect: RegionRect,
    src: &[u8],
) -> bool {
    if !payload_matches(&rect, src) || !rect.fits_within(dst_width, dst_height) {
        return false;
    }
    if dst.len() != dst_width as usize * dst_height as usize * BYTES_PER_PIXEL {
        return false;
    }

    let row_bytes = rect.width as usize * BYTES_PER_PIXEL;
    let dst_stride = dst_width as usize * BYTES_PER_PIXEL;
    let x_offset = rect.x as usize * BYTES_PER_PIXEL;
    for row in 0..rect.height as usize {
        let src_start = row * row_bytes;
        let dst_start = (rect.y as usize + row) * dst_stride + x_offset;
        dst[dst_start..dst_start + row_bytes].copy_from_slice(&src[src_start..src_start + row_bytes]);
    }
    true
}

/// Read a region out of a `src_width * src_height` store. `None` when the
/// rect is malformed or out of bounds.
pub fn read_region(src: &[u8], src_width: u32, src_height: u32, rect: RegionRect) -> Option<Vec<u8>> {
    if !rect.is_well_formed() || !rect.fits_within(src_width, src_height) {
        return None;
    }
    if src.len() != src_width as usize * src_height as usize * BYTES_PER_PIXEL {
        return None;
    }

    let row_bytes = rect.width as usize * BYTES_PER_PIXEL;
    let src_stride = src_width as usize * BYTES_PER_PIXEL;
    let x_offset = rect.x as usize * BYTES_PER_PIXEL;
    let mut out = Vec::with_capacity(rect.byte_len());
    for row in 0..rect.height as usize {
        let start = (rect.y as usize + row) * src_stride + x_offset;
        out.extend_from_slice(&src[start..start + row_bytes]);
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(w: u32, h: u32, px: [u8; 4]) -> Vec<u8> {
        px.repeat((w * h) as usize)
    }

    #[test]
    fn copy_then_read_round_trips() {
        let mut store = vec![0u8; 8 * 8 * 4];
        let red = solid(2, 2, [255, 0, 0, 255]);
        assert!(copy_region(&mut store, 8, 8, RegionRect::new(3, 4, 2, 2), &red));
        assert_eq!(
            read_region(&store, 8, 8, RegionRect::new(3, 4, 2, 2)).unwrap(),
            red
        );
        // Neighbouring pixel untouched.
        assert_eq!(
            read_region(&store, 8, 8, RegionRect::new(2, 4, 1, 1)).unwrap(),
            vec![0, 0, 0, 0]
        );
    }

    #[test]
    fn malformed_input_copies_nothing() {
        let mut store = vec![0u8; 4 * 4 * 4];
        let before = store.clone();

        // Zero dimension.
        assert!(!copy_region(&mut store, 4, 4, RegionRect::new(0, 0, 0, 2), &[]));
        // Undersized payload.
        assert!(!copy_region(
            &mut store,
            4,
            4,
            RegionRect::new(0, 0, 2, 2),
            &[1, 2, 3]
        ));
        // Out of bounds.
        let px = solid(2, 2, [9, 9, 9, 9]);
        assert!(!copy_region(&mut store, 4, 4, RegionRect::new(3, 3, 2, 2), &px));

        assert_eq!(store, before);
    }

    #[test]
    fn read_rejects_out_of_bounds() {
        let store = vec![0u8; 4 * 4 * 4];
        assert!(read_region(&store, 4, 4, RegionRect::new(4, 0, 1, 1)).is_none());
        assert!(read_region(&store, 4, 4, RegionRect::new(0, 0, 0, 1)).is_none());
        assert!(read_region(&store, 4, 4, RegionRect::new(0, 0, 4, 4)).is_some());
    }
}
