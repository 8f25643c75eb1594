use gabbro_shared::coords::CHUNK_SIZE;

/// Sweep one 64x64 face plane into maximal rectangles: widest run of set
/// bits first, then grown downward while every following row repeats the
/// run. Consumed bits are cleared, the seed row included, so the plane
/// reads all-zero afterwards and emission never repeats a cell. The order
/// is deterministic: rows top to bottom, runs left to right.
///
/// `emit` receives `(x, y, width, height)` in plane-local coordinates.
pub fn pack_plane<F: FnMut(u32, u32, u32, u32)>(plane: &mut [u64], mut emit: F) {
    debug_assert_eq!(plane.len(), CHUNK_SIZE);

    for y in 0..CHUNK_SIZE {
        let row = plane[y];
        if row == 0 {
            continue;
        }

        let mut x = row.trailing_zeros();
        while x < 64 {
            let width = (!(row >> x)).trailing_zeros();
            let mask = (u64::MAX >> (64 - width)) << x;
            plane[y] &= !mask;

            let mut height = 1u32;
            while y + (height as usize) < CHUNK_SIZE {
                let below = &mut plane[y + height as usize];
                if *below & mask != mask {
                    break;
                }
                *below &= !mask;
                height += 1;
            }

            emit(x, y as u32, width, height);

            x += width;
            if x >= 64 {
                break;
            }
            let rest = row >> x;
            if rest == 0 {
                break;
            }
            x += rest.trailing_zeros();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::pack_plane;

    fn collect(plane: &mut [u64]) -> Vec<(u32, u32, u32, u32)> {
        let mut rects = Vec::new();
        pack_plane(plane, |x, y, w, h| rects.push((x, y, w, h)));
        rects
    }

    #[test]
    fn single_bit_becomes_a_unit_rect() {
        let mut plane = [0u64; 64];
        plane[5] = 1 << 9;
        assert_eq!(collect(&mut plane), vec![(9, 5, 1, 1)]);
        assert!(plane.iter().all(|&row| row == 0));
    }

    #[test]
    fn full_plane_becomes_one_rect() {
        let mut plane = [u64::MAX; 64];
        assert_eq!(collect(&mut plane), vec![(0, 0, 64, 64)]);
        assert!(plane.iter().all(|&row| row == 0));
    }

    #[test]
    fn width_wins_before_height() {
        // Row 0 holds a 4-run, rows 1..3 only a 2-run under its left end:
        // the packer takes the full width first, then a 2x2 below.
        let mut plane = [0u64; 64];
        plane[0] = 0b1111;
        plane[1] = 0b0011;
        plane[2] = 0b0011;
        assert_eq!(collect(&mut plane), vec![(0, 0, 4, 1), (0, 1, 2, 2)]);
    }

    #[test]
    fn split_runs_in_one_row_stay_separate() {
        let mut plane = [0u64; 64];
        plane[3] = 0b1110_0111;
        assert_eq!(collect(&mut plane), vec![(0, 3, 3, 1), (5, 3, 3, 1)]);
    }

    #[test]
    fn tall_column_grows_to_full_height() {
        let mut plane = [0u64; 64];
        for row in plane.iter_mut() {
            *row = 1 << 31;
        }
        assert_eq!(collect(&mut plane), vec![(31, 0, 1, 64)]);
    }

    #[test]
    fn rects_cover_exactly_the_set_bits_without_overlap() {
        // Pseudo-random plane from a fixed multiplicative generator.
        let mut plane = [0u64; 64];
        let mut state = 0x9e37_79b9_7f4a_7c15u64;
        for row in plane.iter_mut() {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            *row = state & state.rotate_left(17);
        }
        let original = plane;

        let mut covered = [0u64; 64];
        pack_plane(&mut plane, |x, y, w, h| {
            let mask = (u64::MAX >> (64 - w)) << x;
            for row in covered.iter_mut().skip(y as usize).take(h as usize) {
                assert_eq!(*row & mask, 0, "rectangles must not overlap");
                *row |= mask;
            }
        });

        assert_eq!(covered, original, "rectangles must cover every set bit");
    }

    #[test]
    fn emitted_rects_cannot_extend_into_remaining_bits() {
        let mut plane = [0u64; 64];
        let mut state = 0x0123_4567_89ab_cdefu64;
        for row in plane.iter_mut() {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            *row = state & (state >> 13);
        }

        // Track what is still unconsumed as packing proceeds; each rect
        // must be blocked on its right and bottom edges at emission time.
        let mut remaining = plane;
        pack_plane(&mut plane, |x, y, w, h| {
            let mask = (u64::MAX >> (64 - w)) << x;
            if x + w < 64 {
                // The seed row ends the run, so widening must hit a hole there.
                let right = 1u64 << (x + w);
                assert_eq!(
                    remaining[y as usize] & right,
                    0,
                    "rect at ({x}, {y}) could grow wider"
                );
            }
            if (y + h) < 64 {
                let below = remaining[(y + h) as usize];
                assert_ne!(below & mask, mask, "rect at ({x}, {y}) could grow taller");
            }
            for row in remaining.iter_mut().skip(y as usize).take(h as usize) {
                *row &= !mask;
            }
        });
    }
}
