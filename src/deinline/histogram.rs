//! Suffix-array histogram (spec §4.G): finds the substring of code units
//! whose non-overlapping-occurrence count maximizes `count*len - count -
//! len`, the savings a single outlined procedure call (one call site byte
//! for each occurrence) buys over keeping the instructions inline.

/// `(frame_index << 16) | start_offset`, per spec §4.G's packed
/// representation. A `u16` frame index and a `u16` offset both fit the
/// 16-bit code-unit address space this crate's `Alphabet` already uses.
pub type PackedSuffix = u32;

#[must_use]
pub fn pack(frame_index: usize, start_offset: usize) -> PackedSuffix {
    debug_assert!(frame_index <= u16::MAX as usize);
    debug_assert!(start_offset <= u16::MAX as usize);
    ((frame_index as u32) << 16) | start_offset as u32
}

#[must_use]
pub fn unpack(suffix: PackedSuffix) -> (usize, usize) {
    ((suffix >> 16) as usize, (suffix & 0xFFFF) as usize)
}

/// Builds the suffix array over every frame's symbol stream, confined so
/// that no suffix crosses a frame boundary.
#[must_use]
pub fn build_suffix_array(frames: &[&[u16]]) -> Vec<PackedSuffix> {
    let mut suffixes = Vec::new();
    for (frame_index, frame) in frames.iter().enumerate() {
        for start_offset in 0..frame.len() {
            suffixes.push(pack(frame_index, start_offset));
        }
    }
    suffixes.sort_by(|&a, &b| {
        let (fa, sa) = unpack(a);
        let (fb, sb) = unpack(b);
        frames[fa][sa..].cmp(&frames[fb][sb..])
    });
    suffixes
}

fn suffix_slice<'a>(frames: &[&'a [u16]], suffix: PackedSuffix, len: usize) -> Option<&'a [u16]> {
    let (frame_index, start_offset) = unpack(suffix);
    let frame = frames[frame_index];
    if start_offset + len > frame.len() {
        return None;
    }
    Some(&frame[start_offset..start_offset + len])
}

/// Greedy earliest-start-first non-overlapping count for a single frame's
/// occurrence start offsets (already sorted ascending), per spec §4.G's
/// counting rule `|start - prev_start_for(frame, len)| >= len`.
#[must_use]
pub fn count_non_overlapping(starts: &[usize], len: usize) -> usize {
    let mut count = 0;
    let mut prev_start: Option<usize> = None;
    for &start in starts {
        let accepted = match prev_start {
            None => true,
            Some(prev) => start >= prev + len,
        };
        if accepted {
            count += 1;
            prev_start = Some(start);
        }
    }
    count
}

#[must_use]
pub fn score(count: usize, length: usize) -> i64 {
    let count = count as i64;
    let length = length as i64;
    count * length - count - length
}

#[derive(Debug, Clone)]
pub struct Winner {
    pub substring: Vec<u16>,
    pub count: usize,
    pub score: i64,
}

/// Walks the sorted suffix array once per candidate length, grouping
/// contiguous runs that share an `len`-long prefix (suffixes sharing a
/// common prefix sort contiguously), and keeps the first-seen highest
/// score (spec §4.G's "first to reach that score" tie-break).
#[must_use]
pub fn find_winner(frames: &[&[u16]]) -> Option<Winner> {
    let suffix_array = build_suffix_array(frames);
    let max_len = frames.iter().map(|f| f.len()).max().unwrap_or(0);
    if max_len == 0 {
        return None;
    }

    let mut best: Option<Winner> = None;

    for len in 1..=max_len {
        let mut run_start = 0;
        while run_start < suffix_array.len() {
            let Some(anchor) = suffix_slice(frames, suffix_array[run_start], len) else {
                run_start += 1;
                continue;
            };
            let mut run_end = run_start + 1;
            while run_end < suffix_array.len()
                && suffix_slice(frames, suffix_array[run_end], len) == Some(anchor)
            {
                run_end += 1;
            }

            let mut by_frame: std::collections::BTreeMap<usize, Vec<usize>> =
                std::collections::BTreeMap::new();
            for &suffix in &suffix_array[run_start..run_end] {
                let (frame_index, start_offset) = unpack(suffix);
                by_frame.entry(frame_index).or_default().push(start_offset);
            }

            let total_count: usize = by_frame
                .values()
                .map(|starts| count_non_overlapping(starts, len))
                .sum();
            let candidate_score = score(total_count, len);

            if candidate_score > 0 {
                let better = match &best {
                    None => true,
                    Some(current) => candidate_score > current.score,
                };
                if better {
                    best = Some(Winner {
                        substring: anchor.to_vec(),
                        count: total_count,
                        score: candidate_score,
                    });
                }
            }

            run_start = run_end;
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_unpack_roundtrips() {
        assert_eq!(unpack(pack(3, 7)), (3, 7));
        assert_eq!(unpack(pack(0, 0)), (0, 0));
    }

    #[test]
    fn repeated_whole_frame_wins() {
        let frame: &[u16] = &[1, 2, 3];
        let frames = [frame, frame, frame];
        let winner = find_winner(&frames).expect("a positive-score winner");
        assert_eq!(winner.substring, vec![1, 2, 3]);
        assert_eq!(winner.count, 3);
        assert_eq!(winner.score, 3);
    }

    #[test]
    fn single_frame_of_identical_symbols_never_extracts() {
        let frame: &[u16] = &[9, 9, 9, 9];
        let frames = [frame];
        assert!(find_winner(&frames).is_none());
    }

    #[test]
    fn empty_frames_have_no_winner() {
        let empty: &[u16] = &[];
        let frames = [empty];
        assert!(find_winner(&frames).is_none());
    }

    #[test]
    fn non_overlapping_count_respects_window_stride() {
        // Occurrences at 0, 1, 2 of a length-2 substring: only 0 and 2 are
        // non-overlapping.
        assert_eq!(count_non_overlapping(&[0, 1, 2], 2), 2);
        assert_eq!(count_non_overlapping(&[0, 2, 4], 2), 3);
    }
}
