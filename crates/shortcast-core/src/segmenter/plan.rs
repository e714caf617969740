//! Part planning: split a duration into bounded, contiguous time ranges.

/// Remainders shorter than this (seconds) are folded away instead of
/// becoming a part of their own; probe durations carry float noise.
pub const MIN_TAIL_SECS: f64 = 0.001;

/// A single planned part: time range `[start, start + length)`, 1-based index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PartSpan {
    pub index: u32,
    pub start_secs: f64,
    pub length_secs: f64,
}

impl PartSpan {
    pub fn end_secs(&self) -> f64 {
        self.start_secs + self.length_secs
    }
}

/// Number of parts needed for `duration` with parts of at most `max_part_secs`.
///
/// Durations that are not positive and finite count as one part (the whole file).
pub fn part_count(duration: f64, max_part_secs: f64) -> u32 {
    if !(duration.is_finite() && duration > 0.0) || duration <= max_part_secs {
        return 1;
    }
    let full = (duration / max_part_secs).floor();
    let tail = duration - full * max_part_secs;
    let n = if tail >= MIN_TAIL_SECS { full + 1.0 } else { full };
    (n as u32).max(1)
}

/// Builds the part plan for `duration`.
///
/// Parts are `max_part_secs` long except the last, which covers the remainder.
/// A single part spans the whole duration.
pub fn plan_parts(duration: f64, max_part_secs: f64) -> Vec<PartSpan> {
    let n = part_count(duration, max_part_secs);
    if n == 1 {
        let length_secs = if duration.is_finite() && duration > 0.0 {
            duration
        } else {
            max_part_secs
        };
        return vec![PartSpan {
            index: 1,
            start_secs: 0.0,
            length_secs,
        }];
    }

    (1..=n)
        .map(|index| {
            let start_secs = f64::from(index - 1) * max_part_secs;
            let end = (f64::from(index) * max_part_secs).min(duration);
            PartSpan {
                index,
                start_secs,
                length_secs: end - start_secs,
            }
        })
        .collect()
}
