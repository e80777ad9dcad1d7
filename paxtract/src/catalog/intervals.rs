//! Episode interval expressions such as `"1-3,5,8:9"`.

use std::collections::BTreeSet;

/// Parse an interval list into inclusive `(low, high)` pairs sorted by `low`.
///
/// Pieces are separated by `,`; bounds by `-` or `:`. Non-numeric bounds are
/// ignored, a piece with no numeric bound is dropped, and a single number `n`
/// becomes `(n, n)`. Reversed bounds are normalized.
pub fn parse_intervals(text: &str) -> Vec<(u32, u32)> {
    let mut intervals: Vec<(u32, u32)> = text
        .split(',')
        .filter_map(|piece| {
            let bounds: Vec<u32> = piece
                .split(['-', ':'])
                .filter_map(|b| b.trim().parse().ok())
                .collect();
            let low = bounds.iter().min()?;
            let high = bounds.iter().max()?;
            Some((*low, *high))
        })
        .collect();
    intervals.sort_by_key(|(low, _)| *low);
    intervals
}

/// Clamp every interval into `[min, max]`, dropping the ones entirely outside.
pub fn clamp_intervals(intervals: &[(u32, u32)], min: u32, max: u32) -> Vec<(u32, u32)> {
    intervals
        .iter()
        .filter(|(low, high)| *high >= min && *low <= max)
        .map(|(low, high)| ((*low).max(min), (*high).min(max)))
        .collect()
}

/// Numbers of `known` falling inside any of `intervals`, ascending.
pub fn episodes_in_intervals(known: &[u32], intervals: &[(u32, u32)]) -> BTreeSet<u32> {
    known
        .iter()
        .copied()
        .filter(|n| intervals.iter().any(|&(low, high)| (low..=high).contains(n)))
        .collect()
}
