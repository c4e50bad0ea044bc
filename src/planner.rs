//! Window planning
//!
//! Splits a [`DateRange`] into the sequence of [`TimeWindow`]s requested from the
//! export endpoint, one per [`TimeUnit`] step. Windows are unit-aligned except the
//! first and last, which are clamped to the exact range bounds.

use crate::types::{DateRange, TimeUnit, TimeWindow};
use tracing::debug;

/// Plan the windows covering `range` at `unit` granularity
///
/// A window whose floor and last hour coincide (every hour-granular window) is
/// widened to end one unit after the cursor, so no window has `start == end`.
/// The final clamp can collapse a trailing hour window back onto a single hour;
/// that hour is already covered by the previous widened window and is dropped.
pub fn plan(range: &DateRange, unit: TimeUnit) -> Vec<TimeWindow> {
    let range_start = range.start_instant();
    let range_end = range.end_instant();
    let count = unit.whole_units_between(range_start, range_end) + 1;

    let mut windows = Vec::with_capacity(usize::try_from(count).unwrap_or_default());
    let mut cursor = range_start;

    for _ in 0..count {
        let start = unit.floor(cursor);
        let mut end = unit.last_hour(cursor);
        let next = unit.advance(cursor);

        if start == end {
            end = next.unwrap_or(end);
        }
        windows.push(TimeWindow { start, end, unit });

        match next {
            Some(next) => cursor = next,
            None => break,
        }
    }

    if let Some(first) = windows.first_mut() {
        first.start = range_start;
    }
    if let Some(last) = windows.last_mut() {
        last.end = range_end;
    }
    if windows.len() > 1 && windows.last().is_some_and(|w| w.start >= w.end) {
        windows.pop();
    }

    debug!(
        start = %range.start(),
        end = %range.end(),
        %unit,
        windows = windows.len(),
        "planned export windows"
    );

    windows
}
