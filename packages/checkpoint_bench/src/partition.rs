use std::num::NonZero;
use std::ops::Range;

use num_integer::Integer;

/// Returns the contiguous share of `0..total` that belongs to member `index` of `parts` members.
///
/// Every member gets `total / parts` items, in member order. The last member additionally
/// absorbs the remainder of the division, so the ranges of all members are disjoint and
/// together cover exactly `0..total`. Members may receive empty ranges when `total < parts`.
///
/// # Panics
///
/// Panics if `index` is not less than `parts`.
///
/// # Examples
///
/// ```
/// use checkpoint_bench::partition_range;
/// use new_zealand::nz;
///
/// assert_eq!(partition_range(10, nz!(3), 0), 0..3);
/// assert_eq!(partition_range(10, nz!(3), 1), 3..6);
/// assert_eq!(partition_range(10, nz!(3), 2), 6..10);
/// ```
#[must_use]
pub fn partition_range(total: usize, parts: NonZero<usize>, index: usize) -> Range<usize> {
    assert!(
        index < parts.get(),
        "member index {index} is out of bounds for a team of {parts}"
    );

    let (chunk, _) = total.div_rem(&parts.get());

    // Cannot overflow: index < parts, so index * chunk <= parts * chunk <= total.
    let start = index.wrapping_mul(chunk);

    let end = if index == parts.get().wrapping_sub(1) {
        total
    } else {
        start.wrapping_add(chunk)
    };

    start..end
}
