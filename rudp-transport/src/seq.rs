//! Wrap-around-safe sequence number comparisons.
//!
//! Sequence and acknowledgement numbers live on a ring of 2^32 values.  Two
//! numbers are ordered by the signed distance between them: `a` is before `b`
//! when walking forward from `a` reaches `b` in fewer than `2^31` steps.  The
//! comparisons are meaningful as long as every pair of live sequence numbers
//! is less than `u32::MAX / 2` apart, which the window limits guarantee.
//!
//! Never compare sequence numbers with raw `<` / `>`.

/// `a` strictly precedes `b`.
#[inline]
pub fn seq_lt(a: u32, b: u32) -> bool {
    (a.wrapping_sub(b) as i32) < 0
}

/// `a` precedes or equals `b`.
#[inline]
pub fn seq_le(a: u32, b: u32) -> bool {
    (a.wrapping_sub(b) as i32) <= 0
}

/// `a` strictly follows `b`.
#[inline]
pub fn seq_gt(a: u32, b: u32) -> bool {
    seq_lt(b, a)
}
