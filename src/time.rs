// Microsecond time source and wraparound-safe arithmetic
//
// The counter is a free-running u32 that wraps roughly every 71.6
// minutes. Never compare two readings with `<` or subtract them as
// signed values: every comparison below is modular.
//
//   elapsed      unsigned distance from `since` forward to `now`
//   span         like elapsed, but 0 if the clock stepped backward
//   offset       signed distance, valid while |distance| < 2^31
//   has_reached  `now` is at or past `deadline`
//   earliest     the deadline closest to (or furthest behind) `now`

/// Microsecond timestamp from the time source.
pub type Micros = u32;

/// A monotonic, wrapping microsecond counter.
///
/// Any `Fn() -> Micros` is a clock, so closures and plain functions can
/// be handed to the scheduler directly.
pub trait Clock {
    fn now(&self) -> Micros;
}

impl<F> Clock for F
where
    F: Fn() -> Micros,
{
    #[inline]
    fn now(&self) -> Micros {
        self()
    }
}

/// Time elapsed from `since` to `now`, modulo 2^32.
#[inline]
pub const fn elapsed(since: Micros, now: Micros) -> Micros {
    now.wrapping_sub(since)
}

/// Duration between two readings taken in order. A reading that went
/// backward gives 0 instead of wrapping to ~2^32.
#[inline]
pub const fn span(start: Micros, end: Micros) -> Micros {
    let d = offset(start, end);
    if d < 0 { 0 } else { d as Micros }
}

/// Signed distance from `from` to `to`.
#[inline]
pub const fn offset(from: Micros, to: Micros) -> i32 {
    to.wrapping_sub(from) as i32
}

#[inline]
pub const fn has_reached(now: Micros, deadline: Micros) -> bool {
    offset(deadline, now) >= 0
}

/// Pick whichever of `a` and `b` comes first as seen from `now`.
/// Ties keep `a`.
#[inline]
pub const fn earliest(now: Micros, a: Micros, b: Micros) -> Micros {
    if offset(now, b) < offset(now, a) { b } else { a }
}
