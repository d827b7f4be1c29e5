//! Fractional order-key allocation for in-group moves.
//!
//! Moving a row costs one key write: first position gets one less than the
//! old first key, last gets one more than the old last, anywhere else gets
//! the midpoint of its new neighbors. Repeated midpoint insertion eventually
//! exhausts float precision; the allocator detects that and asks the caller
//! to renumber the group instead.

/// Result of allocating an order key for a move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Allocation {
    /// Use this key for the moved row.
    At(f64),
    /// No key strictly between the new neighbors exists; renumber the group.
    Renumber,
}

/// Compute the order key for the row now sitting at `pos` in `orders`.
///
/// `orders` is the group's keys in display order, including the moved row's
/// stale key at `pos`. The stale value at `pos` is ignored; only the
/// neighbors matter.
pub fn allocate(orders: &[f64], pos: usize) -> Allocation {
    debug_assert!(pos < orders.len());
    if orders.len() <= 1 {
        return Allocation::At(0.0);
    }
    if pos == 0 {
        let next = orders[1];
        let key = next - 1.0;
        if key >= next {
            return Allocation::Renumber;
        }
        return Allocation::At(key);
    }
    if pos == orders.len() - 1 {
        let prev = orders[orders.len() - 2];
        let key = prev + 1.0;
        if key <= prev {
            return Allocation::Renumber;
        }
        return Allocation::At(key);
    }
    let prev = orders[pos - 1];
    let next = orders[pos + 1];
    let mid = (prev + next) / 2.0;
    if mid <= prev || mid >= next {
        return Allocation::Renumber;
    }
    Allocation::At(mid)
}

/// Fresh evenly spaced keys for a group of `len` rows: 1.0, 2.0, …
pub fn renumber(len: usize) -> Vec<f64> {
    (1..=len).map(|i| i as f64).collect()
}
