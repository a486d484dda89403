//! Stateless SCAN cursors
//!
//! Each call sorts the full candidate set, takes the window that starts at
//! the bit-reversed cursor and returns the bit-reversed end of that window
//! as the next cursor. Filters run on the window afterwards, so COUNT bounds
//! the candidates examined, not the matches returned.

/// Reverse the low `bits` bits of `value`; higher bits are dropped
pub fn reverse_bits(value: u64, bits: u32) -> u64 {
    match bits {
        0 => 0,
        b if b >= 64 => value.reverse_bits(),
        _ => (value & ((1u64 << bits) - 1)).reverse_bits() >> (64 - bits),
    }
}

/// Number of cursor bits for a set of `len` candidates
pub fn cursor_bits(len: usize) -> u32 {
    if len <= 1 {
        0
    } else {
        usize::BITS - (len - 1).leading_zeros()
    }
}

/// One page of a scan: the next cursor (0 when done) and the candidate window
pub fn window<T>(sorted: &[T], cursor: u64, count: usize) -> (u64, &[T]) {
    let bits = cursor_bits(sorted.len());
    let start = reverse_bits(cursor, bits);
    if start >= sorted.len() as u64 {
        return (0, &[]);
    }

    let start = start as usize;
    let end = start.saturating_add(count.max(1));
    if end >= sorted.len() {
        (0, &sorted[start..])
    } else {
        (reverse_bits(end as u64, bits), &sorted[start..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reverse_bits() {
        assert_eq!(reverse_bits(0b001, 3), 0b100);
        assert_eq!(reverse_bits(0b110, 3), 0b011);
        assert_eq!(reverse_bits(0, 0), 0);
        assert_eq!(reverse_bits(1, 0), 0);
        // only the low bits count
        assert_eq!(reverse_bits(0b1100, 2), 0);
        assert_eq!(reverse_bits(0b101, 2), 0b10);
    }

    #[test]
    fn test_cursor_bits() {
        assert_eq!(cursor_bits(0), 0);
        assert_eq!(cursor_bits(1), 0);
        assert_eq!(cursor_bits(2), 1);
        assert_eq!(cursor_bits(5), 3);
        assert_eq!(cursor_bits(8), 3);
        assert_eq!(cursor_bits(9), 4);
    }

    #[test]
    fn test_full_cycle_visits_everything_once() {
        let keys: Vec<u32> = (0..37).collect();
        let mut seen = Vec::new();
        let mut cursor = 0;
        loop {
            let (next, page) = window(&keys, cursor, 5);
            seen.extend_from_slice(page);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        seen.sort();
        assert_eq!(seen, keys);
    }

    #[test]
    fn test_out_of_range_cursor_ends_scan() {
        let keys = vec![1, 2, 3];
        let (next, page) = window(&keys, 3, 10);
        assert_eq!(next, 0);
        assert!(page.is_empty());
    }

    #[test]
    fn test_stale_cursor_keeps_low_bits() {
        // a cursor handed out while the set was larger
        let keys = vec!['a', 'b', 'c', 'd'];
        let (next, page) = window(&keys, 0b101, 10);
        assert_eq!(next, 0);
        assert_eq!(page, &['c', 'd'][..]);
    }

    #[test]
    fn test_empty_set() {
        let keys: Vec<u8> = Vec::new();
        assert_eq!(window(&keys, 0, 10), (0, &[][..]));
    }
}
