//! A1-style cell references.

/// Rows a worksheet can hold.
pub(crate) const MAX_ROWS: usize = 1_048_576;

/// Columns a worksheet can hold, `A` through `XFD`.
pub(crate) const MAX_COLUMNS: usize = 16_384;

/// Converts zero-based (row, col) to an A1 reference, e.g. (1, 27) → "AB2".
pub(crate) fn index_to_reference(row: usize, col: usize) -> String {
    let mut letters = Vec::new();
    let mut col = col + 1;
    while col > 0 {
        let rem = (col - 1) % 26;
        letters.push(b'A' + rem as u8);
        col = (col - 1) / 26;
    }
    letters.reverse();
    format!("{}{}", String::from_utf8_lossy(&letters), row + 1)
}

/// Parses an A1 reference into zero-based (row, col). `$` anchors are ignored.
/// References beyond the worksheet limits are rejected.
pub(crate) fn reference_to_index(reference: &str) -> Option<(usize, usize)> {
    let reference = reference.replace('$', "");
    let split = reference.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = reference.split_at(split);
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let mut col = 0usize;
    for c in letters.chars() {
        col = col.checked_mul(26)?.checked_add((c.to_ascii_uppercase() as u8 - b'A' + 1) as usize)?;
    }
    let row = digits.parse::<usize>().ok()?;
    if row == 0 || row > MAX_ROWS || col > MAX_COLUMNS {
        return None;
    }
    Some((row - 1, col - 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_round_trip() {
        assert_eq!(index_to_reference(0, 0), "A1");
        assert_eq!(index_to_reference(1, 25), "Z2");
        assert_eq!(index_to_reference(1, 27), "AB2");
        assert_eq!(index_to_reference(9, 701), "ZZ10");
        assert_eq!(reference_to_index("A1"), Some((0, 0)));
        assert_eq!(reference_to_index("ab2"), Some((1, 27)));
        assert_eq!(reference_to_index("$ZZ$10"), Some((9, 701)));
    }

    #[test]
    fn malformed_references() {
        assert_eq!(reference_to_index("A0"), None);
        assert_eq!(reference_to_index("12"), None);
        assert_eq!(reference_to_index("B"), None);
        assert_eq!(reference_to_index("A1B"), None);
    }

    #[test]
    fn references_beyond_sheet_limits() {
        assert_eq!(reference_to_index("XFD1048576"), Some((MAX_ROWS - 1, MAX_COLUMNS - 1)));
        assert_eq!(reference_to_index("XFE1"), None);
        assert_eq!(reference_to_index("A1048577"), None);
        assert_eq!(reference_to_index("ZZZZZZZ1"), None);
        assert_eq!(reference_to_index("A99999999999999999999999"), None);
    }
}
