//! A1-style cell references.

/// Rows in an Excel worksheet.
pub(crate) const MAX_ROWS: usize = 1_048_576;

/// Columns in an Excel worksheet, `A` through `XFD`.
pub(crate) const MAX_COLUMNS: usize = 16_384;

/// Converts 0-based (row, col) to an A1 reference, e.g. (1, 27) -> "AB2".
pub(crate) fn index_to_reference(row: usize, col: usize) -> String {
    let mut letters = Vec::<u8>::new();
    let mut col = col + 1;
    while col > 0 {
        col -= 1;
        letters.push(b'A' + (col % 26) as u8);
        col /= 26;
    }
    letters.reverse();
    format!("{}{}", String::from_utf8_lossy(&letters), row + 1)
}

/// Converts an A1 reference (optionally with `$` anchors) to 0-based (row, col).
pub(crate) fn reference_to_index(reference: &str) -> Option<(usize, usize)> {
    let reference = reference.replace('$', "");
    let split = reference.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = reference.split_at(split);
    Some((row_to_index(digits)?, col_to_index(letters)?))
}

/// "A" -> 0, "Z" -> 25, "AA" -> 26; rejects columns past "XFD".
pub(crate) fn col_to_index(letters: &str) -> Option<usize> {
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    letters
        .to_ascii_uppercase()
        .bytes()
        .try_fold(0usize, |index, byte| index.checked_mul(26)?.checked_add((byte - b'A') as usize + 1))
        .filter(|col| *col <= MAX_COLUMNS)
        .map(|col| col - 1)
}

/// "1" -> 0; rejects "0", non-digits and rows past the last worksheet row.
pub(crate) fn row_to_index(digits: &str) -> Option<usize> {
    digits
        .parse::<usize>()
        .ok()
        .filter(|row| (1..=MAX_ROWS).contains(row))
        .map(|row| row - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_references() {
        assert_eq!(index_to_reference(0, 0), "A1");
        assert_eq!(index_to_reference(1, 27), "AB2");
        assert_eq!(index_to_reference(9, 701), "ZZ10");
        assert_eq!(reference_to_index("AB2"), Some((1, 27)));
        assert_eq!(reference_to_index("$C$3"), Some((2, 2)));
    }

    #[test]
    fn rejects_malformed_references() {
        assert_eq!(reference_to_index("A0"), None);
        assert_eq!(reference_to_index("12"), None);
        assert_eq!(reference_to_index("AB"), None);
        assert_eq!(col_to_index("A1"), None);
    }

    #[test]
    fn rejects_references_past_worksheet_limits() {
        assert_eq!(reference_to_index("XFD1048576"), Some((MAX_ROWS - 1, MAX_COLUMNS - 1)));
        assert_eq!(reference_to_index("XFE1"), None);
        assert_eq!(reference_to_index("A1048577"), None);
        assert_eq!(reference_to_index("A18446744073709551615"), None);
        assert_eq!(reference_to_index("A99999999999999999999999"), None);
        assert_eq!(col_to_index("ZZZZZZZZZZZZZZZZ"), None);
    }
}
