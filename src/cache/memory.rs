//! Approximate memory accounting for cached tables.
//!
//! Estimates are monotonic in data volume rather than byte-exact.

use crate::grid::CellValue;
use crate::table::column::Column;

const TABLE_BASE_OVERHEAD_BYTES: usize = 256;
const COLUMN_OVERHEAD_BYTES: usize = 96;
const CACHE_ENTRY_OVERHEAD_BYTES: usize = 128;
const VALUE_OVERHEAD_BYTES: usize = std::mem::size_of::<CellValue>();

pub(crate) fn estimate_value_bytes(value: &CellValue) -> usize {
    let payload = match value {
        CellValue::Empty => 0,
        CellValue::Text(text) | CellValue::Error(text) => text.len(),
        CellValue::Bool(_) => 1,
        CellValue::Number(_) | CellValue::Date(_) | CellValue::Time(_) | CellValue::DateTime(_) => 8,
    };
    VALUE_OVERHEAD_BYTES.saturating_add(payload)
}

pub(crate) fn estimate_column_bytes(column: &Column) -> usize {
    column
        .values()
        .iter()
        .fold(COLUMN_OVERHEAD_BYTES.saturating_add(column.name().len()), |bytes, value| {
            bytes.saturating_add(estimate_value_bytes(value))
        })
}

pub(crate) fn estimate_table_bytes(columns: &[Column]) -> usize {
    columns.iter().fold(TABLE_BASE_OVERHEAD_BYTES, |bytes, column| {
        // name index entry
        bytes
            .saturating_add(estimate_column_bytes(column))
            .saturating_add(column.name().len())
    })
}

/// Footprint charged to the cache for one entry holding a table of `table_bytes`.
pub(crate) fn estimate_entry_bytes(table_bytes: usize, key_bytes: usize) -> usize {
    CACHE_ENTRY_OVERHEAD_BYTES
        .saturating_add(table_bytes)
        .saturating_add(key_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_payload_counts() {
        let short = estimate_value_bytes(&CellValue::Text("ab".to_owned()));
        let long = estimate_value_bytes(&CellValue::Text("abcdef".to_owned()));
        assert_eq!(long - short, 4);
        assert!(estimate_value_bytes(&CellValue::Number(1.0)) > estimate_value_bytes(&CellValue::Empty));
    }

    #[test]
    fn grows_with_rows() {
        let small = Column::new("n", vec![CellValue::Number(1.0); 10]);
        let large = Column::new("n", vec![CellValue::Number(1.0); 100]);
        assert!(estimate_table_bytes(&[large]) > estimate_table_bytes(&[small]));
        assert_eq!(estimate_table_bytes(&[]), TABLE_BASE_OVERHEAD_BYTES);
    }
}
