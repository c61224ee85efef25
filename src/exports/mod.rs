//! Export emitters consuming the merged per-line documents: GOCAD PLine
//! text (`.mdc` / `.mdch`) and the flat CSV layout (`.egs`).

pub mod egs;
pub mod gocad;

/// Pipe-delimited metadata field by index, empty when the record is short.
pub(crate) fn meta_field<'a>(met: &[&'a str], i: usize) -> &'a str {
    met.get(i).copied().unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_records_read_as_empty() {
        let met: Vec<&str> = "# @D0|Base|a".split('|').collect();
        assert_eq!(meta_field(&met, 1), "Base");
        assert_eq!(meta_field(&met, 2), "a");
        assert_eq!(meta_field(&met, 3), "");
        assert_eq!(meta_field(&met, 99), "");
    }
}
