//! Row and frame containers produced by result sets.

mod frame;
mod row;

pub use frame::{Frame, FrameColumn};
pub use row::{ColumnNames, Row};

/// Make column names unique by suffixing repeats with `_1`, `_2`, ...
///
/// A generated name that collides with a later original name is bumped again, so the
/// output never contains duplicates.
#[must_use]
pub fn unduplicate_field_names(names: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        if !out.contains(name) {
            out.push(name.clone());
            continue;
        }
        let mut suffix = 1;
        let mut candidate = format!("{name}_{suffix}");
        while out.contains(&candidate) || names.contains(&candidate) {
            suffix += 1;
            candidate = format!("{name}_{suffix}");
        }
        out.push(candidate);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owned(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn repeats_get_numeric_suffixes() {
        assert_eq!(
            unduplicate_field_names(&owned(&["id", "name", "id", "id"])),
            owned(&["id", "name", "id_1", "id_2"])
        );
    }

    #[test]
    fn suffixes_skip_existing_names() {
        assert_eq!(
            unduplicate_field_names(&owned(&["a", "a", "a_1"])),
            owned(&["a", "a_2", "a_1"])
        );
    }
}
