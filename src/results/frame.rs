use crate::types::RowValues;

use super::row::Row;

/// One named column of a [`Frame`].
#[derive(Debug, Clone, PartialEq)]
pub struct FrameColumn {
    pub name: String,
    pub values: Vec<RowValues>,
}

/// Column-oriented tabular data, as handed to plotting and table-writing layers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    pub columns: Vec<FrameColumn>,
}

impl Frame {
    /// Empty frame with the given column names.
    #[must_use]
    pub fn with_columns<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: names
                .into_iter()
                .map(|name| FrameColumn {
                    name: name.into(),
                    values: Vec::new(),
                })
                .collect(),
        }
    }

    /// Transpose rows into columns.
    #[must_use]
    pub fn from_rows(column_names: &[String], rows: &[Row]) -> Self {
        let mut frame = Self::with_columns(column_names.iter().cloned());
        for column in &mut frame.columns {
            column.values.reserve(rows.len());
        }
        for row in rows {
            for (idx, column) in frame.columns.iter_mut().enumerate() {
                column
                    .values
                    .push(row.get_by_index(idx).cloned().unwrap_or(RowValues::Null));
            }
        }
        frame
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&FrameColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Number of rows; the longest column when lengths disagree.
    #[must_use]
    pub fn height(&self) -> usize {
        self.columns.iter().map(|c| c.values.len()).max().unwrap_or(0)
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Values of row `idx`, `Null` where a column is shorter.
    #[must_use]
    pub fn row(&self, idx: usize) -> Vec<RowValues> {
        self.columns
            .iter()
            .map(|c| c.values.get(idx).cloned().unwrap_or(RowValues::Null))
            .collect()
    }
}
