pub use crate::config::*;

/// A builder for assembling a dataset one respondent at a time.
///
/// This is what the file readers use: the columns are declared once from the header,
/// then every record is appended.
///
/// ```
/// use weighted_crosstab::builder::DatasetBuilder;
/// # use weighted_crosstab::AnalysisErrors;
///
/// let mut builder = DatasetBuilder::new(&["A".to_string(), "B".to_string(), "w".to_string()])?;
///
/// builder.add_row_simple(&["yes", "x", "1.0"])?;
/// builder.add_row_simple(&["no", "", "0.5"])?;
///
/// let dataset = builder.build()?;
/// assert_eq!(dataset.num_rows(), 2);
///
/// # Ok::<(), AnalysisErrors>(())
/// ```
pub struct DatasetBuilder {
    pub(crate) _names: Vec<String>,
    pub(crate) _values: Vec<Vec<Option<String>>>,
}

impl DatasetBuilder {
    pub fn new(column_names: &[String]) -> Result<DatasetBuilder, AnalysisErrors> {
        for (idx, name) in column_names.iter().enumerate() {
            if column_names[..idx].contains(name) {
                return Err(AnalysisErrors::DuplicateColumn(name.clone()));
            }
        }
        Ok(DatasetBuilder {
            _names: column_names.to_vec(),
            _values: column_names.iter().map(|_| Vec::new()).collect(),
        })
    }

    pub fn num_rows(&self) -> usize {
        self._values.first().map(|v| v.len()).unwrap_or(0)
    }

    /// Adds a record, with empty strings standing for missing values.
    ///
    /// It is the simplest use case for most cases.
    pub fn add_row_simple(&mut self, values: &[&str]) -> Result<(), AnalysisErrors> {
        let row: Vec<Option<String>> = values
            .iter()
            .map(|s| {
                if s.is_empty() {
                    None
                } else {
                    Some(s.to_string())
                }
            })
            .collect();
        self.add_row(&row)
    }

    /// Adds a record. It must have exactly one value per declared column.
    pub fn add_row(&mut self, values: &[Option<String>]) -> Result<(), AnalysisErrors> {
        if values.len() != self._names.len() {
            return Err(AnalysisErrors::RaggedRow {
                row: self.num_rows() + 1,
                expected: self._names.len(),
                found: values.len(),
            });
        }
        for (col, v) in self._values.iter_mut().zip(values.iter()) {
            col.push(v.clone());
        }
        Ok(())
    }

    pub fn build(self) -> Result<Dataset, AnalysisErrors> {
        let columns: Vec<Column> = self
            ._names
            .into_iter()
            .zip(self._values)
            .map(|(name, values)| Column { name, values })
            .collect();
        Dataset::new(columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(l: &[&str]) -> Vec<String> {
        l.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn builds_columns_from_rows() {
        let mut b = DatasetBuilder::new(&names(&["q", "w"])).unwrap();
        b.add_row_simple(&["1", "0.5"]).unwrap();
        b.add_row_simple(&["", "2"]).unwrap();
        let ds = b.build().unwrap();
        assert_eq!(ds.num_rows(), 2);
        assert_eq!(
            ds.column("q").unwrap().values,
            vec![Some("1".to_string()), None]
        );
        assert_eq!(ds.weights("w").unwrap(), vec![Some(0.5), Some(2.0)]);
    }

    #[test]
    fn rejects_duplicate_names() {
        let res = DatasetBuilder::new(&names(&["q", "q"]));
        assert_eq!(
            res.err(),
            Some(AnalysisErrors::DuplicateColumn("q".to_string()))
        );
    }

    #[test]
    fn rejects_short_rows() {
        let mut b = DatasetBuilder::new(&names(&["q", "w"])).unwrap();
        b.add_row_simple(&["1", "1"]).unwrap();
        let res = b.add_row_simple(&["1"]);
        assert_eq!(
            res,
            Err(AnalysisErrors::RaggedRow {
                row: 2,
                expected: 2,
                found: 1
            })
        );
    }

    #[test]
    fn empty_builder_gives_empty_dataset() {
        let b = DatasetBuilder::new(&names(&["q"])).unwrap();
        let ds = b.build().unwrap();
        assert_eq!(ds.num_rows(), 0);
        assert_eq!(ds.column_names(), names(&["q"]));
    }
}
