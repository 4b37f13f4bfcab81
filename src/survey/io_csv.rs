// Primitives for reading CSV files.

use std::io::Read;

use crate::survey::{io_common::read_cell, *};

pub fn read_csv_dataset(path: &str) -> SurveyResult<Dataset> {
    let rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .context(CsvOpenSnafu { path })?;
    read_records(rdr)
}

/// Reads a header line followed by one line per respondent.
fn read_records<R: Read>(mut rdr: csv::Reader<R>) -> SurveyResult<Dataset> {
    let header: Vec<String> = rdr
        .headers()
        .context(CsvLineParseSnafu { lineno: 1usize })?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();
    debug!("read_records: header: {:?}", header);
    let mut builder = DatasetBuilder::new(&header).context(InvalidDatasetSnafu {})?;

    for (idx, line_r) in rdr.into_records().enumerate() {
        // The header is line 1
        let lineno = idx + 2;
        let line = line_r.context(CsvLineParseSnafu { lineno })?;
        let values: Vec<Option<String>> = line.iter().map(read_cell).collect();
        debug!("read_records: lineno: {:?} row: {:?}", lineno, &values);
        builder.add_row(&values).context(InvalidDatasetSnafu {})?;
    }
    builder.build().context(InvalidDatasetSnafu {})
}
