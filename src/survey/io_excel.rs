// Primitives for reading Excel files: the first line holds the column names.

use crate::survey::{io_common::read_cell, *};

pub fn read_excel_dataset(path: &str, worksheet_name: Option<&str>) -> SurveyResult<Dataset> {
    let wrange = get_range(path, worksheet_name)?;
    let mut rows = wrange.rows();

    let header_row = rows.next().context(EmptyExcelSnafu { path })?;
    let mut header: Vec<String> = Vec::new();
    for (idx, cell) in header_row.iter().enumerate() {
        let name = read_value(cell, 1)?.unwrap_or_else(|| format!("column_{}", idx + 1));
        header.push(name);
    }
    debug!("read_excel_dataset: header: {:?}", header);
    let mut builder = DatasetBuilder::new(&header).context(InvalidDatasetSnafu {})?;

    for (idx, row) in rows.enumerate() {
        let lineno = idx + 2;
        let values: Vec<Option<String>> = row
            .iter()
            .map(|cell| read_value(cell, lineno))
            .collect::<SurveyResult<Vec<Option<String>>>>()?;
        debug!("read_excel_dataset: lineno: {:?} row: {:?}", lineno, &values);
        builder.add_row(&values).context(InvalidDatasetSnafu {})?;
    }
    builder.build().context(InvalidDatasetSnafu {})
}

fn get_range(path: &str, worksheet_name: Option<&str>) -> SurveyResult<calamine::Range<DataType>> {
    debug!(
        "read_excel_dataset: path: {:?} worksheet: {:?}",
        path, worksheet_name
    );
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;

    // A worksheet name was provided, use it.
    if let Some(name) = worksheet_name {
        workbook
            .worksheet_range(name)
            .context(MissingWorksheetSnafu { name, path })?
            .context(OpeningExcelSnafu { path })
    } else {
        workbook
            .worksheet_range_at(0)
            .context(EmptyExcelSnafu { path })?
            .context(OpeningExcelSnafu { path })
    }
}

fn read_value(cell: &DataType, lineno: usize) -> SurveyResult<Option<String>> {
    match cell {
        DataType::Empty => Ok(None),
        DataType::String(s) => Ok(read_cell(s)),
        DataType::Int(i) => Ok(Some(i.to_string())),
        DataType::Float(f) => Ok(read_cell(&f.to_string())),
        DataType::Bool(b) => Ok(Some(b.to_string())),
        DataType::Error(e) => {
            warn!("read_value: line {}: error cell {:?} read as missing", lineno, e);
            Ok(None)
        }
        other => ExcelWrongCellTypeSnafu {
            lineno,
            content: format!("{:?}", other),
        }
        .fail(),
    }
}
