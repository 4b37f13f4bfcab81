use std::path::Path;

/// The cell contents read as missing answers.
pub const MISSING_TOKENS: [&str; 6] = ["", "NA", "NaN", "nan", "null", "NULL"];

pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string()
}

/// Reads the content of a cell: None for the missing tokens, the trimmed text otherwise.
///
/// Numeric codes written as decimals by spreadsheet exports ("1.0") are read as the
/// integer code ("1"), so that they match the labels of the configuration.
pub fn read_cell(raw: &str) -> Option<String> {
    let s = raw.trim();
    if MISSING_TOKENS.contains(&s) {
        return None;
    }
    Some(normalize_code(s))
}

fn normalize_code(s: &str) -> String {
    if s.contains('.') {
        if let Ok(x) = s.parse::<f64>() {
            if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e15 {
                return format!("{}", x as i64);
            }
        }
    }
    s.to_string()
}
