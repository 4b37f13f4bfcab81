use log::{debug, info, warn};

use snafu::{prelude::*, Snafu};
use std::fs;
use std::path::{Path, PathBuf};

use calamine::{open_workbook, DataType, Reader, Xlsx};

use serde::{Deserialize, Serialize};
use serde_json::json;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use weighted_crosstab::builder::DatasetBuilder;
use weighted_crosstab::*;

use crate::args::Args;
use crate::survey::config_reader::*;

pub mod config_reader;
mod io_common;
mod io_csv;
mod io_excel;
pub mod report;
pub mod server;

pub const DEFAULT_PORT: u16 = 8501;

#[derive(Debug, Snafu)]
pub enum SurveyError {
    #[snafu(display("Error opening file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("No worksheet found in {path}"))]
    EmptyExcel { path: String },
    #[snafu(display("Worksheet {name:?} not found in {path}"))]
    MissingWorksheet { name: String, path: String },
    #[snafu(display("Line {lineno}: cannot read cell {content}"))]
    ExcelWrongCellType { lineno: usize, content: String },
    #[snafu(display("Data file {path} not found"))]
    MissingDataFile { path: String },
    #[snafu(display("Error opening file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Error reading line {lineno}"))]
    CsvLineParse { source: csv::Error, lineno: usize },
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Error writing file {path}"))]
    WritingOutput {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Invalid data"))]
    InvalidDataset { source: AnalysisErrors },
    #[snafu(display("Analysis failed"))]
    Analysis { source: AnalysisErrors },
    #[snafu(display("Dashboard failed on port {port}"))]
    Server {
        source: std::io::Error,
        port: u16,
    },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type SurveyResult<T> = Result<T, SurveyError>;

/// What the command line asks for.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum Request {
    Summary,
    Crosstab { row: String, col: String },
    Distribution { column: String },
    Battery,
}

impl Request {
    /// The stem of the output file when written to the output directory.
    fn file_stem(&self) -> String {
        match self {
            Request::Summary => "summary".to_string(),
            Request::Crosstab { row, col } => format!("crosstab_{}_{}", row, col),
            Request::Distribution { column } => format!("distribution_{}", column),
            Request::Battery => "battery".to_string(),
        }
    }
}

fn build_request(args: &Args) -> SurveyResult<Request> {
    match (&args.row, &args.col, &args.column, args.battery) {
        (Some(row), Some(col), None, false) => Ok(Request::Crosstab {
            row: row.clone(),
            col: col.clone(),
        }),
        (None, None, Some(column), false) => Ok(Request::Distribution {
            column: column.clone(),
        }),
        (None, None, None, true) => Ok(Request::Battery),
        (None, None, None, false) => Ok(Request::Summary),
        (Some(_), None, _, _) | (None, Some(_), _, _) => {
            whatever!("--row and --col must be used together")
        }
        _ => {
            whatever!("Only one of --row/--col, --column or --battery can be used at a time")
        }
    }
}

fn validate_rules(config: &SurveyConfig) -> SurveyResult<AnalysisRules> {
    let mut rules = AnalysisRules::default();
    if let Some(rs) = &config.rules {
        if let Some(level) = rs.confidence_level {
            rules.confidence_level = level;
        }
        rules.interval_method = match rs.interval_method.as_deref() {
            None | Some("wald") => IntervalMethod::Wald,
            Some("wilson") => IntervalMethod::Wilson,
            Some(x) => {
                whatever!("Cannot use interval method {:?}: expected wald or wilson", x)
            }
        };
        rules.effective_sample_size = match rs.effective_sample_size.as_deref() {
            None | Some("kish") => EffectiveSampleSize::Kish,
            Some("weightSum") => EffectiveSampleSize::WeightSum,
            Some(x) => {
                whatever!(
                    "Cannot use effective sample size {:?}: expected kish or weightSum",
                    x
                )
            }
        };
        if let Some(yates) = rs.yates_correction {
            rules.yates_correction = yates;
        }
    }
    rules.excluded_values = config.data_source.refused_codes();
    rules.validate().context(AnalysisSnafu {})?;
    debug!("validate_rules: {:?}", rules);
    Ok(rules)
}

/// The configuration, and the directory the data file path is relative to.
fn load_config(args: &Args) -> SurveyResult<(SurveyConfig, PathBuf)> {
    let (mut config, mut root) = match &args.config {
        Some(config_path) => {
            let config = read_config(config_path)?;
            let root = Path::new(config_path)
                .parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_default();
            (config, root)
        }
        None => {
            let input = match &args.input {
                Some(x) => x,
                None => {
                    whatever!("Either --config or --input must be provided")
                }
            };
            let weight = match &args.weight {
                Some(x) => x,
                None => {
                    whatever!("--weight must be provided when no configuration file is given")
                }
            };
            let provider = args.input_type.as_deref().unwrap_or("csv");
            (
                SurveyConfig::from_data_file(input, provider, weight),
                PathBuf::new(),
            )
        }
    };

    // Command line overrides
    if let Some(input) = &args.input {
        config.data_source.file_path = input.clone();
        root = PathBuf::new();
    }
    if let Some(input_type) = &args.input_type {
        config.data_source.provider = input_type.clone();
    }
    if let Some(weight) = &args.weight {
        config.data_source.weight_column = weight.clone();
    }
    if let Some(worksheet) = &args.excel_worksheet_name {
        config.data_source.excel_worksheet_name = Some(worksheet.clone());
    }
    info!("config: {:?}", config);
    Ok((config, root))
}

fn read_dataset(root: &Path, source: &DataSource) -> SurveyResult<Dataset> {
    let p: PathBuf = root.join(&source.file_path);
    let path = p.display().to_string();
    info!("Attempting to read survey file {:?}", path);
    ensure!(p.is_file(), MissingDataFileSnafu { path: &path });
    let dataset = match source.provider.as_str() {
        "csv" => io_csv::read_csv_dataset(&path)?,
        "xlsx" => io_excel::read_excel_dataset(&path, source.excel_worksheet_name.as_deref())?,
        x => {
            whatever!("Provider not implemented {:?}", x)
        }
    };
    info!(
        "read_dataset: {} respondents, {} columns",
        dataset.num_rows(),
        dataset.column_names().len()
    );
    if !dataset.has_column(&source.weight_column) {
        warn!(
            "read_dataset: weight column {:?} not found in {:?}",
            source.weight_column, path
        );
    }
    Ok(dataset)
}

/// Computes the report of one request, in JSON form.
pub fn run_request(
    dataset: &Dataset,
    config: &SurveyConfig,
    rules: &AnalysisRules,
    request: &Request,
) -> SurveyResult<JSValue> {
    let weight = config.data_source.weight_column.as_str();
    let js = match request {
        Request::Summary => report::summary_to_json(&summarize(dataset, weight), config),
        Request::Crosstab { row, col } => {
            let r = run_crosstab_stats(dataset, row, col, weight, rules)
                .context(AnalysisSnafu {})?;
            report::crosstab_to_json(&r, config)
        }
        Request::Distribution { column } => {
            let codes = config.value_codes(column);
            let d = proportion_intervals_with_categories(dataset, column, weight, &codes, rules)
                .context(AnalysisSnafu {})?;
            report::distribution_to_json(column, &d, config)
        }
        Request::Battery => {
            let entries = run_battery(dataset, &config.test_pairs(), weight, rules)
                .context(AnalysisSnafu {})?;
            report::battery_to_json(&entries, config)
        }
    };
    Ok(js)
}

fn build_summary_js(config: &SurveyConfig, results: JSValue) -> JSValue {
    json!({
        "config": config.output_settings,
        "results": results })
}

fn write_output(
    args: &Args,
    config: &SurveyConfig,
    root: &Path,
    request: &Request,
    content: &str,
) -> SurveyResult<()> {
    let output_directory = &config.output_settings.output_directory;
    let target: Option<PathBuf> = match (args.out.as_deref(), output_directory) {
        (Some("stdout"), _) | (Some(""), _) => None,
        (Some(p), _) => Some(PathBuf::from(p)),
        (None, Some(dir)) => Some(root.join(dir).join(format!("{}.json", request.file_stem()))),
        (None, None) => None,
    };
    match target {
        Some(p) => {
            let path = p.display().to_string();
            info!("Writing output to {:?}", path);
            fs::write(&p, content).context(WritingOutputSnafu { path })?;
        }
        None => println!("{}", content),
    }
    Ok(())
}

/// Relative difference under which two numbers of a reference are considered equal.
const REFERENCE_TOLERANCE: f64 = 1e-9;

fn same_number(a: f64, b: f64) -> bool {
    a == b || (a - b).abs() <= REFERENCE_TOLERANCE * a.abs().max(b.abs()).max(1e-3)
}

/// Structural equality of two JSON values, with the numbers compared up to
/// [`REFERENCE_TOLERANCE`].
fn same_values(reference: &JSValue, output: &JSValue) -> bool {
    match (reference, output) {
        (JSValue::Number(a), JSValue::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => same_number(x, y),
            _ => a == b,
        },
        (JSValue::Array(a), JSValue::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| same_values(x, y))
        }
        (JSValue::Object(a), JSValue::Object(b)) => {
            a.len() == b.len()
                && a
                    .iter()
                    .all(|(k, x)| b.get(k).map(|y| same_values(x, y)).unwrap_or(false))
        }
        (a, b) => a == b,
    }
}

/// Compares the output with a reference. Both are parsed first, so that formatting
/// differences are ignored, and the numbers only have to agree to a relative tolerance.
fn check_reference(reference_path: &str, output: &JSValue) -> SurveyResult<()> {
    let summary_ref = read_summary(reference_path)?;
    if !same_values(&summary_ref, output) {
        let pretty_ref =
            serde_json::to_string_pretty(&summary_ref).context(ParsingJsonSnafu {})?;
        let pretty_output = serde_json::to_string_pretty(output).context(ParsingJsonSnafu {})?;
        warn!("Found differences with the reference string");
        print_diff(pretty_ref.as_str(), pretty_output.as_str(), "\n");
        whatever!("Difference detected between calculated output and reference output")
    }
    info!("The output matches the reference {:?}", reference_path);
    Ok(())
}

fn run_dashboard(
    dataset: Dataset,
    config: SurveyConfig,
    rules: AnalysisRules,
    port: u16,
) -> SurveyResult<()> {
    let state = server::DashboardState {
        dataset,
        config,
        rules,
    };
    actix_web::rt::System::new()
        .block_on(server::serve(state, port))
        .context(ServerSnafu { port })
}

pub fn run(args: &Args) -> SurveyResult<()> {
    let (config, root) = load_config(args)?;
    let rules = validate_rules(&config)?;
    let dataset = read_dataset(&root, &config.data_source)?;

    if args.serve {
        let port = args.port.unwrap_or(DEFAULT_PORT);
        return run_dashboard(dataset, config, rules, port);
    }

    let request = build_request(args)?;
    info!("request: {:?}", request);
    let results = run_request(&dataset, &config, &rules, &request)?;
    let result_js = build_summary_js(&config, results);
    let pretty_js = serde_json::to_string_pretty(&result_js).context(ParsingJsonSnafu {})?;
    write_output(args, &config, &root, &request, &pretty_js)?;

    if let Some(reference_path) = &args.reference {
        check_reference(reference_path, &result_js)?;
    }
    Ok(())
}
