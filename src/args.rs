use clap::Parser;

/// This is a tabulation program for weighted survey data.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) The JSON file describing the survey: data file, weight column, variable labels and tests.
    /// For more information about the file format, read the documentation of the `manual` module.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,
    /// (file path) A reference file containing the expected output in JSON format. If provided, surveytab will
    /// check that the computed output matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (file path, 'stdout' or empty) If specified, the output will be written in JSON format to the given
    /// location. Setting this option overrides the output directory that may be specified with the --config option.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path or empty) The data file. Setting this option overrides the file path that may be specified
    /// with the --config option.
    #[clap(short, long, value_parser)]
    pub input: Option<String>,

    /// (default csv) The type of the input: csv or xlsx.
    #[clap(long, value_parser)]
    pub input_type: Option<String>,

    /// (column name) The column holding the survey weights. Required if no configuration file is given.
    #[clap(short, long, value_parser)]
    pub weight: Option<String>,

    /// (default: first worksheet) When using an Excel file, indicates the name of the worksheet to use.
    #[clap(long, value_parser)]
    pub excel_worksheet_name: Option<String>,

    /// (column name) The variable in the rows of the crosstab. Must be used with --col.
    #[clap(long, value_parser)]
    pub row: Option<String>,

    /// (column name) The variable in the columns of the crosstab. Must be used with --row.
    #[clap(long, value_parser)]
    pub col: Option<String>,

    /// (column name) Outputs the weighted distribution of this variable, with confidence intervals.
    #[clap(long, value_parser)]
    pub column: Option<String>,

    /// Runs the chi-square tests of all the configured (question, demographic) pairs.
    #[clap(long, takes_value = false)]
    pub battery: bool,

    /// Starts the interactive dashboard on the local machine instead of writing an output.
    #[clap(long, takes_value = false)]
    pub serve: bool,

    /// (default 8501) The port of the dashboard.
    #[clap(long, value_parser)]
    pub port: Option<u16>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard error.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
