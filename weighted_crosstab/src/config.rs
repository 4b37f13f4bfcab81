// ********* Input data structures ***********

use std::collections::HashSet;
use std::error::Error;
use std::fmt::Display;

/// One survey item, stored column-wise.
///
/// A value of `None` is a missing answer (blank cell, system missing, ...).
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct Column {
    pub name: String,
    pub values: Vec<Option<String>>,
}

/// The respondent records of a survey.
///
/// A dataset is built once and never mutated afterwards. All the analysis functions
/// take it by reference.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct Dataset {
    columns: Vec<Column>,
    num_rows: usize,
}

impl Dataset {
    /// Assembles a dataset from columns.
    ///
    /// All the columns must have the same number of values and distinct names.
    pub fn new(columns: Vec<Column>) -> Result<Dataset, AnalysisErrors> {
        let num_rows = columns.first().map(|c| c.values.len()).unwrap_or(0);
        let mut seen: HashSet<&str> = HashSet::new();
        for c in columns.iter() {
            if !seen.insert(c.name.as_str()) {
                return Err(AnalysisErrors::DuplicateColumn(c.name.clone()));
            }
            if c.values.len() != num_rows {
                return Err(AnalysisErrors::RaggedColumn {
                    name: c.name.clone(),
                    expected: num_rows,
                    found: c.values.len(),
                });
            }
        }
        Ok(Dataset { columns, num_rows })
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// The numeric weights of a column, if this column exists.
    ///
    /// Values that cannot be read as numbers are returned as missing.
    pub fn weights(&self, name: &str) -> Option<Vec<Option<f64>>> {
        self.column(name).map(|c| {
            c.values
                .iter()
                .map(|v| v.as_deref().and_then(|s| s.trim().parse::<f64>().ok()))
                .collect()
        })
    }
}

// ******** Output data structures *********

/// Weighted contingency table between two categorical columns.
///
/// The cells are indexed as `[row][col]`. The rows correspond to the categories of
/// `row_variable` and the columns to the categories of `col_variable`.
#[derive(PartialEq, Debug, Clone)]
pub struct ContingencyTable {
    pub row_variable: String,
    pub col_variable: String,
    pub row_categories: Vec<String>,
    pub col_categories: Vec<String>,
    /// Sum of the weights in each cell.
    pub weighted: Vec<Vec<f64>>,
    /// Sum of the squared weights in each cell, for the effective sample sizes.
    pub squared_weights: Vec<Vec<f64>>,
    /// Unweighted number of respondents in each cell.
    pub respondents: Vec<Vec<u64>>,
    /// Number of respondents left out because of a missing or refused value,
    /// or a missing or invalid weight.
    pub excluded: u64,
    /// Among the excluded respondents, those that only lacked a usable weight.
    pub invalid_weights: u64,
}

impl ContingencyTable {
    pub fn num_rows(&self) -> usize {
        self.row_categories.len()
    }

    pub fn num_cols(&self) -> usize {
        self.col_categories.len()
    }

    pub fn row_totals(&self) -> Vec<f64> {
        self.weighted.iter().map(|r| r.iter().sum()).collect()
    }

    pub fn col_totals(&self) -> Vec<f64> {
        column_sums(&self.weighted, self.num_cols())
    }

    pub fn total(&self) -> f64 {
        self.row_totals().iter().sum()
    }

    pub fn total_respondents(&self) -> u64 {
        self.respondents.iter().flatten().sum()
    }

    pub fn row_squared_totals(&self) -> Vec<f64> {
        self.squared_weights.iter().map(|r| r.iter().sum()).collect()
    }

    pub fn col_squared_totals(&self) -> Vec<f64> {
        column_sums(&self.squared_weights, self.num_cols())
    }

    /// Rows with a strictly positive weighted total.
    pub fn populated_rows(&self) -> usize {
        self.row_totals().iter().filter(|x| **x > 0.0).count()
    }

    /// Columns with a strictly positive weighted total.
    pub fn populated_cols(&self) -> usize {
        self.col_totals().iter().filter(|x| **x > 0.0).count()
    }

    /// The same table with the roles of the two variables swapped.
    pub fn transpose(&self) -> ContingencyTable {
        ContingencyTable {
            row_variable: self.col_variable.clone(),
            col_variable: self.row_variable.clone(),
            row_categories: self.col_categories.clone(),
            col_categories: self.row_categories.clone(),
            weighted: transpose_grid(&self.weighted, self.num_cols()),
            squared_weights: transpose_grid(&self.squared_weights, self.num_cols()),
            respondents: transpose_grid(&self.respondents, self.num_cols()),
            excluded: self.excluded,
            invalid_weights: self.invalid_weights,
        }
    }

    /// Percentage of each cell within its row. Rows with no weight are all zeros.
    pub fn row_percentages(&self) -> Vec<Vec<f64>> {
        let totals = self.row_totals();
        self.weighted
            .iter()
            .zip(totals.iter())
            .map(|(row, t)| row.iter().map(|x| percent(*x, *t)).collect())
            .collect()
    }

    /// Percentage of each cell within its column. Columns with no weight are all zeros.
    pub fn column_percentages(&self) -> Vec<Vec<f64>> {
        let totals = self.col_totals();
        self.weighted
            .iter()
            .map(|row| {
                row.iter()
                    .zip(totals.iter())
                    .map(|(x, t)| percent(*x, *t))
                    .collect()
            })
            .collect()
    }
}

fn percent(x: f64, total: f64) -> f64 {
    if total > 0.0 {
        100.0 * x / total
    } else {
        0.0
    }
}

fn column_sums(grid: &[Vec<f64>], num_cols: usize) -> Vec<f64> {
    let mut res = vec![0.0; num_cols];
    for row in grid.iter() {
        for (j, x) in row.iter().enumerate() {
            res[j] += x;
        }
    }
    res
}

fn transpose_grid<T: Copy>(grid: &[Vec<T>], num_cols: usize) -> Vec<Vec<T>> {
    (0..num_cols)
        .map(|j| grid.iter().map(|row| row[j]).collect())
        .collect()
}

/// Pearson chi-square test of independence.
#[derive(PartialEq, Debug, Clone)]
pub struct ChiSquareTest {
    pub statistic: f64,
    pub degrees_of_freedom: usize,
    pub p_value: f64,
    /// True if the continuity correction was applied (2x2 tables only).
    pub yates_correction: bool,
    /// Expected weighted counts under independence, indexed as `[row][col]`.
    pub expected: Vec<Vec<f64>>,
}

/// Conventional reading of a Cramér's V value.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum EffectSize {
    Negligible,
    Small,
    Medium,
    Large,
}

impl EffectSize {
    pub fn from_cramers_v(v: f64) -> EffectSize {
        if v > 0.5 {
            EffectSize::Large
        } else if v > 0.3 {
            EffectSize::Medium
        } else if v > 0.1 {
            EffectSize::Small
        } else {
            EffectSize::Negligible
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EffectSize::Negligible => "Negligible",
            EffectSize::Small => "Small",
            EffectSize::Medium => "Medium",
            EffectSize::Large => "Large",
        }
    }
}

/// Significance level reached by a p-value.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum Significance {
    NotSignificant,
    P05,
    P01,
    P001,
}

impl Significance {
    pub fn from_p_value(p: f64) -> Significance {
        if p < 0.001 {
            Significance::P001
        } else if p < 0.01 {
            Significance::P01
        } else if p < 0.05 {
            Significance::P05
        } else {
            Significance::NotSignificant
        }
    }

    pub fn stars(&self) -> &'static str {
        match self {
            Significance::NotSignificant => "n.s.",
            Significance::P05 => "*",
            Significance::P01 => "**",
            Significance::P001 => "***",
        }
    }
}

/// Strength and significance of the association between the two variables of a table.
#[derive(PartialEq, Debug, Clone)]
pub struct Association {
    pub chi_square: ChiSquareTest,
    pub cramers_v: f64,
    pub effect: EffectSize,
    pub significance: Significance,
}

/// A weighted proportion with its confidence interval.
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct Interval {
    pub proportion: f64,
    pub std_error: f64,
    pub lower: f64,
    pub upper: f64,
    pub effective_n: f64,
}

/// Share of one category of a variable.
#[derive(PartialEq, Debug, Clone)]
pub struct ProportionInterval {
    pub category: String,
    pub weighted_count: f64,
    pub respondents: u64,
    pub interval: Result<Interval, AnalysisErrors>,
}

/// Share of a row category within one column group of a contingency table.
#[derive(PartialEq, Debug, Clone)]
pub struct CellInterval {
    pub row: String,
    pub col: String,
    pub weighted_count: f64,
    pub interval: Result<Interval, AnalysisErrors>,
}

/// Everything computed for one pair of variables.
///
/// The statistics that cannot be computed for this table carry the reason instead of a
/// value. The table itself is always available.
#[derive(PartialEq, Debug, Clone)]
pub struct CrosstabReport {
    pub table: ContingencyTable,
    pub association: Result<Association, AnalysisErrors>,
    pub row_intervals: Result<Vec<ProportionInterval>, AnalysisErrors>,
    pub cell_intervals: Vec<CellInterval>,
}

/// One (question, demographic) test of a battery.
#[derive(PartialEq, Debug, Clone)]
pub struct BatteryEntry {
    pub question: String,
    pub demographic: String,
    pub association: Result<Association, AnalysisErrors>,
}

#[derive(PartialEq, Debug, Clone)]
pub struct DatasetSummary {
    pub respondents: usize,
    /// Sum of the valid weights, or `None` if there is no usable weight at all.
    pub weighted_total: Option<f64>,
    pub columns: Vec<String>,
}

/// Errors that prevent a computation from completing.
///
/// Some of them only mean that a statistic is not defined for the data at hand (see
/// [`AnalysisErrors::is_not_computable`]): they are reported in place of the value and
/// do not invalidate the rest of an analysis.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum AnalysisErrors {
    UnknownColumn(String),
    DuplicateColumn(String),
    RaggedColumn {
        name: String,
        expected: usize,
        found: usize,
    },
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },
    InvalidRules(String),
    /// All the weights are missing, zero or invalid, or the weight column does not exist.
    NoValidWeights,
    /// No respondent has a value for the selected columns.
    EmptySelection,
    TooFewCategories {
        rows: usize,
        cols: usize,
    },
    ZeroExpectedCount {
        row: String,
        col: String,
    },
}

impl AnalysisErrors {
    pub fn is_not_computable(&self) -> bool {
        matches!(
            self,
            AnalysisErrors::NoValidWeights
                | AnalysisErrors::EmptySelection
                | AnalysisErrors::TooFewCategories { .. }
                | AnalysisErrors::ZeroExpectedCount { .. }
        )
    }
}

impl Error for AnalysisErrors {}

impl Display for AnalysisErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalysisErrors::UnknownColumn(name) => write!(f, "unknown column {:?}", name),
            AnalysisErrors::DuplicateColumn(name) => write!(f, "duplicate column {:?}", name),
            AnalysisErrors::RaggedColumn {
                name,
                expected,
                found,
            } => write!(
                f,
                "column {:?} has {} values, expected {}",
                name, found, expected
            ),
            AnalysisErrors::RaggedRow {
                row,
                expected,
                found,
            } => write!(
                f,
                "row {} has {} values, expected {}",
                row, found, expected
            ),
            AnalysisErrors::InvalidRules(msg) => write!(f, "invalid analysis rules: {}", msg),
            AnalysisErrors::NoValidWeights => write!(f, "not computable: no valid weights"),
            AnalysisErrors::EmptySelection => {
                write!(f, "not computable: no respondent with valid answers")
            }
            AnalysisErrors::TooFewCategories { rows, cols } => write!(
                f,
                "not computable: at least 2 populated rows and columns are required, found {}x{}",
                rows, cols
            ),
            AnalysisErrors::ZeroExpectedCount { row, col } => write!(
                f,
                "not computable: zero expected count in cell ({}, {})",
                row, col
            ),
        }
    }
}

// ********* Configuration **********

/// How the confidence interval of a proportion is built.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum IntervalMethod {
    /// Normal approximation: p ± z·sqrt(p(1-p)/n), clipped to [0, 1].
    Wald,
    /// Wilson score interval.
    Wilson,
}

/// The sample size plugged into the variance of a weighted proportion.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum EffectiveSampleSize {
    /// Kish approximation: (Σw)² / Σw². Equal to the number of respondents when all the
    /// weights are equal.
    Kish,
    /// The sum of the weights.
    WeightSum,
}

#[derive(PartialEq, Debug, Clone)]
pub struct AnalysisRules {
    /// Between 0 and 1 (exclusive).
    pub confidence_level: f64,
    pub interval_method: IntervalMethod,
    pub effective_sample_size: EffectiveSampleSize,
    /// Applies the Yates continuity correction to 2x2 tables.
    pub yates_correction: bool,
    /// Answer codes treated as missing (typically the "Refused" code).
    pub excluded_values: Vec<String>,
}

impl AnalysisRules {
    pub const DEFAULT_RULES: AnalysisRules = AnalysisRules {
        confidence_level: 0.95,
        interval_method: IntervalMethod::Wald,
        effective_sample_size: EffectiveSampleSize::Kish,
        yates_correction: true,
        excluded_values: Vec::new(),
    };

    pub fn validate(&self) -> Result<(), AnalysisErrors> {
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(AnalysisErrors::InvalidRules(format!(
                "confidence level must be between 0 and 1, got {}",
                self.confidence_level
            )));
        }
        Ok(())
    }

    pub fn is_excluded(&self, value: &str) -> bool {
        self.excluded_values.iter().any(|v| v == value)
    }
}

impl Default for AnalysisRules {
    fn default() -> Self {
        AnalysisRules::DEFAULT_RULES
    }
}
