/*!
Weighted cross-tabulation of survey data.

This crate computes, from a [`Dataset`] of respondents and a column of survey weights:
- weighted contingency tables between two categorical items ([`weighted_crosstab`]),
- Pearson chi-square tests of independence and Cramér's V ([`association`]),
- weighted proportions with confidence intervals ([`proportion_intervals`],
  [`cell_intervals`]).

All the functions are pure: the dataset is read, never modified. See the [`manual`]
module for the exact formulas.
*/

mod config;

pub mod builder;
pub mod manual;

use log::{debug, info, warn};
use statrs::distribution::{ChiSquared, ContinuousCDF, Normal};
use std::collections::{HashMap, HashSet};

pub use crate::config::*;

// **** Private structures ****

/// Weighted count of the categories of a single variable.
#[derive(PartialEq, Debug, Clone)]
struct Tally {
    categories: Vec<String>,
    weights: Vec<f64>,
    squared_weights: Vec<f64>,
    respondents: Vec<u64>,
}

impl Tally {
    fn total(&self) -> f64 {
        self.weights.iter().sum()
    }

    fn squared_total(&self) -> f64 {
        self.squared_weights.iter().sum()
    }
}

/// A weight that can enter a weighted sum: present, finite and not negative.
fn usable_weight(w: Option<f64>) -> Option<f64> {
    match w {
        Some(x) if x.is_finite() && x >= 0.0 => Some(x),
        _ => None,
    }
}

/// The category of an answer, or None if the answer is missing or excluded by the rules.
fn read_category<'a>(value: &'a Option<String>, rules: &AnalysisRules) -> Option<&'a str> {
    match value.as_deref().map(|s| s.trim()) {
        None => None,
        Some("") => None,
        Some(s) if rules.is_excluded(s) => None,
        Some(s) => Some(s),
    }
}

/// Numerical order if all the categories are numbers (survey codes), lexicographic order
/// otherwise.
fn sort_categories(categories: &mut [String]) {
    let numbers: Option<Vec<f64>> = categories
        .iter()
        .map(|c| c.parse::<f64>().ok().filter(|x| x.is_finite()))
        .collect();
    if numbers.is_some() {
        categories.sort_by(|a, b| {
            let xa: f64 = a.parse().unwrap_or(0.0);
            let xb: f64 = b.parse().unwrap_or(0.0);
            xa.total_cmp(&xb)
        });
    } else {
        categories.sort();
    }
}

fn distinct_sorted<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let set: HashSet<&str> = values.collect();
    let mut res: Vec<String> = set.into_iter().map(|s| s.to_string()).collect();
    sort_categories(&mut res);
    res
}

fn index_of(categories: &[String]) -> HashMap<&str, usize> {
    categories
        .iter()
        .enumerate()
        .map(|(idx, c)| (c.as_str(), idx))
        .collect()
}

fn column_values<'a>(
    dataset: &'a Dataset,
    name: &str,
) -> Result<&'a [Option<String>], AnalysisErrors> {
    dataset
        .column(name)
        .map(|c| c.values.as_slice())
        .ok_or_else(|| AnalysisErrors::UnknownColumn(name.to_string()))
}

/// The weights of the dataset. A weight column that does not exist is treated as a
/// column of missing weights: the statistics depending on it become not computable.
fn read_weights(dataset: &Dataset, weight_variable: &str) -> Vec<Option<f64>> {
    match dataset.weights(weight_variable) {
        Some(ws) => ws,
        None => {
            warn!(
                "read_weights: weight column {:?} not found, all the weights are missing",
                weight_variable
            );
            vec![None; dataset.num_rows()]
        }
    }
}

// **** Contingency tables ****

/// Builds the weighted contingency table between two columns.
///
/// Arguments:
/// * `row_variable`, `col_variable` the two categorical columns. They must exist.
/// * `weight_variable` the column of survey weights.
///
/// Respondents with a missing (or excluded) answer to either column, or without a usable
/// weight, are left out of the table. The categories are the ones observed among the
/// remaining respondents.
pub fn weighted_crosstab(
    dataset: &Dataset,
    row_variable: &str,
    col_variable: &str,
    weight_variable: &str,
    rules: &AnalysisRules,
) -> Result<ContingencyTable, AnalysisErrors> {
    rules.validate()?;
    let row_values = column_values(dataset, row_variable)?;
    let col_values = column_values(dataset, col_variable)?;
    let weights = read_weights(dataset, weight_variable);
    info!(
        "weighted_crosstab: {:?} x {:?} weighted by {:?}, {} respondents",
        row_variable,
        col_variable,
        weight_variable,
        dataset.num_rows()
    );

    let mut records: Vec<(&str, &str, f64)> = Vec::new();
    let mut excluded: u64 = 0;
    let mut invalid_weights: u64 = 0;
    for (idx, ((rv, cv), w)) in row_values
        .iter()
        .zip(col_values.iter())
        .zip(weights.iter())
        .enumerate()
    {
        match (
            read_category(rv, rules),
            read_category(cv, rules),
            usable_weight(*w),
        ) {
            (Some(r), Some(c), Some(w)) => records.push((r, c, w)),
            (Some(_), Some(_), None) => {
                debug!("weighted_crosstab: row {}: unusable weight {:?}", idx, w);
                excluded += 1;
                invalid_weights += 1;
            }
            _ => {
                excluded += 1;
            }
        }
    }
    if invalid_weights > 0 {
        warn!(
            "weighted_crosstab: {} respondents excluded for a missing or invalid weight",
            invalid_weights
        );
    }

    let row_categories = distinct_sorted(records.iter().map(|(r, _, _)| *r));
    let col_categories = distinct_sorted(records.iter().map(|(_, c, _)| *c));
    let row_idx = index_of(&row_categories);
    let col_idx = index_of(&col_categories);

    let mut weighted = vec![vec![0.0; col_categories.len()]; row_categories.len()];
    let mut squared_weights = weighted.clone();
    let mut respondents = vec![vec![0u64; col_categories.len()]; row_categories.len()];
    for (r, c, w) in records.iter() {
        let i = row_idx[r];
        let j = col_idx[c];
        weighted[i][j] += w;
        squared_weights[i][j] += w * w;
        respondents[i][j] += 1;
    }

    debug!(
        "weighted_crosstab: rows: {:?} cols: {:?} excluded: {}",
        row_categories, col_categories, excluded
    );
    Ok(ContingencyTable {
        row_variable: row_variable.to_string(),
        col_variable: col_variable.to_string(),
        row_categories,
        col_categories,
        weighted,
        squared_weights,
        respondents,
        excluded,
        invalid_weights,
    })
}

/// Fails if the table carries no weight at all.
fn check_weighted(table: &ContingencyTable) -> Result<(), AnalysisErrors> {
    if table.total_respondents() == 0 {
        if table.invalid_weights > 0 {
            return Err(AnalysisErrors::NoValidWeights);
        }
        return Err(AnalysisErrors::EmptySelection);
    }
    if table.total() <= 0.0 {
        return Err(AnalysisErrors::NoValidWeights);
    }
    Ok(())
}

// **** Significance testing ****

/// Pearson chi-square test of independence, using the weighted counts as cell values.
///
/// Not computable when the table has fewer than 2 populated rows or columns, or when
/// an expected count is zero.
pub fn chi_square_test(
    table: &ContingencyTable,
    rules: &AnalysisRules,
) -> Result<ChiSquareTest, AnalysisErrors> {
    check_weighted(table)?;
    let populated_rows = table.populated_rows();
    let populated_cols = table.populated_cols();
    if populated_rows < 2 || populated_cols < 2 {
        return Err(AnalysisErrors::TooFewCategories {
            rows: populated_rows,
            cols: populated_cols,
        });
    }

    let total = table.total();
    let row_totals = table.row_totals();
    let col_totals = table.col_totals();
    let degrees_of_freedom = (table.num_rows() - 1) * (table.num_cols() - 1);
    let yates_correction = rules.yates_correction && degrees_of_freedom == 1;

    let mut expected = vec![vec![0.0; table.num_cols()]; table.num_rows()];
    let mut statistic = 0.0;
    for (i, rt) in row_totals.iter().enumerate() {
        for (j, ct) in col_totals.iter().enumerate() {
            let e = rt * ct / total;
            if e <= 0.0 {
                return Err(AnalysisErrors::ZeroExpectedCount {
                    row: table.row_categories[i].clone(),
                    col: table.col_categories[j].clone(),
                });
            }
            let mut d = (table.weighted[i][j] - e).abs();
            if yates_correction {
                d = (d - 0.5).max(0.0);
            }
            statistic += d * d / e;
            expected[i][j] = e;
        }
    }
    let p_value = chi_square_p_value(statistic, degrees_of_freedom);
    debug!(
        "chi_square_test: statistic: {} dof: {} p: {} yates: {}",
        statistic, degrees_of_freedom, p_value, yates_correction
    );
    Ok(ChiSquareTest {
        statistic,
        degrees_of_freedom,
        p_value,
        yates_correction,
        expected,
    })
}

/// Upper tail probability of the chi-square distribution.
fn chi_square_p_value(statistic: f64, degrees_of_freedom: usize) -> f64 {
    if statistic <= 0.0 {
        return 1.0;
    }
    match ChiSquared::new(degrees_of_freedom as f64) {
        Ok(dist) => dist.sf(statistic).clamp(0.0, 1.0),
        Err(e) => {
            warn!(
                "chi_square_p_value: no distribution for {} degrees of freedom: {:?}",
                degrees_of_freedom, e
            );
            f64::NAN
        }
    }
}

/// Cramér's V = sqrt(chi2 / (N * min(rows - 1, cols - 1))).
///
/// Returns 0 when `total` is zero or when the table has a single row or column.
pub fn cramers_v(statistic: f64, total: f64, num_rows: usize, num_cols: usize) -> f64 {
    let min_dim = num_rows.min(num_cols).saturating_sub(1);
    if total <= 0.0 || min_dim == 0 || statistic <= 0.0 {
        return 0.0;
    }
    (statistic / (total * min_dim as f64)).sqrt().clamp(0.0, 1.0)
}

/// Chi-square test and effect size of a table.
pub fn association(
    table: &ContingencyTable,
    rules: &AnalysisRules,
) -> Result<Association, AnalysisErrors> {
    let chi_square = chi_square_test(table, rules)?;
    let v = cramers_v(
        chi_square.statistic,
        table.total(),
        table.num_rows(),
        table.num_cols(),
    );
    Ok(Association {
        effect: EffectSize::from_cramers_v(v),
        significance: Significance::from_p_value(chi_square.p_value),
        cramers_v: v,
        chi_square,
    })
}

// **** Confidence intervals ****

/// The two-sided normal quantile for the confidence level of the rules (1.96 for 95%).
pub fn critical_value(rules: &AnalysisRules) -> Result<f64, AnalysisErrors> {
    rules.validate()?;
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| AnalysisErrors::InvalidRules(format!("{:?}", e)))?;
    Ok(normal.inverse_cdf(1.0 - (1.0 - rules.confidence_level) / 2.0))
}

/// The sample size entering the variance of a weighted proportion.
pub fn effective_sample_size(
    sum_weights: f64,
    sum_squared_weights: f64,
    method: EffectiveSampleSize,
) -> f64 {
    match method {
        EffectiveSampleSize::Kish if sum_squared_weights > 0.0 => {
            sum_weights * sum_weights / sum_squared_weights
        }
        EffectiveSampleSize::Kish => 0.0,
        EffectiveSampleSize::WeightSum => sum_weights.max(0.0),
    }
}

/// Confidence interval of the proportion `weighted_count / total`.
///
/// Arguments:
/// * `z` the critical value (see [`critical_value`])
/// * `effective_n` the sample size of the variance (see [`effective_sample_size`])
///
/// The bounds are clipped to [0, 1] and always surround the proportion.
pub fn proportion_interval(
    weighted_count: f64,
    total: f64,
    effective_n: f64,
    z: f64,
    method: IntervalMethod,
) -> Result<Interval, AnalysisErrors> {
    if !(total > 0.0) || !(effective_n > 0.0) {
        return Err(AnalysisErrors::NoValidWeights);
    }
    let p = (weighted_count / total).clamp(0.0, 1.0);
    let variance = p * (1.0 - p) / effective_n;
    let std_error = variance.sqrt();
    let (lower, upper) = match method {
        IntervalMethod::Wald => (p - z * std_error, p + z * std_error),
        IntervalMethod::Wilson => {
            let z2n = z * z / effective_n;
            let denom = 1.0 + z2n;
            let center = (p + z2n / 2.0) / denom;
            let half = z * (variance + z2n / (4.0 * effective_n)).sqrt() / denom;
            (center - half, center + half)
        }
    };
    Ok(Interval {
        proportion: p,
        std_error,
        lower: lower.max(0.0).min(p),
        upper: upper.min(1.0).max(p),
        effective_n,
    })
}

fn tally_intervals(
    tally: &Tally,
    rules: &AnalysisRules,
) -> Result<Vec<ProportionInterval>, AnalysisErrors> {
    let z = critical_value(rules)?;
    let total = tally.total();
    let n = effective_sample_size(total, tally.squared_total(), rules.effective_sample_size);
    debug!(
        "tally_intervals: total weight: {} effective n: {} z: {}",
        total, n, z
    );
    Ok(tally
        .categories
        .iter()
        .enumerate()
        .map(|(idx, c)| ProportionInterval {
            category: c.clone(),
            weighted_count: tally.weights[idx],
            respondents: tally.respondents[idx],
            interval: proportion_interval(tally.weights[idx], total, n, z, rules.interval_method),
        })
        .collect())
}

/// Weighted distribution of the answers to one column, with a confidence interval for
/// the share of each category.
///
/// The categories are all the answers given, even by respondents without a usable
/// weight: when no weight is usable, every interval reports
/// [`AnalysisErrors::NoValidWeights`].
pub fn proportion_intervals(
    dataset: &Dataset,
    variable: &str,
    weight_variable: &str,
    rules: &AnalysisRules,
) -> Result<Vec<ProportionInterval>, AnalysisErrors> {
    proportion_intervals_with_categories(dataset, variable, weight_variable, &[], rules)
}

/// Same as [`proportion_intervals`], and the `declared` categories that nobody chose are
/// also listed, with a weight of zero.
///
/// Declared categories excluded by the rules are not listed.
pub fn proportion_intervals_with_categories(
    dataset: &Dataset,
    variable: &str,
    weight_variable: &str,
    declared: &[String],
    rules: &AnalysisRules,
) -> Result<Vec<ProportionInterval>, AnalysisErrors> {
    rules.validate()?;
    let values = column_values(dataset, variable)?;
    let weights = read_weights(dataset, weight_variable);
    info!(
        "proportion_intervals: {:?} weighted by {:?}",
        variable, weight_variable
    );

    let answers: Vec<(&str, Option<f64>)> = values
        .iter()
        .zip(weights.iter())
        .filter_map(|(v, w)| read_category(v, rules).map(|c| (c, usable_weight(*w))))
        .collect();
    let declared: Vec<Option<String>> = declared.iter().map(|c| Some(c.clone())).collect();
    let categories = distinct_sorted(
        answers
            .iter()
            .map(|(c, _)| *c)
            .chain(declared.iter().filter_map(|c| read_category(c, rules))),
    );
    let idx = index_of(&categories);
    let mut tally = Tally {
        weights: vec![0.0; categories.len()],
        squared_weights: vec![0.0; categories.len()],
        respondents: vec![0; categories.len()],
        categories: categories.clone(),
    };
    for (c, w) in answers.iter() {
        if let Some(w) = w {
            let i = idx[c];
            tally.weights[i] += w;
            tally.squared_weights[i] += w * w;
            tally.respondents[i] += 1;
        }
    }
    tally_intervals(&tally, rules)
}

/// Distribution of the row variable over the respondents of the table.
pub fn marginal_intervals(
    table: &ContingencyTable,
    rules: &AnalysisRules,
) -> Result<Vec<ProportionInterval>, AnalysisErrors> {
    check_weighted(table)?;
    let tally = Tally {
        categories: table.row_categories.clone(),
        weights: table.row_totals(),
        squared_weights: table.row_squared_totals(),
        respondents: table.respondents.iter().map(|r| r.iter().sum()).collect(),
    };
    tally_intervals(&tally, rules)
}

/// Share of each row category within each column group, with its confidence interval.
///
/// The effective sample size is computed separately for each column group.
pub fn cell_intervals(
    table: &ContingencyTable,
    rules: &AnalysisRules,
) -> Result<Vec<CellInterval>, AnalysisErrors> {
    let z = critical_value(rules)?;
    let col_totals = table.col_totals();
    let col_squared = table.col_squared_totals();
    let mut res: Vec<CellInterval> = Vec::new();
    for (j, col) in table.col_categories.iter().enumerate() {
        let n = effective_sample_size(col_totals[j], col_squared[j], rules.effective_sample_size);
        for (i, row) in table.row_categories.iter().enumerate() {
            res.push(CellInterval {
                row: row.clone(),
                col: col.clone(),
                weighted_count: table.weighted[i][j],
                interval: proportion_interval(
                    table.weighted[i][j],
                    col_totals[j],
                    n,
                    z,
                    rules.interval_method,
                ),
            });
        }
    }
    Ok(res)
}

// **** Complete analyses ****

/// Runs all the statistics for one pair of columns.
///
/// Only invalid inputs (unknown columns, invalid rules) are errors. The statistics that
/// are not defined for the data are reported inside the [`CrosstabReport`].
pub fn run_crosstab_stats(
    dataset: &Dataset,
    row_variable: &str,
    col_variable: &str,
    weight_variable: &str,
    rules: &AnalysisRules,
) -> Result<CrosstabReport, AnalysisErrors> {
    let table = weighted_crosstab(dataset, row_variable, col_variable, weight_variable, rules)?;
    let association = association(&table, rules);
    match &association {
        Ok(a) => info!(
            "run_crosstab_stats: chi2: {:.3} dof: {} p: {:.3e} V: {:.3}",
            a.chi_square.statistic,
            a.chi_square.degrees_of_freedom,
            a.chi_square.p_value,
            a.cramers_v
        ),
        Err(e) => info!("run_crosstab_stats: {}", e),
    }
    let row_intervals = marginal_intervals(&table, rules);
    let cell_intervals = cell_intervals(&table, rules)?;
    Ok(CrosstabReport {
        table,
        association,
        row_intervals,
        cell_intervals,
    })
}

/// Tests the association of every (question, demographic) pair.
///
/// Pairs that refer to a column absent from the dataset are skipped. Pairs for which the
/// test is not computable are kept, with the reason.
pub fn run_battery(
    dataset: &Dataset,
    pairs: &[(String, String)],
    weight_variable: &str,
    rules: &AnalysisRules,
) -> Result<Vec<BatteryEntry>, AnalysisErrors> {
    info!("run_battery: {} pairs", pairs.len());
    let mut res: Vec<BatteryEntry> = Vec::new();
    for (question, demographic) in pairs.iter() {
        if !dataset.has_column(question) || !dataset.has_column(demographic) {
            warn!(
                "run_battery: skipping {:?} x {:?}: column not found",
                question, demographic
            );
            continue;
        }
        let table = weighted_crosstab(dataset, question, demographic, weight_variable, rules)?;
        res.push(BatteryEntry {
            question: question.clone(),
            demographic: demographic.clone(),
            association: association(&table, rules),
        });
    }
    Ok(res)
}

/// Respondent count and weighted total of a dataset.
pub fn summarize(dataset: &Dataset, weight_variable: &str) -> DatasetSummary {
    let valid: Vec<f64> = read_weights(dataset, weight_variable)
        .into_iter()
        .filter_map(usable_weight)
        .collect();
    DatasetSummary {
        respondents: dataset.num_rows(),
        weighted_total: if valid.is_empty() {
            None
        } else {
            Some(valid.iter().sum())
        },
        columns: dataset.column_names(),
    }
}

#[cfg(test)]
mod tests {
    use super::builder::DatasetBuilder;
    use super::*;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn dataset(header: &[&str], rows: &[&[&str]]) -> Dataset {
        let names: Vec<String> = header.iter().map(|s| s.to_string()).collect();
        let mut b = DatasetBuilder::new(&names).unwrap();
        for r in rows.iter() {
            b.add_row_simple(r).unwrap();
        }
        b.build().unwrap()
    }

    fn table(cells: &[&[f64]]) -> ContingencyTable {
        let num_cols = cells[0].len();
        ContingencyTable {
            row_variable: "r".to_string(),
            col_variable: "c".to_string(),
            row_categories: (0..cells.len()).map(|i| format!("r{}", i)).collect(),
            col_categories: (0..num_cols).map(|j| format!("c{}", j)).collect(),
            weighted: cells.iter().map(|r| r.to_vec()).collect(),
            squared_weights: cells.iter().map(|r| r.to_vec()).collect(),
            respondents: cells
                .iter()
                .map(|r| r.iter().map(|x| x.ceil() as u64).collect())
                .collect(),
            excluded: 0,
            invalid_weights: 0,
        }
    }

    fn no_yates() -> AnalysisRules {
        AnalysisRules {
            yates_correction: false,
            ..AnalysisRules::DEFAULT_RULES
        }
    }

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

    /// A mix of weights, missing answers and a refused code.
    fn panel() -> Dataset {
        dataset(
            &["Q", "D", "W"],
            &[
                &["1", "1", "0.8"],
                &["1", "2", "1.2"],
                &["2", "1", "1.5"],
                &["2", "2", "0.4"],
                &["3", "1", "2.0"],
                &["3", "2", "0.7"],
                &["1", "1", "1.1"],
                &["2", "2", "0.9"],
                &["", "1", "1.0"],
                &["99", "2", "1.3"],
                &["3", "", "0.6"],
                &["1", "2", ""],
                &["3", "1", "1.4"],
            ],
        )
    }

    fn refused_rules() -> AnalysisRules {
        AnalysisRules {
            excluded_values: vec!["99".to_string()],
            ..AnalysisRules::DEFAULT_RULES
        }
    }

    #[test]
    fn four_respondents_scenario() {
        init();
        let ds = dataset(
            &["A", "B", "w"],
            &[
                &["yes", "x", "1"],
                &["yes", "y", "1"],
                &["no", "x", "1"],
                &["no", "y", "1"],
            ],
        );
        let report =
            run_crosstab_stats(&ds, "A", "B", "w", &AnalysisRules::DEFAULT_RULES).unwrap();
        assert_eq!(report.table.row_categories, vec!["no", "yes"]);
        assert_eq!(report.table.col_categories, vec!["x", "y"]);
        assert_eq!(report.table.weighted, vec![vec![1.0, 1.0], vec![1.0, 1.0]]);
        let a = report.association.unwrap();
        assert_eq!(a.chi_square.statistic, 0.0);
        assert_eq!(a.chi_square.degrees_of_freedom, 1);
        assert_eq!(a.chi_square.p_value, 1.0);
        assert_eq!(a.cramers_v, 0.0);
        assert_eq!(a.effect, EffectSize::Negligible);
        assert_eq!(a.significance, Significance::NotSignificant);
    }

    #[test]
    fn cells_sum_to_the_valid_weights() {
        init();
        let ds = panel();
        let rules = refused_rules();
        let t = weighted_crosstab(&ds, "Q", "D", "W", &rules).unwrap();
        let expected: f64 = [0.8, 1.2, 1.5, 0.4, 2.0, 0.7, 1.1, 0.9, 1.4].iter().sum();
        assert!(close(t.total(), expected, 1e-12));
        assert_eq!(t.total_respondents(), 9);
        assert_eq!(t.excluded, 4);
        assert_eq!(t.invalid_weights, 1);
        // Marginals are the sums of their cells.
        let rows: f64 = t.row_totals().iter().sum();
        let cols: f64 = t.col_totals().iter().sum();
        assert!(close(rows, t.total(), 1e-12));
        assert!(close(cols, t.total(), 1e-12));
        assert!(t.weighted.iter().flatten().all(|x| *x >= 0.0));
    }

    #[test]
    fn refused_code_is_excluded() {
        let ds = panel();
        let t = weighted_crosstab(&ds, "Q", "D", "W", &refused_rules()).unwrap();
        assert_eq!(t.row_categories, vec!["1", "2", "3"]);
        let t2 = weighted_crosstab(&ds, "Q", "D", "W", &AnalysisRules::DEFAULT_RULES).unwrap();
        assert_eq!(t2.row_categories, vec!["1", "2", "3", "99"]);
    }

    #[test]
    fn numeric_categories_sort_numerically() {
        let ds = dataset(
            &["A", "B", "w"],
            &[&["10", "x", "1"], &["2", "y", "1"], &["1", "x", "1"]],
        );
        let t = weighted_crosstab(&ds, "A", "B", "w", &AnalysisRules::DEFAULT_RULES).unwrap();
        assert_eq!(t.row_categories, vec!["1", "2", "10"]);
    }

    #[test]
    fn swapping_columns_transposes() {
        init();
        let ds = panel();
        for rules in [refused_rules(), no_yates()] {
            let r1 = run_crosstab_stats(&ds, "Q", "D", "W", &rules).unwrap();
            let r2 = run_crosstab_stats(&ds, "D", "Q", "W", &rules).unwrap();
            assert_eq!(r1.table.transpose(), r2.table);
            let a1 = r1.association.unwrap();
            let a2 = r2.association.unwrap();
            assert!(close(a1.chi_square.statistic, a2.chi_square.statistic, 1e-9));
            assert!(close(a1.chi_square.p_value, a2.chi_square.p_value, 1e-9));
            assert!(close(a1.cramers_v, a2.cramers_v, 1e-9));
            assert_eq!(
                a1.chi_square.degrees_of_freedom,
                a2.chi_square.degrees_of_freedom
            );
        }
    }

    #[test]
    fn chi_square_known_values() {
        let t = table(&[&[10.0, 20.0], &[30.0, 40.0]]);
        let res = chi_square_test(&t, &no_yates()).unwrap();
        assert!(close(res.statistic, 0.7936507936507936, 1e-9));
        assert!(close(res.p_value, 0.37299848361348714, 1e-6));
        assert!(!res.yates_correction);
        assert!(close(res.expected[0][0], 12.0, 1e-12));
        assert!(close(res.expected[1][1], 42.0, 1e-12));

        let corrected = chi_square_test(&t, &AnalysisRules::DEFAULT_RULES).unwrap();
        assert!(corrected.yates_correction);
        assert!(close(corrected.statistic, 0.44642857142857145, 1e-9));
        assert!(close(corrected.p_value, 0.5040358664525048, 1e-6));
    }

    #[test]
    fn tiny_p_values_do_not_underflow() {
        let t = table(&[&[150.0, 30.0], &[30.0, 150.0]]);
        let res = chi_square_test(&t, &no_yates()).unwrap();
        assert!(close(res.statistic, 160.0, 1e-9));
        // erfc(sqrt(80)), the upper tail of one degree of freedom at 160.
        let reference = 1.1314837902432894e-36;
        assert!(res.p_value > 0.0);
        assert!(((res.p_value - reference) / reference).abs() < 1e-6, "{}", res.p_value);
        let a = association(&t, &no_yates()).unwrap();
        assert_eq!(a.significance, Significance::P001);
    }

    #[test]
    fn yates_only_for_two_by_two() {
        let t = table(&[&[10.0, 20.0, 5.0], &[30.0, 40.0, 7.0]]);
        let res = chi_square_test(&t, &AnalysisRules::DEFAULT_RULES).unwrap();
        assert!(!res.yates_correction);
        assert_eq!(res.degrees_of_freedom, 2);
    }

    #[test]
    fn cramers_v_stays_in_unit_interval() {
        let tables = [
            table(&[&[10.0, 0.0, 0.0], &[0.0, 10.0, 0.0], &[0.0, 0.0, 10.0]]),
            table(&[&[10.0, 1.0], &[1.0, 10.0]]),
            table(&[&[3.5, 2.25, 7.0], &[0.5, 9.0, 1.0]]),
            table(&[&[1.0, 1.0], &[1.0, 1.0]]),
        ];
        for t in tables.iter() {
            for rules in [AnalysisRules::DEFAULT_RULES, no_yates()] {
                let a = association(t, &rules).unwrap();
                assert!(a.cramers_v >= 0.0 && a.cramers_v <= 1.0, "{:?}", a);
            }
        }
        // Perfect association on a square table.
        let a = association(&tables[0], &no_yates()).unwrap();
        assert!(close(a.cramers_v, 1.0, 1e-12));
        assert_eq!(a.effect, EffectSize::Large);
        assert_eq!(a.significance, Significance::P001);
    }

    #[test]
    fn cramers_v_guards_empty_totals() {
        assert_eq!(cramers_v(5.0, 0.0, 2, 2), 0.0);
        assert_eq!(cramers_v(5.0, 10.0, 1, 3), 0.0);
        assert!(close(cramers_v(10.0, 10.0, 2, 2), 1.0, 1e-12));
    }

    #[test]
    fn single_category_is_not_computable() {
        init();
        let ds = dataset(
            &["A", "B", "w"],
            &[&["yes", "x", "1"], &["yes", "y", "2"], &["yes", "x", "1"]],
        );
        let report =
            run_crosstab_stats(&ds, "A", "B", "w", &AnalysisRules::DEFAULT_RULES).unwrap();
        assert_eq!(
            report.association,
            Err(AnalysisErrors::TooFewCategories { rows: 1, cols: 2 })
        );
        assert!(report.association.unwrap_err().is_not_computable());
        // The distribution is still available.
        let rows = report.row_intervals.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(close(rows[0].interval.clone().unwrap().proportion, 1.0, 1e-12));
    }

    #[test]
    fn zero_weight_category_has_zero_expected_count() {
        let ds = dataset(
            &["A", "B", "w"],
            &[
                &["yes", "x", "1"],
                &["yes", "y", "2"],
                &["no", "x", "1"],
                &["no", "y", "1"],
                &["maybe", "x", "0"],
            ],
        );
        let t = weighted_crosstab(&ds, "A", "B", "w", &AnalysisRules::DEFAULT_RULES).unwrap();
        assert_eq!(
            chi_square_test(&t, &AnalysisRules::DEFAULT_RULES),
            Err(AnalysisErrors::ZeroExpectedCount {
                row: "maybe".to_string(),
                col: "x".to_string()
            })
        );
    }

    #[test]
    fn missing_weights_are_not_computable() {
        init();
        let ds = dataset(
            &["A", "B", "w"],
            &[&["yes", "x", ""], &["no", "y", ""], &["no", "x", ""]],
        );
        let rules = AnalysisRules::DEFAULT_RULES;
        let intervals = proportion_intervals(&ds, "A", "w", &rules).unwrap();
        assert_eq!(intervals.len(), 2);
        for pi in intervals.iter() {
            assert_eq!(pi.interval, Err(AnalysisErrors::NoValidWeights));
        }
        let report = run_crosstab_stats(&ds, "A", "B", "w", &rules).unwrap();
        assert_eq!(report.association, Err(AnalysisErrors::NoValidWeights));
        assert_eq!(report.row_intervals, Err(AnalysisErrors::NoValidWeights));
        assert!(report.cell_intervals.is_empty());
    }

    #[test]
    fn absent_weight_column_is_not_computable() {
        let ds = panel();
        let intervals =
            proportion_intervals(&ds, "Q", "NOPE", &AnalysisRules::DEFAULT_RULES).unwrap();
        assert!(!intervals.is_empty());
        assert!(intervals
            .iter()
            .all(|pi| pi.interval == Err(AnalysisErrors::NoValidWeights)));
        let a = run_crosstab_stats(&ds, "Q", "D", "NOPE", &AnalysisRules::DEFAULT_RULES)
            .unwrap()
            .association;
        assert_eq!(a, Err(AnalysisErrors::NoValidWeights));
    }

    #[test]
    fn all_zero_weights_are_not_computable() {
        let ds = dataset(
            &["A", "B", "w"],
            &[&["yes", "x", "0"], &["no", "y", "0"], &["no", "x", "0"]],
        );
        let report =
            run_crosstab_stats(&ds, "A", "B", "w", &AnalysisRules::DEFAULT_RULES).unwrap();
        assert_eq!(report.association, Err(AnalysisErrors::NoValidWeights));
        assert!(report
            .cell_intervals
            .iter()
            .all(|c| c.interval == Err(AnalysisErrors::NoValidWeights)));
    }

    #[test]
    fn unknown_column_is_an_error() {
        let ds = panel();
        let res = run_crosstab_stats(&ds, "Q", "XX", "W", &AnalysisRules::DEFAULT_RULES);
        assert_eq!(res.err(), Some(AnalysisErrors::UnknownColumn("XX".to_string())));
        let res = proportion_intervals(&ds, "XX", "W", &AnalysisRules::DEFAULT_RULES);
        assert_eq!(res.err(), Some(AnalysisErrors::UnknownColumn("XX".to_string())));
    }

    #[test]
    fn empty_selection() {
        let ds = dataset(&["A", "B", "w"], &[&["yes", "", "1"], &["", "x", "1"]]);
        let report =
            run_crosstab_stats(&ds, "A", "B", "w", &AnalysisRules::DEFAULT_RULES).unwrap();
        assert_eq!(report.association, Err(AnalysisErrors::EmptySelection));
    }

    #[test]
    fn wald_interval_values() {
        let z = critical_value(&AnalysisRules::DEFAULT_RULES).unwrap();
        assert!(close(z, 1.959963984540054, 1e-6));
        let i = proportion_interval(50.0, 100.0, 100.0, z, IntervalMethod::Wald).unwrap();
        assert!(close(i.proportion, 0.5, 1e-12));
        assert!(close(i.std_error, 0.05, 1e-12));
        assert!(close(i.lower, 0.5 - z * 0.05, 1e-12));
        assert!(close(i.upper, 0.5 + z * 0.05, 1e-12));
    }

    #[test]
    fn interval_bounds_are_ordered_and_clipped() {
        let z = critical_value(&AnalysisRules::DEFAULT_RULES).unwrap();
        for method in [IntervalMethod::Wald, IntervalMethod::Wilson] {
            for (count, total, n) in [
                (0.0, 10.0, 10.0),
                (10.0, 10.0, 10.0),
                (1.0, 10.0, 3.0),
                (9.5, 10.0, 2.0),
                (0.3, 1.7, 1.2),
                (4.0, 7.0, 0.5),
            ] {
                let i = proportion_interval(count, total, n, z, method).unwrap();
                assert!(i.lower <= i.proportion && i.proportion <= i.upper, "{:?}", i);
                assert!(i.lower >= 0.0 && i.upper <= 1.0, "{:?}", i);
            }
        }
        assert_eq!(
            proportion_interval(1.0, 0.0, 10.0, z, IntervalMethod::Wald),
            Err(AnalysisErrors::NoValidWeights)
        );
    }

    #[test]
    fn wilson_is_narrower_near_the_edges() {
        let z = critical_value(&AnalysisRules::DEFAULT_RULES).unwrap();
        let wilson = proportion_interval(0.0, 20.0, 20.0, z, IntervalMethod::Wilson).unwrap();
        let wald = proportion_interval(0.0, 20.0, 20.0, z, IntervalMethod::Wald).unwrap();
        // Wald collapses to a point at p = 0, Wilson does not.
        assert_eq!(wald.upper, 0.0);
        assert!(wilson.upper > 0.0);
    }

    #[test]
    fn kish_size_with_equal_weights_is_the_count() {
        assert!(close(
            effective_sample_size(12.0 * 2.5, 12.0 * 2.5 * 2.5, EffectiveSampleSize::Kish),
            12.0,
            1e-9
        ));
        assert_eq!(
            effective_sample_size(30.0, 0.0, EffectiveSampleSize::WeightSum),
            30.0
        );
        assert_eq!(effective_sample_size(0.0, 0.0, EffectiveSampleSize::Kish), 0.0);
    }

    #[test]
    fn distribution_of_one_column() {
        init();
        let ds = panel();
        let res = proportion_intervals(&ds, "Q", "W", &refused_rules()).unwrap();
        let cats: Vec<&str> = res.iter().map(|p| p.category.as_str()).collect();
        assert_eq!(cats, vec!["1", "2", "3"]);
        // Row "1, 2, ''" has no weight: it is listed but does not count.
        assert_eq!(res[0].respondents, 3);
        assert!(close(res[0].weighted_count, 0.8 + 1.2 + 1.1, 1e-12));
        let total: f64 = res
            .iter()
            .map(|p| p.interval.clone().unwrap().proportion)
            .sum();
        assert!(close(total, 1.0, 1e-12));
    }

    #[test]
    fn declared_categories_without_answers() {
        let ds = panel();
        let declared: Vec<String> = ["1", "2", "3", "4", "99"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let res =
            proportion_intervals_with_categories(&ds, "Q", "W", &declared, &refused_rules())
                .unwrap();
        let cats: Vec<&str> = res.iter().map(|p| p.category.as_str()).collect();
        assert_eq!(cats, vec!["1", "2", "3", "4"]);
        assert_eq!(res[3].respondents, 0);
        assert_eq!(res[3].weighted_count, 0.0);
        let empty = res[3].interval.clone().unwrap();
        assert_eq!(empty.proportion, 0.0);
        assert_eq!(empty.upper, 0.0);
        // The observed categories keep their shares.
        let observed = proportion_intervals(&ds, "Q", "W", &refused_rules()).unwrap();
        for (a, b) in observed.iter().zip(res.iter()) {
            assert_eq!(a, b);
        }
    }

    #[test]
    fn cell_intervals_are_within_column_groups() {
        let ds = panel();
        let report = run_crosstab_stats(&ds, "Q", "D", "W", &refused_rules()).unwrap();
        assert_eq!(
            report.cell_intervals.len(),
            report.table.num_rows() * report.table.num_cols()
        );
        for col in report.table.col_categories.iter() {
            let s: f64 = report
                .cell_intervals
                .iter()
                .filter(|c| &c.col == col)
                .map(|c| c.interval.clone().unwrap().proportion)
                .sum();
            assert!(close(s, 1.0, 1e-12));
        }
    }

    #[test]
    fn battery_skips_unknown_columns() {
        init();
        let ds = panel();
        let pairs = vec![
            ("Q".to_string(), "D".to_string()),
            ("Q".to_string(), "MISSING".to_string()),
            ("D".to_string(), "D".to_string()),
        ];
        let res = run_battery(&ds, &pairs, "W", &refused_rules()).unwrap();
        assert_eq!(res.len(), 2);
        assert!(res[0].association.is_ok());
        assert_eq!(res[1].question, "D");
        // A variable against itself is a diagonal table: perfect association.
        let a = res[1].association.clone().unwrap();
        assert!(a.cramers_v > 0.0 && a.cramers_v <= 1.0);
    }

    #[test]
    fn summary_counts_valid_weights() {
        let ds = panel();
        let s = summarize(&ds, "W");
        assert_eq!(s.respondents, 13);
        assert_eq!(s.columns, vec!["Q", "D", "W"]);
        assert!(close(s.weighted_total.unwrap(), 12.9, 1e-9));
        assert_eq!(summarize(&ds, "NOPE").weighted_total, None);
    }

    #[test]
    fn invalid_confidence_level() {
        let rules = AnalysisRules {
            confidence_level: 1.5,
            ..AnalysisRules::DEFAULT_RULES
        };
        assert!(matches!(
            critical_value(&rules),
            Err(AnalysisErrors::InvalidRules(_))
        ));
    }
}
