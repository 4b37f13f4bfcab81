// Rendering of the analysis results in JSON.

use crate::survey::*;

use serde_json::Map as JSMap;

fn variable_to_json(column: &str, config: &SurveyConfig) -> JSValue {
    json!({
        "column": column,
        "label": config.variable_label(column),
    })
}

fn categories_to_json(column: &str, categories: &[String], config: &SurveyConfig) -> Vec<JSValue> {
    categories
        .iter()
        .map(|code| json!({"code": code, "label": config.value_label(column, code)}))
        .collect()
}

fn not_computable(e: &AnalysisErrors) -> JSValue {
    json!({ "notComputable": e.to_string() })
}

pub fn interval_to_json(interval: &Result<Interval, AnalysisErrors>) -> JSValue {
    match interval {
        Ok(i) => json!({
            "proportion": i.proportion,
            "stdError": i.std_error,
            "lower": i.lower,
            "upper": i.upper,
            "effectiveN": i.effective_n,
        }),
        Err(e) => not_computable(e),
    }
}

pub fn association_to_json(association: &Result<Association, AnalysisErrors>) -> JSValue {
    match association {
        Ok(a) => json!({
            "chiSquare": a.chi_square.statistic,
            "degreesOfFreedom": a.chi_square.degrees_of_freedom,
            "pValue": a.chi_square.p_value,
            "yatesCorrection": a.chi_square.yates_correction,
            "expected": a.chi_square.expected,
            "cramersV": a.cramers_v,
            "effect": a.effect.label(),
            "significance": a.significance.stars(),
        }),
        Err(e) => not_computable(e),
    }
}

fn proportions_to_json(
    column: &str,
    intervals: &[ProportionInterval],
    config: &SurveyConfig,
) -> Vec<JSValue> {
    intervals
        .iter()
        .map(|pi| {
            json!({
                "code": pi.category,
                "label": config.value_label(column, &pi.category),
                "weightedCount": pi.weighted_count,
                "respondents": pi.respondents,
                "interval": interval_to_json(&pi.interval),
            })
        })
        .collect()
}

/// The table, its percentages, the test and the confidence intervals of one pair of
/// columns.
pub fn crosstab_to_json(report: &CrosstabReport, config: &SurveyConfig) -> JSValue {
    let table = &report.table;
    let row_intervals = match &report.row_intervals {
        Ok(pis) => json!(proportions_to_json(&table.row_variable, pis, config)),
        Err(e) => not_computable(e),
    };
    let cell_intervals: Vec<JSValue> = report
        .cell_intervals
        .iter()
        .map(|ci| {
            json!({
                "row": ci.row,
                "col": ci.col,
                "weightedCount": ci.weighted_count,
                "interval": interval_to_json(&ci.interval),
            })
        })
        .collect();
    json!({
        "rowVariable": variable_to_json(&table.row_variable, config),
        "colVariable": variable_to_json(&table.col_variable, config),
        "rowCategories": categories_to_json(&table.row_variable, &table.row_categories, config),
        "colCategories": categories_to_json(&table.col_variable, &table.col_categories, config),
        "weighted": table.weighted,
        "respondents": table.respondents,
        "rowTotals": table.row_totals(),
        "colTotals": table.col_totals(),
        "total": table.total(),
        "excluded": table.excluded,
        "rowPercentages": table.row_percentages(),
        "columnPercentages": table.column_percentages(),
        "association": association_to_json(&report.association),
        "rowIntervals": row_intervals,
        "cellIntervals": cell_intervals,
    })
}

pub fn distribution_to_json(
    column: &str,
    intervals: &[ProportionInterval],
    config: &SurveyConfig,
) -> JSValue {
    let total: f64 = intervals.iter().map(|pi| pi.weighted_count).sum();
    json!({
        "variable": variable_to_json(column, config),
        "totalWeight": total,
        "categories": proportions_to_json(column, intervals, config),
    })
}

/// The list of tests, and the matrix of Cramér's V of the computable ones
/// (questions in rows, demographics in columns).
pub fn battery_to_json(entries: &[BatteryEntry], config: &SurveyConfig) -> JSValue {
    let mut questions: Vec<String> = Vec::new();
    let mut demographics: Vec<String> = Vec::new();
    for e in entries.iter() {
        if !questions.contains(&e.question) {
            questions.push(e.question.clone());
        }
        if !demographics.contains(&e.demographic) {
            demographics.push(e.demographic.clone());
        }
    }

    let mut matrix: Vec<Vec<Option<f64>>> = vec![vec![None; demographics.len()]; questions.len()];
    let mut tests: Vec<JSValue> = Vec::new();
    let mut num_significant = 0;
    for e in entries.iter() {
        if let Ok(a) = &e.association {
            let i = questions.iter().position(|q| q == &e.question);
            let j = demographics.iter().position(|d| d == &e.demographic);
            if let (Some(i), Some(j)) = (i, j) {
                matrix[i][j] = Some(a.cramers_v);
            }
            if a.significance != Significance::NotSignificant {
                num_significant += 1;
            }
        }
        tests.push(json!({
            "question": variable_to_json(&e.question, config),
            "demographic": variable_to_json(&e.demographic, config),
            "association": association_to_json(&e.association),
        }));
    }

    json!({
        "tests": tests,
        "significantTests": num_significant,
        "cramersV": {
            "questions": questions
                .iter()
                .map(|q| variable_to_json(q, config))
                .collect::<Vec<JSValue>>(),
            "demographics": demographics
                .iter()
                .map(|d| variable_to_json(d, config))
                .collect::<Vec<JSValue>>(),
            "values": matrix,
        },
    })
}

pub fn summary_to_json(summary: &DatasetSummary, config: &SurveyConfig) -> JSValue {
    json!({
        "respondents": summary.respondents,
        "weightedTotal": summary.weighted_total,
        "weightColumn": config.data_source.weight_column,
        "columns": summary.columns,
    })
}

/// The configured variables that are present in the dataset. Without configured
/// variables, all the columns but the weight.
pub fn variables_to_json(dataset: &Dataset, config: &SurveyConfig) -> JSValue {
    let weight = config.data_source.weight_column.as_str();
    let res: Vec<JSValue> = if config.variables.is_empty() {
        dataset
            .column_names()
            .iter()
            .filter(|c| c.as_str() != weight)
            .map(|c| json!({"column": c, "label": c, "role": JSValue::Null, "values": {}}))
            .collect()
    } else {
        config
            .variables
            .iter()
            .filter(|v| {
                let present = dataset.has_column(&v.column);
                if !present {
                    warn!("variables_to_json: column {:?} not in the data", v.column);
                }
                present
            })
            .map(|v| {
                let values: JSMap<String, JSValue> = v
                    .values
                    .iter()
                    .flatten()
                    .map(|(code, label)| (code.clone(), json!(label)))
                    .collect();
                json!({
                    "column": v.column,
                    "label": config.variable_label(&v.column),
                    "role": v.role.map(|r| r.name()),
                    "values": values,
                })
            })
            .collect()
    };
    json!(res)
}
