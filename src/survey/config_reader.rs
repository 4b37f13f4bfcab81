use crate::survey::*;

use std::collections::BTreeMap;

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(rename = "surveyName")]
    pub survey_name: String,
    #[serde(rename = "surveyDates")]
    pub survey_dates: Option<String>,
    #[serde(rename = "outputDirectory")]
    pub output_directory: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct DataSource {
    pub provider: String,
    #[serde(rename = "filePath")]
    pub file_path: String,
    #[serde(rename = "weightColumn")]
    pub weight_column: String,
    /// The answer codes treated as missing. Defaults to the "Refused" code 99.
    #[serde(rename = "refusedCodes")]
    pub refused_codes: Option<Vec<String>>,
    #[serde(rename = "excelWorksheetName")]
    pub excel_worksheet_name: Option<String>,
}

impl DataSource {
    pub fn refused_codes(&self) -> Vec<String> {
        self.refused_codes
            .clone()
            .unwrap_or_else(|| vec![DEFAULT_REFUSED_CODE.to_string()])
    }
}

pub const DEFAULT_REFUSED_CODE: &str = "99";

#[derive(Eq, PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
pub enum VariableRole {
    #[serde(rename = "question")]
    Question,
    #[serde(rename = "demographic")]
    Demographic,
}

impl VariableRole {
    pub fn name(&self) -> &'static str {
        match self {
            VariableRole::Question => "question",
            VariableRole::Demographic => "demographic",
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct SurveyVariable {
    pub column: String,
    pub label: Option<String>,
    pub role: Option<VariableRole>,
    /// Labels of the answer codes.
    pub values: Option<BTreeMap<String, String>>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RulesSettings {
    #[serde(rename = "confidenceLevel")]
    pub confidence_level: Option<f64>,
    #[serde(rename = "intervalMethod")]
    pub interval_method: Option<String>,
    #[serde(rename = "effectiveSampleSize")]
    pub effective_sample_size: Option<String>,
    #[serde(rename = "yatesCorrection")]
    pub yates_correction: Option<bool>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct TestPair {
    pub question: String,
    pub demographic: String,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct SurveyConfig {
    #[serde(rename = "outputSettings")]
    pub output_settings: OutputSettings,
    #[serde(rename = "dataSource")]
    pub data_source: DataSource,
    #[serde(default)]
    pub variables: Vec<SurveyVariable>,
    pub rules: Option<RulesSettings>,
    pub tests: Option<Vec<TestPair>>,
}

impl SurveyConfig {
    /// A configuration with no labels, for when only a data file is provided.
    pub fn from_data_file(file_path: &str, provider: &str, weight_column: &str) -> SurveyConfig {
        SurveyConfig {
            output_settings: OutputSettings {
                survey_name: io_common::simplify_file_name(file_path),
                survey_dates: None,
                output_directory: None,
            },
            data_source: DataSource {
                provider: provider.to_string(),
                file_path: file_path.to_string(),
                weight_column: weight_column.to_string(),
                refused_codes: None,
                excel_worksheet_name: None,
            },
            variables: Vec::new(),
            rules: None,
            tests: None,
        }
    }

    pub fn variable(&self, column: &str) -> Option<&SurveyVariable> {
        self.variables.iter().find(|v| v.column == column)
    }

    /// The display name of a column: its label if configured, the column name otherwise.
    pub fn variable_label(&self, column: &str) -> String {
        self.variable(column)
            .and_then(|v| v.label.clone())
            .unwrap_or_else(|| column.to_string())
    }

    /// The display name of an answer code.
    pub fn value_label(&self, column: &str, code: &str) -> String {
        self.variable(column)
            .and_then(|v| v.values.as_ref())
            .and_then(|vals| vals.get(code).cloned())
            .unwrap_or_else(|| code.to_string())
    }

    /// The answer codes configured for a column, in the order of the configuration.
    pub fn value_codes(&self, column: &str) -> Vec<String> {
        self.variable(column)
            .and_then(|v| v.values.as_ref())
            .map(|vals| vals.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn columns_with_role(&self, role: VariableRole) -> Vec<String> {
        self.variables
            .iter()
            .filter(|v| v.role == Some(role))
            .map(|v| v.column.clone())
            .collect()
    }

    /// The (question, demographic) pairs of the chi-square battery.
    ///
    /// These are the configured tests if there are any, or else all the combinations of
    /// the question and demographic variables.
    pub fn test_pairs(&self) -> Vec<(String, String)> {
        match &self.tests {
            Some(tests) if !tests.is_empty() => tests
                .iter()
                .map(|t| (t.question.clone(), t.demographic.clone()))
                .collect(),
            _ => {
                let demographics = self.columns_with_role(VariableRole::Demographic);
                self.columns_with_role(VariableRole::Question)
                    .iter()
                    .flat_map(|q| demographics.iter().map(move |d| (q.clone(), d.clone())))
                    .collect()
            }
        }
    }
}

pub fn read_config(path: &str) -> SurveyResult<SurveyConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let config: SurveyConfig =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    debug!("read_config: {:?}", config);
    Ok(config)
}

/// Reads a reference output. The content is parsed to make the comparison insensitive to
/// formatting.
pub fn read_summary(path: &str) -> SurveyResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(js)
}
