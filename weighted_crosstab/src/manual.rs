/*!

This is the long-form manual for `weighted_crosstab` and `surveytab`.

## Data

A [`Dataset`](crate::Dataset) holds the answers of the respondents column by column.
Every value is either a category (the text of the answer, usually a numeric survey code)
or missing. One of the columns holds the survey weights.

The following answers are treated as missing:
* empty cells (and the usual missing markers `NA`, `NaN`, `null` when reading files)
* the codes listed in [`AnalysisRules::excluded_values`](crate::AnalysisRules), typically
  `99` for "Refused"

A weight is usable if it is a finite, non-negative number. Respondents without a usable
weight do not contribute to any weighted sum.

## Contingency tables

The weighted cell `(a, b)` is the sum of the weights of the respondents who answered `a`
to the first item and `b` to the second item. Respondents with a missing answer to either
item are excluded. Hence the sum of all the cells is the sum of the weights of the
respondents that answered both items.

Categories are sorted numerically when they are all numbers, alphabetically otherwise.
A table only has the categories that were answered. The distribution of a single item
(see [`proportion_intervals_with_categories`](crate::proportion_intervals_with_categories))
also lists the declared codes nobody chose, at 0%.

## Chi-square test

The Pearson statistic is computed on the weighted cells:

```text
E[i][j] = R[i] * C[j] / N
chi2    = Σ (|O[i][j] - E[i][j]| - c)² / E[i][j]
```

where `c = 0.5` for 2x2 tables when the Yates correction is enabled (the default), and `0`
otherwise. The degrees of freedom are `(rows - 1) * (cols - 1)` and the p-value is the
upper tail of the chi-square distribution.

The test is not computable when fewer than 2 rows or 2 columns carry weight, or when an
expected count is zero (a category whose respondents all have a weight of zero).

## Cramér's V

```text
V = sqrt(chi2 / (N * min(rows - 1, cols - 1)))
```

`V` is 0 when `N` is 0. The usual reading is:

| V | effect |
|---|---|
| <= 0.1 | negligible |
| 0.1 - 0.3 | small |
| 0.3 - 0.5 | medium |
| > 0.5 | large |

## Confidence intervals

For a weighted proportion `p = w / W`:

```text
Wald:   p ± z * sqrt(p (1 - p) / n)
Wilson: (p + z²/2n ± z sqrt(p (1 - p)/n + z²/4n²)) / (1 + z²/n)
```

with `z` the normal quantile of the confidence level (1.96 at 95%). Both are clipped to
`[0, 1]`.

The effective sample size `n` is by default the Kish approximation
`n = (Σw)² / Σw²`, which accounts for the loss of precision due to unequal weights
(it equals the number of respondents when all the weights are equal). The simpler choice
`n = Σw` is available with
[`EffectiveSampleSize::WeightSum`](crate::EffectiveSampleSize).

For the cells of a contingency table, `p` is the share of the row category within the
column group, and `n` is computed from the weights of that column group only.

## The `surveytab` program

`surveytab` reads a JSON configuration describing the data file, the weight column, the
labels of the variables and the tests to run:

```json
{
  "outputSettings": { "surveyName": "American Trends Panel W152" },
  "dataSource": {
    "provider": "csv",
    "filePath": "ATP W152.csv",
    "weightColumn": "WEIGHT_W152",
    "refusedCodes": ["99"]
  },
  "variables": [
    { "column": "CNCEXC_W152", "label": "More concerned or excited about AI?",
      "role": "question",
      "values": { "1": "More excited", "2": "Equally", "3": "More concerned" } },
    { "column": "F_AGECAT", "label": "Age Group",
      "role": "demographic", "values": { "1": "18-29", "2": "30-49", "3": "50-64", "4": "65+" } }
  ],
  "rules": { "intervalMethod": "wald", "effectiveSampleSize": "kish" }
}
```

Examples:

```bash
# One crosstab
surveytab -c w152.json --row CNCEXC_W152 --col F_AGECAT
# Weighted distribution of one item
surveytab -c w152.json --column CNCEXC_W152
# All the question x demographic tests
surveytab -c w152.json --battery --out battery.json
# The interactive dashboard on http://127.0.0.1:8501
surveytab -c w152.json --serve
```

Without a configuration file, the data file and the weight column can be passed directly:

```bash
surveytab -i survey.csv --weight WEIGHT_W152 --row Q1 --col Q2
```
*/
