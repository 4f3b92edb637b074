//! Tabular data: every column but the last is an input, the last one is the target.

use std::{fs, io, path::Path};

use thiserror::Error;

/// Rows of real numbers, all of the same width.
#[derive(Clone, Debug, PartialEq)]
pub struct Dataset {
    rows: Vec<Vec<f64>>,
    columns: usize,
}

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Failed to read dataset: {0}")]
    Io(#[from] io::Error),
    #[error("Line {line}: cannot parse {token:?} as a number")]
    Parse { line: usize, token: String },
    #[error("Row {row} has {got} columns, but expected {expected}!")]
    Ragged {
        row: usize,
        expected: usize,
        got: usize,
    },
    #[error("Rows must have at least 2 columns (inputs and target), but got {0}!")]
    TooFewColumns(usize),
    #[error("Dataset has no rows")]
    Empty,
    #[error("Row {row}, column {column} is not a finite number")]
    NonFinite { row: usize, column: usize },
}

impl Dataset {
    /// Builds a dataset from in-memory rows.
    ///
    /// # Examples
    /// ```
    /// # use evonnet::Dataset;
    /// let data = Dataset::from_rows(vec![vec![0.0, 1.0, 2.0], vec![1.0, 0.0, 3.0]]).unwrap();
    /// assert_eq!(data.input_count(), 2);
    /// assert_eq!(data.target(1), 3.0);
    /// ```
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Dataset, DatasetError> {
        let columns = match rows.first() {
            Some(row) => row.len(),
            None => return Err(DatasetError::Empty),
        };
        if columns < 2 {
            return Err(DatasetError::TooFewColumns(columns));
        }
        if let Some((row, bad)) = rows.iter().enumerate().find(|(_, r)| r.len() != columns) {
            return Err(DatasetError::Ragged {
                row,
                expected: columns,
                got: bad.len(),
            });
        }
        for (row, values) in rows.iter().enumerate() {
            if let Some(column) = values.iter().position(|v| !v.is_finite()) {
                return Err(DatasetError::NonFinite { row, column });
            }
        }
        Ok(Dataset { rows, columns })
    }

    /// Parses whitespace-separated numbers, one row per line. Blank lines are skipped.
    pub fn parse(text: &str) -> Result<Dataset, DatasetError> {
        let mut rows = Vec::new();
        for (i, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let row = line
                .split_whitespace()
                .map(|token| {
                    token.parse::<f64>().map_err(|_| DatasetError::Parse {
                        line: i + 1,
                        token: token.to_owned(),
                    })
                })
                .collect::<Result<Vec<f64>, _>>()?;
            rows.push(row);
        }
        Dataset::from_rows(rows)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Dataset, DatasetError> {
        let text = fs::read_to_string(path)?;
        Dataset::parse(&text)
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> &[f64] {
        &self.rows[index]
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns
    }

    pub fn input_count(&self) -> usize {
        self.columns - 1
    }

    pub fn value_at(&self, row: usize, column: usize) -> f64 {
        self.rows[row][column]
    }

    /// Regression target of a row (its last column).
    pub fn target(&self, row: usize) -> f64 {
        self.rows[row][self.columns - 1]
    }

    /// Rescales every value into `[-1, 1]` using one global minimum and maximum.
    /// Original values are lost. A constant dataset becomes all zeros.
    pub fn normalize(&mut self) {
        let (min, max) = self
            .rows
            .iter()
            .flatten()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), &v| {
                (min.min(v), max.max(v))
            });
        let range = max - min;

        for v in self.rows.iter_mut().flatten() {
            *v = if range > 0.0 {
                2.0 * (*v - min) / range - 1.0
            } else {
                0.0
            };
        }
    }

    /// Splits row indices into a leading training part holding `fraction` of the rows
    /// and a trailing test part with the rest.
    pub fn split_at(&self, fraction: f64) -> (Vec<usize>, Vec<usize>) {
        let fraction = fraction.max(0.0).min(1.0);
        let training = (self.rows.len() as f64 * fraction).floor() as usize;
        ((0..training).collect(), (training..self.rows.len()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rows() {
        let data = Dataset::parse("1 2 3\n\n  4 5   6 \n").unwrap();
        assert_eq!(data.row_count(), 2);
        assert_eq!(data.column_count(), 3);
        assert_eq!(data.value_at(1, 1), 5.0);
        assert_eq!(data.target(0), 3.0);
        assert_eq!(data.row(1), &[4.0, 5.0, 6.0]);
    }

    #[test]
    fn parse_errors() {
        match Dataset::parse("1 2\n3 x\n") {
            Err(DatasetError::Parse { line, token }) => {
                assert_eq!(line, 2);
                assert_eq!(token, "x");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            Dataset::parse("1 2 3\n4 5\n"),
            Err(DatasetError::Ragged {
                row: 1,
                expected: 3,
                got: 2
            })
        ));
        assert!(matches!(
            Dataset::parse("1 2\nnan 1.0\n"),
            Err(DatasetError::NonFinite { row: 1, column: 0 })
        ));
        assert!(matches!(
            Dataset::parse("1 inf\n"),
            Err(DatasetError::NonFinite { row: 0, column: 1 })
        ));
        assert!(matches!(Dataset::parse("\n"), Err(DatasetError::Empty)));
        assert!(matches!(
            Dataset::parse("1\n2\n"),
            Err(DatasetError::TooFewColumns(1))
        ));
    }

    #[test]
    fn normalize_into_unit_range() {
        let mut data = Dataset::from_rows(vec![vec![-2.0, 0.0], vec![6.0, 2.0]]).unwrap();
        data.normalize();
        assert_eq!(data.row(0), &[-1.0, -0.5]);
        assert_eq!(data.row(1), &[1.0, 0.0]);

        let mut flat = Dataset::from_rows(vec![vec![3.0, 3.0]]).unwrap();
        flat.normalize();
        assert_eq!(flat.row(0), &[0.0, 0.0]);
    }

    #[test]
    fn split_in_half() {
        let data = Dataset::from_rows((0..5).map(|i| vec![i as f64, 0.0]).collect()).unwrap();
        let (training, test) = data.split_at(0.5);
        assert_eq!(training, vec![0, 1]);
        assert_eq!(test, vec![2, 3, 4]);
    }
}
