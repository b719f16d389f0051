//! Converted time-history tables.

use crate::error::{ResultsError, ResultsResult};

/// Column-oriented numeric table with the header row kept verbatim.
///
/// Rows keep the order they were written in; nothing is sorted or resampled.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    headers: Vec<String>,
    columns: Vec<Vec<f64>>,
}

impl Table {
    /// Parse comma-separated text, or whitespace-separated columns when a
    /// line has no comma. The first non-blank line is the header.
    pub fn parse(text: &str) -> ResultsResult<Self> {
        let mut lines = text
            .lines()
            .enumerate()
            .filter(|(_, l)| !l.trim().is_empty());

        let Some((_, header)) = lines.next() else {
            return Err(ResultsError::Table {
                line: 1,
                message: "empty table".into(),
            });
        };
        let headers: Vec<String> = split(header)
            .map(|h| h.trim_matches('"').trim().to_string())
            .collect();
        let mut columns = vec![Vec::new(); headers.len()];

        for (idx, line) in lines {
            let fields: Vec<&str> = split(line).collect();
            if fields.len() != headers.len() {
                return Err(ResultsError::Table {
                    line: idx + 1,
                    message: format!("expected {} fields, found {}", headers.len(), fields.len()),
                });
            }
            for (col, field) in columns.iter_mut().zip(fields) {
                col.push(parse_number(field).ok_or_else(|| ResultsError::Table {
                    line: idx + 1,
                    message: format!("not a number: '{field}'"),
                })?);
            }
        }
        Ok(Self { headers, columns })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    /// First column.
    pub fn time(&self) -> &[f64] {
        self.columns.first().map_or(&[], Vec::as_slice)
    }

    /// The `occurrence`-th (1-based) column whose space-free header contains `key`.
    pub fn column_matching(&self, key: &str, occurrence: usize) -> Option<&[f64]> {
        let key: String = key.chars().filter(|c| !c.is_whitespace()).collect();
        self.headers
            .iter()
            .zip(&self.columns)
            .filter(|(h, _)| {
                let h: String = h.chars().filter(|c| !c.is_whitespace()).collect();
                h.contains(&key)
            })
            .nth(occurrence.checked_sub(1)?)
            .map(|(_, c)| c.as_slice())
    }
}

fn split(line: &str) -> Box<dyn Iterator<Item = &str> + '_> {
    if line.contains(',') {
        let line = line.trim().trim_end_matches(',');
        Box::new(line.split(',').map(str::trim))
    } else {
        Box::new(line.split_whitespace())
    }
}

/// Accepts Fortran `D` exponents.
pub(crate) fn parse_number(field: &str) -> Option<f64> {
    let field = field.trim().trim_matches('"');
    field
        .parse::<f64>()
        .ok()
        .or_else(|| field.replace(['D', 'd'], "E").parse().ok())
}
