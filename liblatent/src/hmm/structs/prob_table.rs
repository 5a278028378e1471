use std::io::Write;
use std::ops::Index;

use anyhow::Result;
use serde::Serialize;

use super::model::{Label, ProbMap};
use crate::error::InvalidInputError;

/// A sequence of per-time-step state probabilities.
///
/// Forward, backward and posterior tables for an observation sequence
/// of length T all have T + 1 rows; row 0 is the boundary before the
/// first observation is consumed.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct ProbTable<S> {
    pub rows: Vec<ProbMap<S>>,
}

impl<S: Label> ProbTable<S> {
    pub fn new() -> Self {
        Self { rows: vec![] }
    }

    /// Drop all rows, keeping the allocation for `num_rows` rows.
    pub fn reuse(&mut self, num_rows: usize) {
        self.rows.clear();
        self.rows.reserve(num_rows);
    }

    pub fn push(&mut self, row: ProbMap<S>) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, time: usize) -> Option<&ProbMap<S>> {
        self.rows.get(time)
    }

    pub fn get(&self, time: usize, state: &S) -> Option<f64> {
        self.rows.get(time)?.get(state).copied()
    }

    /// Like [`ProbTable::get`], but a missing cell is an error.
    pub fn prob(&self, time: usize, state: &S) -> Result<f64, InvalidInputError> {
        self.get(time, state)
            .ok_or_else(|| InvalidInputError::MissingEntry {
                table: "probability table",
                key: format!("({time}, {state:?})"),
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProbMap<S>> {
        self.rows.iter()
    }

    pub fn dump(&self, out: &mut impl Write) -> Result<()> {
        let time_width = self.rows.len().to_string().len();
        let column_width = 13;
        let precision = 6;

        let labels: Vec<String> = match self.rows.first() {
            Some(row) => row.keys().map(|state| format!("{state:?}")).collect(),
            None => return Ok(()),
        };

        // write the state labels
        write!(out, "{}", " ".repeat(time_width + 1))?;
        for label in &labels {
            write!(out, "{:>w$.w$} ", label, w = column_width)?;
        }
        writeln!(out)?;

        write!(out, "{}", " ".repeat(time_width + 1))?;
        for _ in &labels {
            write!(out, "   {} ", "-".repeat(column_width - 3))?;
        }
        writeln!(out)?;

        for (time, row) in self.rows.iter().enumerate() {
            write!(out, "{:w$} ", time, w = time_width)?;
            for value in row.values() {
                write!(out, "{:w$.p$} ", value, w = column_width, p = precision)?;
            }
            writeln!(out)?;
        }

        Ok(())
    }
}

impl<S: Label> PartialEq for ProbTable<S> {
    fn eq(&self, other: &Self) -> bool {
        self.rows == other.rows
    }
}

impl<S> Index<usize> for ProbTable<S> {
    type Output = ProbMap<S>;

    fn index(&self, time: usize) -> &Self::Output {
        &self.rows[time]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::{assert, let_assert};
    use indexmap::IndexMap;

    fn table() -> ProbTable<&'static str> {
        let mut table = ProbTable::new();
        table.push(IndexMap::from([("a", 0.25), ("b", 0.75)]));
        table.push(IndexMap::from([("a", 1.0), ("b", 0.0)]));
        table
    }

    #[test]
    fn test_access() {
        let table = table();
        assert!(table.len() == 2);
        assert!(table.get(1, &"a") == Some(1.0));
        assert!(table.get(2, &"a") == None);
        assert!(table[0]["b"] == 0.75);
        let_assert!(Err(InvalidInputError::MissingEntry { .. }) = table.prob(0, &"c"));
    }

    #[test]
    fn test_equality() {
        let mut other = table();
        assert!(other == table());

        other.rows[1]["b"] = 0.5;
        assert!(other != table());

        other.rows.pop();
        assert!(other != table());
    }

    #[test]
    fn test_reuse() {
        let mut table = table();
        table.reuse(10);
        assert!(table.is_empty());
        assert!(table.rows.capacity() >= 10);
    }

    #[test]
    fn test_dump() -> anyhow::Result<()> {
        let mut out: Vec<u8> = vec![];
        table().dump(&mut out)?;
        let text = String::from_utf8(out)?;
        let lines: Vec<&str> = text.lines().collect();

        assert!(lines.len() == 4);
        assert!(lines[0].contains("\"a\""));
        assert!(lines[2].contains("0.250000"));
        assert!(lines[3].contains("1.000000"));
        Ok(())
    }
}
