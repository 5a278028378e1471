use std::io::Write;

use anyhow::Result;
use serde::Serialize;

/// A dense, row-major matrix of `f64`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Matrix {
    pub num_rows: usize,
    pub num_cols: usize,
    /// The cells as a flat vector.
    //
    // the data is stored in the following pattern:
    //     [
    //
    //         w_(0, 0), w_(0, 1), ..., w_(0, C-1),
    //         w_(1, 0), w_(1, 1), ..., w_(1, C-1),
    //         ...
    //         w_(R-1, 0), ...,       w_(R-1, C-1)
    //
    //     ]
    //
    // where:
    //
    //     R:        <num_rows>
    //     C:        <num_cols>
    //     w_(i, j): the value at cell (i, j)
    //
    data: Vec<f64>,
}

impl Matrix {
    pub fn new(num_rows: usize, num_cols: usize) -> Self {
        Matrix {
            num_rows,
            num_cols,
            data: vec![0.0; num_rows * num_cols],
        }
    }

    /// Build a matrix by calling `f(row_idx, col_idx)` once per cell, in row-major order.
    pub fn from_fn(num_rows: usize, num_cols: usize, mut f: impl FnMut(usize, usize) -> f64) -> Self {
        let mut data = Vec::with_capacity(num_rows * num_cols);
        for row_idx in 0..num_rows {
            for col_idx in 0..num_cols {
                data.push(f(row_idx, col_idx));
            }
        }

        Matrix {
            num_rows,
            num_cols,
            data,
        }
    }

    /// # Panics
    ///
    /// If either index is out of range. A column past the end of a row would
    /// otherwise land in the next row of the flat storage.
    #[inline(always)]
    fn cell_idx(&self, row_idx: usize, col_idx: usize) -> usize {
        assert!(
            row_idx < self.num_rows && col_idx < self.num_cols,
            "cell ({row_idx}, {col_idx}) is outside a {}x{} matrix",
            self.num_rows,
            self.num_cols
        );
        row_idx * self.num_cols + col_idx
    }

    #[inline(always)]
    pub fn get(&self, row_idx: usize, col_idx: usize) -> f64 {
        self.data[self.cell_idx(row_idx, col_idx)]
    }

    #[inline(always)]
    pub fn set(&mut self, row_idx: usize, col_idx: usize, value: f64) {
        let idx = self.cell_idx(row_idx, col_idx);
        self.data[idx] = value;
    }

    #[inline(always)]
    pub fn add(&mut self, row_idx: usize, col_idx: usize, value: f64) {
        let idx = self.cell_idx(row_idx, col_idx);
        self.data[idx] += value;
    }

    /// # Panics
    ///
    /// If `row_idx` is out of range.
    pub fn row(&self, row_idx: usize) -> &[f64] {
        assert!(
            row_idx < self.num_rows,
            "row {row_idx} is outside a matrix with {} rows",
            self.num_rows
        );
        let start = row_idx * self.num_cols;
        &self.data[start..start + self.num_cols]
    }

    /// Returns self * `vector`, where `vector` has one entry per column.
    pub fn mul_vec(&self, vector: &[f64]) -> Vec<f64> {
        (0..self.num_rows)
            .map(|row_idx| {
                self.row(row_idx)
                    .iter()
                    .zip(vector)
                    .map(|(w, v)| w * v)
                    .sum()
            })
            .collect()
    }

    /// Returns `vector`ᵗ * self, where `vector` has one entry per row.
    pub fn vec_mul(&self, vector: &[f64]) -> Vec<f64> {
        let mut product = vec![0.0; self.num_cols];
        for (row_idx, &v) in vector.iter().enumerate().take(self.num_rows) {
            for (cell, w) in product.iter_mut().zip(self.row(row_idx)) {
                *cell += v * w;
            }
        }
        product
    }

    pub fn dump(&self, out: &mut impl Write) -> Result<()> {
        let row_idx_width = self.num_rows.to_string().len();
        let column_width = 13;
        let precision = 6;

        write!(out, "{}", " ".repeat(row_idx_width + 1))?;
        for col_idx in 0..self.num_cols {
            write!(out, "{:w$} ", col_idx, w = column_width)?;
        }
        writeln!(out)?;

        for row_idx in 0..self.num_rows {
            write!(out, "{:w$} ", row_idx, w = row_idx_width)?;
            for value in self.row(row_idx) {
                write!(out, "{:w$.p$} ", value, w = column_width, p = precision)?;
            }
            writeln!(out)?;
        }

        Ok(())
    }
}
