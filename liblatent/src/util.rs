use std::fmt::{Debug, Display, Formatter};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::NumericDegeneracyError;

#[cfg(test)]
#[ctor::ctor]
fn init_backtrace() {
    color_backtrace::install();
}

/// A natural-log quantity, e.g. the log-likelihood of an observation sequence.
#[derive(Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Nats(pub f64);

impl Nats {
    pub fn value(&self) -> f64 {
        self.0
    }

    pub fn to_bits(self) -> f64 {
        self.0 / std::f64::consts::LN_2
    }
}

impl Debug for Nats {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Nats({})", self.0)
    }
}

impl Display for Nats {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.6}", self.0)
    }
}

impl std::ops::Add for Nats {
    type Output = Nats;

    fn add(self, rhs: Self) -> Self::Output {
        Nats(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Nats {
    type Output = Nats;

    fn sub(self, rhs: Self) -> Self::Output {
        Nats(self.0 - rhs.0)
    }
}

pub trait VecMath {
    fn avg(&self) -> Option<f64>;
    fn argmax(&self) -> Option<usize>;
    fn dot(&self, other: &[f64]) -> f64;
    fn add(&mut self, other: &[f64]);
    fn sub(&mut self, other: &[f64]);
    fn scale(&mut self, factor: f64);
}

impl VecMath for [f64] {
    fn avg(&self) -> Option<f64> {
        if self.is_empty() {
            return None;
        }
        Some(self.iter().sum::<f64>() / self.len() as f64)
    }

    fn argmax(&self) -> Option<usize> {
        let mut max = *self.first()?;
        let mut argmax: usize = 0;

        for (idx, &item) in self.iter().enumerate().skip(1) {
            if item > max {
                max = item;
                argmax = idx;
            }
        }

        Some(argmax)
    }

    fn dot(&self, other: &[f64]) -> f64 {
        self.iter().zip(other).map(|(a, b)| a * b).sum()
    }

    fn add(&mut self, other: &[f64]) {
        self.iter_mut().zip(other).for_each(|(a, &b)| *a += b);
    }

    fn sub(&mut self, other: &[f64]) {
        self.iter_mut().zip(other).for_each(|(a, &b)| *a -= b);
    }

    fn scale(&mut self, factor: f64) {
        self.iter_mut().for_each(|item| *item *= factor);
    }
}

/// Rescale a collection of probabilities so that it sums to one.
///
/// On success, the denominator that was divided out is returned.
/// A zero or non-finite denominator is reported as a
/// [`NumericDegeneracyError`] tagged with `table` and `index`.
pub trait Normalize {
    fn normalize(
        &mut self,
        table: &'static str,
        index: usize,
    ) -> Result<f64, NumericDegeneracyError>;
}

fn checked_denominator(
    sum: f64,
    table: &'static str,
    index: usize,
) -> Result<f64, NumericDegeneracyError> {
    if sum > 0.0 && sum.is_finite() {
        Ok(sum)
    } else {
        Err(NumericDegeneracyError { table, index })
    }
}

impl Normalize for [f64] {
    fn normalize(
        &mut self,
        table: &'static str,
        index: usize,
    ) -> Result<f64, NumericDegeneracyError> {
        let sum = checked_denominator(self.iter().sum(), table, index)?;
        self.iter_mut().for_each(|item| *item /= sum);
        Ok(sum)
    }
}

impl<K> Normalize for IndexMap<K, f64> {
    fn normalize(
        &mut self,
        table: &'static str,
        index: usize,
    ) -> Result<f64, NumericDegeneracyError> {
        let sum = checked_denominator(self.values().sum(), table, index)?;
        self.values_mut().for_each(|item| *item /= sum);
        Ok(sum)
    }
}

/// The relative entropy D(a || b) in bits.
pub fn relative_entropy(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .filter(|(p_a, _)| **p_a > 0.0)
        .map(|(p_a, p_b)| p_a * (p_a / p_b).log2())
        .sum()
}

pub fn mean_relative_entropy(a: &[Vec<f64>], b: &[Vec<f64>]) -> Option<f64> {
    a.iter()
        .zip(b)
        .map(|(p, q)| relative_entropy(p, q))
        .collect::<Vec<f64>>()
        .avg()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::{assert, let_assert};

    #[test]
    fn test_nats_ops() {
        let a = Nats(10.0);
        let b = Nats(4.0);
        assert!((a + b).value() == 14.0);
        assert!((a - b).value() == 6.0);
        assert!((Nats(2.0f64.ln()).to_bits() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_normalize_map() {
        let mut row: IndexMap<&str, f64> = IndexMap::from([("a", 1.0), ("b", 3.0)]);
        let_assert!(Ok(sum) = row.normalize("row", 0));
        assert!(sum == 4.0);
        assert!((row["a"] - 0.25).abs() < 1e-12);
        assert!((row["b"] - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_normalize_zero_row() {
        let mut row = vec![0.0, 0.0, 0.0];
        let_assert!(Err(err) = row.normalize("emission", 3));
        assert!(err == NumericDegeneracyError { table: "emission", index: 3 });
    }

    #[test]
    fn test_vec_math() {
        let v = vec![0.1, 0.7, 0.7, 0.2];
        assert!(v.argmax() == Some(1));
        assert!(v.dot(&[1.0, 1.0, 0.0, 0.0]) == 0.1 + 0.7);
        assert!(Vec::<f64>::new().argmax() == None);
        assert!(Vec::<f64>::new().avg() == None);

        let mut w = vec![1.0, 2.0];
        w.add(&[1.0, 1.0]);
        w.scale(2.0);
        w.sub(&[1.0, 1.0]);
        assert!(w == vec![3.0, 5.0]);
    }

    #[test]
    fn test_relative_entropy() {
        let p = [0.5, 0.5];
        assert!(relative_entropy(&p, &p) == 0.0);
        assert!(relative_entropy(&[1.0, 0.0], &[0.5, 0.5]) == 1.0);
        assert!(relative_entropy(&[0.9, 0.1], &[0.5, 0.5]) > 0.0);
    }
}
