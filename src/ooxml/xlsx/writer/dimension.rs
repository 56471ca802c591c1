//! Run-length compaction of row and column dimensions.
//!
//! Indices arrive in strictly increasing order. An index that directly
//! follows the last run and carries an equal dimension extends that run;
//! anything else opens a new one. The output therefore has one declaration
//! per contiguous group instead of one per index.

use crate::common::error::{Error, Result};

/// Two widths or heights closer than this are equal.
pub const DIMENSION_TOLERANCE: f64 = 0.0001;

/// A dimension value that can be compared within [`DIMENSION_TOLERANCE`].
pub trait Dimension: Copy {
    fn approx_eq(&self, other: &Self) -> bool;
}

impl Dimension for f64 {
    #[inline]
    fn approx_eq(&self, other: &Self) -> bool {
        (self - other).abs() < DIMENSION_TOLERANCE
    }
}

impl<T: Dimension> Dimension for Option<T> {
    #[inline]
    fn approx_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Some(a), Some(b)) => a.approx_eq(b),
            (None, None) => true,
            _ => false,
        }
    }
}

/// `count` consecutive indices starting at `start`, all equal to `value`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DimensionRun<T> {
    pub start: u32,
    pub value: T,
    pub count: u32,
}

impl<T> DimensionRun<T> {
    /// Last index covered by the run.
    #[inline]
    pub fn end(&self) -> u32 {
        self.start + self.count - 1
    }
}

/// Accumulates [`DimensionRun`]s from an increasing index sequence.
#[derive(Debug, Clone)]
pub struct DimensionRunCompactor<T> {
    runs: Vec<DimensionRun<T>>,
}

impl<T: Dimension> DimensionRunCompactor<T> {
    pub fn new() -> Self {
        Self { runs: Vec::new() }
    }

    /// Record the dimension of `index`.
    ///
    /// An index not greater than the previous one is a caller bug and fails
    /// with [`Error::InvalidOperation`].
    pub fn record(&mut self, index: u32, value: T) -> Result<()> {
        let Some(last) = self.runs.last_mut() else {
            self.runs.push(DimensionRun {
                start: index,
                value,
                count: 1,
            });
            return Ok(());
        };

        let end = last.end();
        if index <= end {
            return Err(Error::invalid_operation(format!(
                "Dimension index {} recorded after index {}",
                index, end
            )));
        }

        if index == end + 1 && last.value.approx_eq(&value) {
            last.count += 1;
        } else {
            self.runs.push(DimensionRun {
                start: index,
                value,
                count: 1,
            });
        }
        Ok(())
    }

    #[inline]
    pub fn runs(&self) -> &[DimensionRun<T>] {
        &self.runs
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    pub fn into_runs(self) -> Vec<DimensionRun<T>> {
        self.runs
    }
}

impl<T: Dimension> Default for DimensionRunCompactor<T> {
    fn default() -> Self {
        Self::new()
    }
}
