//! Host value domain.
//!
//! A host that drives the bridge cannot carry pointers or rich objects. It can
//! carry numeric arrays, fixed-width integers, short strings for command names,
//! and string-keyed records of those. [`HostValue`] is exactly that domain.
//!
//! Matrices are stored column-major, the way numeric-array hosts lay them out,
//! so a host buffer can be borrowed as a solver slice without reordering.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// String-keyed record of host values (a host "struct").
pub type Record = BTreeMap<String, HostValue>;

/// Column-major matrix of doubles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    /// Number of rows.
    pub rows: usize,
    /// Number of columns.
    pub cols: usize,
    /// Entries in column-major order (`rows * cols` of them).
    pub data: Vec<f64>,
}

impl Matrix {
    /// Creates a matrix from column-major data.
    ///
    /// Panics if `data.len() != rows * cols`.
    pub fn new(rows: usize, cols: usize, data: Vec<f64>) -> Self {
        assert_eq!(
            data.len(),
            rows * cols,
            "called `Matrix::new` with {} entries for a {}x{} matrix",
            data.len(),
            rows,
            cols
        );
        Self { rows, cols, data }
    }

    /// Creates a column vector.
    pub fn column(data: Vec<f64>) -> Self {
        Self {
            rows: data.len(),
            cols: 1,
            data,
        }
    }

    /// Creates a 1x1 matrix.
    pub fn scalar(value: f64) -> Self {
        Self::column(vec![value])
    }

    /// Creates a `rows x cols` matrix of zeros.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self::new(rows, cols, vec![0.0; rows * cols])
    }

    /// Creates the `n x n` identity matrix.
    pub fn identity(n: usize) -> Self {
        let mut data = vec![0.0; n * n];
        for i in 0..n {
            data[i * n + i] = 1.0;
        }
        Self::new(n, n, data)
    }

    /// Number of entries the shape declares, saturating at `usize::MAX`.
    pub fn numel(&self) -> usize {
        self.rows.saturating_mul(self.cols)
    }

    /// True when the matrix has no entries.
    pub fn is_empty(&self) -> bool {
        self.numel() == 0
    }

    /// True when the declared shape matches the stored data.
    pub fn is_consistent(&self) -> bool {
        self.rows.checked_mul(self.cols) == Some(self.data.len())
    }

    /// Entry at (`row`, `col`).
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[col * self.rows + row]
    }
}

/// Column-major matrix of 32-bit integers (sense codes, index arrays).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntMatrix {
    /// Number of rows.
    pub rows: usize,
    /// Number of columns.
    pub cols: usize,
    /// Entries in column-major order.
    pub data: Vec<i32>,
}

impl IntMatrix {
    /// Creates an integer column vector.
    pub fn column(data: Vec<i32>) -> Self {
        Self {
            rows: data.len(),
            cols: 1,
            data,
        }
    }

    /// Creates a 1x1 integer matrix.
    pub fn scalar(value: i32) -> Self {
        Self::column(vec![value])
    }

    /// Number of entries the shape declares, saturating at `usize::MAX`.
    pub fn numel(&self) -> usize {
        self.rows.saturating_mul(self.cols)
    }

    /// True when the declared shape matches the stored data.
    pub fn is_consistent(&self) -> bool {
        self.rows.checked_mul(self.cols) == Some(self.data.len())
    }
}

/// A value the host can pass to or receive from the bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostValue {
    /// The explicit "nothing here" marker (an empty host array).
    Empty,
    /// Double-precision matrix.
    Matrix(Matrix),
    /// Int32 matrix.
    IntMatrix(IntMatrix),
    /// Int64 scalar. Session handles travel as this.
    Int64(i64),
    /// Character data. Only command names travel as this.
    Text(String),
    /// Record of named fields.
    Record(Record),
}

impl HostValue {
    /// A 1x1 double matrix.
    pub fn scalar(value: f64) -> Self {
        HostValue::Matrix(Matrix::scalar(value))
    }

    /// A double column vector.
    pub fn column(data: Vec<f64>) -> Self {
        HostValue::Matrix(Matrix::column(data))
    }

    /// An int32 column vector.
    pub fn int_column(data: Vec<i32>) -> Self {
        HostValue::IntMatrix(IntMatrix::column(data))
    }

    /// Short name of the value's kind, for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            HostValue::Empty => "empty",
            HostValue::Matrix(_) => "double matrix",
            HostValue::IntMatrix(_) => "int32 matrix",
            HostValue::Int64(_) => "int64 scalar",
            HostValue::Text(_) => "text",
            HostValue::Record(_) => "record",
        }
    }

    /// True for [`HostValue::Empty`] and zero-element matrices.
    pub fn is_empty(&self) -> bool {
        match self {
            HostValue::Empty => true,
            HostValue::Matrix(m) => m.is_empty(),
            HostValue::IntMatrix(m) => m.numel() == 0,
            _ => false,
        }
    }

    /// Reads a numeric scalar, converting integers to double.
    ///
    /// Returns `None` for non-numeric values and for arrays with more or fewer
    /// than one entry.
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            HostValue::Matrix(m) if m.numel() == 1 && m.is_consistent() => Some(m.data[0]),
            HostValue::IntMatrix(m) if m.numel() == 1 && m.is_consistent() => {
                Some(f64::from(m.data[0]))
            }
            HostValue::Int64(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Borrows the record, if this is one.
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            HostValue::Record(r) => Some(r),
            _ => None,
        }
    }

    /// Borrows the double matrix, if this is one.
    pub fn as_matrix(&self) -> Option<&Matrix> {
        match self {
            HostValue::Matrix(m) => Some(m),
            _ => None,
        }
    }
}

impl From<Matrix> for HostValue {
    fn from(m: Matrix) -> Self {
        HostValue::Matrix(m)
    }
}

impl From<IntMatrix> for HostValue {
    fn from(m: IntMatrix) -> Self {
        HostValue::IntMatrix(m)
    }
}

impl From<Record> for HostValue {
    fn from(r: Record) -> Self {
        HostValue::Record(r)
    }
}
