//! Conversion between host values and solver-side types.
//!
//! Problem buffers are never copied here: [`ProblemArgs`] borrows the host
//! matrices and [`ProblemArgs::view`] turns them into a [`ProblemView`] for
//! one call. Settings go through the shared field table in both directions.

use qpsess_common::{
    HostValue, IntMatrix, Matrix, ProblemDims, ProblemView, Record, Settings, SolveInfo,
    SETTING_FIELDS,
};

use crate::error::{BridgeError, BridgeResult};
use crate::registry::SessionHandle;

/// Largest variable count a host can declare; indices travel as int32.
pub const MAX_VARIABLES: usize = i32::MAX as usize;

/// Positional arguments of one command, not counting the command name.
#[derive(Debug, Clone, Copy)]
pub struct Args<'a> {
    command: &'static str,
    values: &'a [HostValue],
}

impl<'a> Args<'a> {
    pub fn new(command: &'static str, values: &'a [HostValue]) -> Self {
        Self { command, values }
    }

    fn value(&self, position: usize, name: &'static str) -> BridgeResult<&'a HostValue> {
        self.values
            .get(position)
            .ok_or(BridgeError::MissingArgument {
                command: self.command,
                position,
                name,
            })
    }

    fn mismatch(&self, name: &'static str, expected: &'static str, found: &HostValue) -> BridgeError {
        BridgeError::TypeMismatch {
            command: self.command,
            name,
            expected,
            found: found.kind_name(),
        }
    }

    /// The session handle, always argument 0.
    pub fn handle(&self) -> BridgeResult<SessionHandle> {
        match self.value(0, "handle")? {
            HostValue::Int64(raw) => Ok(SessionHandle::from_raw(*raw)),
            other => Err(self.mismatch("handle", "an int64 scalar", other)),
        }
    }

    /// A double matrix that must be present (it may still have zero entries).
    pub fn matrix(&self, position: usize, name: &'static str) -> BridgeResult<&'a Matrix> {
        match self.value(position, name)? {
            HostValue::Matrix(m) => consistent(name, m),
            other => Err(self.mismatch(name, "a double matrix", other)),
        }
    }

    /// A double matrix where empty means absent.
    pub fn optional_matrix(
        &self,
        position: usize,
        name: &'static str,
    ) -> BridgeResult<Option<&'a Matrix>> {
        match self.value(position, name)? {
            HostValue::Empty => Ok(None),
            HostValue::Matrix(m) if m.is_empty() => Ok(None),
            HostValue::Matrix(m) => consistent(name, m).map(Some),
            other => Err(self.mismatch(name, "a double matrix or empty", other)),
        }
    }

    /// An int32 array; empty yields an empty slice.
    pub fn int_array(&self, position: usize, name: &'static str) -> BridgeResult<&'a [i32]> {
        match self.value(position, name)? {
            HostValue::Empty => Ok(&[]),
            HostValue::IntMatrix(m) if m.is_consistent() => Ok(&m.data),
            HostValue::IntMatrix(m) => Err(BridgeError::DimensionMismatch {
                argument: name,
                expected: format!("{} entries", m.numel()),
                found: format!("{} entries", m.data.len()),
            }),
            other => Err(self.mismatch(name, "an int32 array", other)),
        }
    }

    /// A numeric scalar of any kind.
    pub fn scalar(&self, position: usize, name: &'static str) -> BridgeResult<f64> {
        let value = self.value(position, name)?;
        value
            .as_scalar()
            .ok_or_else(|| self.mismatch(name, "a numeric scalar", value))
    }

    pub fn record(&self, position: usize, name: &'static str) -> BridgeResult<&'a Record> {
        match self.value(position, name)? {
            HostValue::Record(r) => Ok(r),
            other => Err(self.mismatch(name, "a record", other)),
        }
    }
}

fn consistent<'a>(name: &'static str, m: &'a Matrix) -> BridgeResult<&'a Matrix> {
    if m.is_consistent() {
        Ok(m)
    } else {
        Err(BridgeError::DimensionMismatch {
            argument: name,
            expected: format!("{} entries for {}", m.numel(), shape(m)),
            found: format!("{} entries", m.data.len()),
        })
    }
}

fn shape(m: &Matrix) -> String {
    format!("{}x{}", m.rows, m.cols)
}

/// The problem buffers of `setup`, `solve` and `update` (arguments 1 to 6).
#[derive(Debug, Clone, Copy)]
pub struct ProblemArgs<'a> {
    pub h: Option<&'a Matrix>,
    pub f: Option<&'a Matrix>,
    /// Constraint block, transposed: `n x (m - ms)`.
    pub a: &'a Matrix,
    pub bupper: &'a Matrix,
    pub blower: &'a Matrix,
    pub sense: &'a [i32],
}

impl<'a> ProblemArgs<'a> {
    pub fn read(args: &Args<'a>) -> BridgeResult<Self> {
        Ok(Self {
            h: args.optional_matrix(1, "H")?,
            f: args.optional_matrix(2, "f")?,
            a: args.matrix(3, "A")?,
            bupper: args.matrix(4, "bupper")?,
            blower: args.matrix(5, "blower")?,
            sense: args.int_array(6, "sense")?,
        })
    }

    /// Derives dimensions from the buffer shapes and validates everything.
    ///
    /// `n` is the row count of `A`, `m` the length of `bupper`, and the
    /// leading `m - cols(A)` constraints are simple bounds.
    pub fn infer_dims(&self, bin_ids: &[i32]) -> BridgeResult<(ProblemDims, Vec<usize>)> {
        let n = self.a.rows;
        let m = self.bupper.numel();
        let general = self.a.cols;
        if n > MAX_VARIABLES {
            return Err(BridgeError::DimensionMismatch {
                argument: "A",
                expected: format!("at most {MAX_VARIABLES} rows (one per variable)"),
                found: shape(self.a),
            });
        }
        if general > m {
            return Err(BridgeError::DimensionMismatch {
                argument: "A",
                expected: format!("at most {m} columns (one per constraint)"),
                found: shape(self.a),
            });
        }
        let ms = m - general;
        if ms > n {
            return Err(BridgeError::DimensionMismatch {
                argument: "A",
                expected: format!("at least {} columns (simple bounds cannot exceed n={n})", m - n),
                found: shape(self.a),
            });
        }

        let bin_ids = bin_ids
            .iter()
            .map(|&id| match usize::try_from(id) {
                Ok(i) if i < m => Ok(i),
                _ => Err(BridgeError::DimensionMismatch {
                    argument: "bin_ids",
                    expected: format!("indices in 0..{m}"),
                    found: id.to_string(),
                }),
            })
            .collect::<BridgeResult<Vec<usize>>>()?;

        let dims = ProblemDims {
            n,
            m,
            ms,
            nb: bin_ids.len(),
        };
        self.check_shapes(dims)?;
        Ok((dims, bin_ids))
    }

    /// Checks every buffer against dimensions fixed earlier.
    pub fn check_shapes(&self, dims: ProblemDims) -> BridgeResult<()> {
        let ProblemDims { n, m, .. } = dims;
        let general = dims.general();

        if let Some(h) = self.h {
            if h.rows != n || h.cols != n {
                return Err(mismatch("H", format!("empty or {n}x{n}"), shape(h)));
            }
        }
        if let Some(f) = self.f {
            if f.numel() != n {
                return Err(mismatch("f", format!("empty or {n} entries"), shape(f)));
            }
        }
        if self.a.rows != n || self.a.cols != general {
            return Err(mismatch("A", format!("{n}x{general}"), shape(self.a)));
        }
        if self.bupper.numel() != m {
            return Err(mismatch("bupper", format!("{m} entries"), shape(self.bupper)));
        }
        if self.blower.numel() != m {
            return Err(mismatch("blower", format!("{m} entries"), shape(self.blower)));
        }
        if self.sense.len() != m {
            return Err(mismatch(
                "sense",
                format!("{m} entries"),
                format!("{} entries", self.sense.len()),
            ));
        }
        Ok(())
    }

    /// Borrows the buffers as a solver view.
    pub fn view(&self, dims: ProblemDims) -> ProblemView<'a> {
        ProblemView {
            dims,
            h: self.h.map(|m| m.data.as_slice()),
            f: self.f.map(|m| m.data.as_slice()),
            a: &self.a.data,
            bupper: &self.bupper.data,
            blower: &self.blower.data,
            sense: self.sense,
        }
    }
}

fn mismatch(argument: &'static str, expected: String, found: String) -> BridgeError {
    BridgeError::DimensionMismatch {
        argument,
        expected,
        found,
    }
}

/// Snapshot of `settings` as a host record.
pub fn settings_to_record(settings: &Settings) -> Record {
    SETTING_FIELDS
        .iter()
        .map(|field| (field.name.to_string(), HostValue::scalar(field.get(settings))))
        .collect()
}

/// Settings read from a host record.
///
/// Every field must be present and scalar; nothing is written otherwise.
/// Integer fields are truncated toward zero.
pub fn settings_from_record(record: &Record, current: &Settings) -> BridgeResult<Settings> {
    let mut values = [0.0; SETTING_FIELDS.len()];
    for (slot, field) in values.iter_mut().zip(SETTING_FIELDS.iter()) {
        let value = record
            .get(field.name)
            .ok_or(BridgeError::MissingSettingsField(field.name))?;
        *slot = value
            .as_scalar()
            .ok_or(BridgeError::InvalidSettingsField {
                field: field.name,
                found: value.kind_name(),
            })?;
    }

    let mut settings = *current;
    for (value, field) in values.into_iter().zip(SETTING_FIELDS.iter()) {
        field.set(&mut settings, value);
    }
    Ok(settings)
}

/// Names of record fields that no setting reads.
pub fn unknown_settings_fields(record: &Record) -> Vec<&str> {
    record
        .keys()
        .map(String::as_str)
        .filter(|key| SETTING_FIELDS.iter().all(|f| f.name != *key))
        .collect()
}

/// Outputs of `setup`: the code and the elapsed time, both as doubles.
pub fn setup_outputs(code: i32, setup_time: f64) -> Vec<HostValue> {
    vec![
        HostValue::scalar(f64::from(code)),
        HostValue::scalar(setup_time),
    ]
}

/// Outputs of `solve`: `x`, `fval`, `exitflag` and the info record.
pub fn solve_outputs(x: Vec<f64>, lambda: Vec<f64>, info: &SolveInfo) -> Vec<HostValue> {
    let mut record = Record::new();
    record.insert("lambda".into(), HostValue::column(lambda));
    record.insert("solve_time".into(), HostValue::scalar(info.solve_time));
    record.insert("setup_time".into(), HostValue::scalar(info.setup_time));
    record.insert("iter".into(), HostValue::scalar(info.iterations as f64));
    record.insert(
        "nodes".into(),
        HostValue::scalar(info.nodes.unwrap_or(1) as f64),
    );
    record.insert("soft_slack".into(), HostValue::scalar(info.soft_slack));

    vec![
        HostValue::column(x),
        HostValue::scalar(info.fval),
        HostValue::IntMatrix(IntMatrix::scalar(info.exitflag.code())),
        HostValue::Record(record),
    ]
}
