//! Shared scalar cell
//!
//! A single tagged value readable and writable from any worker. Cloning a
//! [`SharedCell`] yields another handle to the *same* cell, so a value set
//! through one handle is observed through every other.

use parking_lot::RwLock;
use std::sync::Arc;

/// Value held by a [`SharedCell`]
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    /// Never set
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    BigInt(i64),
    Str(String),
}

impl From<bool> for CellValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<f64> for CellValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<i64> for CellValue {
    fn from(v: i64) -> Self {
        Self::BigInt(v)
    }
}

impl From<&str> for CellValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for CellValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Handle to a shared scalar cell
#[derive(Debug, Clone, Default)]
pub struct SharedCell {
    value: Arc<RwLock<CellValue>>,
}

impl SharedCell {
    pub fn new(initial: impl Into<CellValue>) -> Self {
        Self {
            value: Arc::new(RwLock::new(initial.into())),
        }
    }

    pub fn set(&self, value: impl Into<CellValue>) {
        *self.value.write() = value.into();
    }

    pub fn get(&self) -> CellValue {
        self.value.read().clone()
    }

    /// `false` unless the cell holds `Bool(true)`
    pub fn get_bool(&self) -> bool {
        matches!(*self.value.read(), CellValue::Bool(true))
    }

    /// Integer view: `BigInt` as is, `Number` truncated, anything else 0
    pub fn get_i64(&self) -> i64 {
        match *self.value.read() {
            CellValue::BigInt(v) => v,
            CellValue::Number(v) => v as i64,
            _ => 0,
        }
    }

    /// String view: `Str` as is, anything else empty
    pub fn get_string(&self) -> String {
        match &*self.value.read() {
            CellValue::Str(s) => s.clone(),
            _ => String::new(),
        }
    }

    /// Add `delta` to an integer cell and return the new value
    pub fn add_i64(&self, delta: i64) -> i64 {
        let mut guard = self.value.write();
        let next = match *guard {
            CellValue::BigInt(v) => v + delta,
            CellValue::Number(v) => v as i64 + delta,
            _ => delta,
        };
        *guard = CellValue::BigInt(next);
        next
    }

    /// Whether two handles point at the same cell
    pub fn same_cell(&self, other: &SharedCell) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}
