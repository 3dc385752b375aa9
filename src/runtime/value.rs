use std::fmt;

use crate::token::{VARIABLE_COUNT, Variable};

use super::RuntimeError;

/// A runtime value: either a number or a string.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    String(String),
}

impl Value {
    pub const ZERO: Value = Value::Number(0.0);

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::String(_) => "string",
        }
    }

    /// Only the number zero counts as zero; every string is non-zero.
    pub fn is_zero(&self) -> bool {
        matches!(self, Value::Number(value) if *value == 0.0)
    }

    /// Text form used by concatenation.
    pub fn to_text(&self) -> String {
        match self {
            Value::Number(value) => format_number(*value),
            Value::String(text) => text.clone(),
        }
    }

    pub fn add(&self, other: &Value) -> Result<Value, RuntimeError> {
        let (left, right) = self.numbers(other, "+")?;
        Ok(Value::Number(left + right))
    }

    pub fn sub(&self, other: &Value) -> Result<Value, RuntimeError> {
        let (left, right) = self.numbers(other, "-")?;
        Ok(Value::Number(left - right))
    }

    pub fn less_than(&self, other: &Value) -> Result<Value, RuntimeError> {
        let (left, right) = self.numbers(other, "<")?;
        Ok(Value::Number(if left < right { 1.0 } else { 0.0 }))
    }

    pub fn concat(&self, other: &Value) -> Value {
        let mut text = self.to_text();
        text.push_str(&other.to_text());
        Value::String(text)
    }

    fn numbers(&self, other: &Value, operation: &'static str) -> Result<(f64, f64), RuntimeError> {
        match (self, other) {
            (Value::Number(left), Value::Number(right)) => Ok((*left, *right)),
            _ => Err(RuntimeError::UnsupportedOperation {
                operation,
                left: self.type_name(),
                right: other.type_name(),
            }),
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::ZERO
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(value) => f.write_str(&format_number(*value)),
            Value::String(text) => write!(f, "{text:?}"),
        }
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// The fixed store of one slot per single-letter variable.
#[derive(Debug, Clone, PartialEq)]
pub struct Variables {
    slots: [Value; VARIABLE_COUNT],
}

impl Variables {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| Value::ZERO),
        }
    }

    pub fn get(&self, variable: Variable) -> &Value {
        &self.slots[usize::from(variable.index())]
    }

    pub fn set(&mut self, variable: Variable, value: Value) {
        self.slots[usize::from(variable.index())] = value;
    }

    /// Slots that no longer hold zero, in alphabetical order.
    pub fn non_zero(&self) -> impl Iterator<Item = (Variable, &Value)> {
        Variable::all()
            .map(|variable| (variable, self.get(variable)))
            .filter(|(_, value)| !value.is_zero())
    }
}

impl Default for Variables {
    fn default() -> Self {
        Self::new()
    }
}

/// Final report: one `letter = value` line per non-zero slot.
impl fmt::Display for Variables {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (variable, value) in self.non_zero() {
            writeln!(f, "{variable} = {value}")?;
        }
        Ok(())
    }
}
