use serde::Serialize;

use crate::value::Value;

/// Outcome state of one formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExState {
    Ok,
    Error,
}

/// The value of one executed formula, tagged with the formula's position in the input batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExResult {
    pub value: Value,
    pub index: usize,
    pub state: ExState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExResult {
    pub fn ok(value: Value, index: usize) -> Self {
        Self {
            value,
            index,
            state: ExState::Ok,
            error: None,
        }
    }

    /// The formula at `index` raised an error instead of producing a value.
    pub fn error(index: usize, message: impl Into<String>) -> Self {
        Self {
            value: Value::Null,
            index,
            state: ExState::Error,
            error: Some(message.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.state == ExState::Ok
    }
}
