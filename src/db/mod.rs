pub mod access_requests;
pub mod borrow_transactions;
pub mod notifications;
pub mod scans;
pub mod storage;
pub mod theses;
pub mod users;
pub mod views;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::core::AppError;

pub(crate) fn decode_row<T: DeserializeOwned>(row: Value) -> Result<T, AppError> {
    Ok(serde_json::from_value(row)?)
}

pub(crate) fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>, AppError> {
    rows.into_iter().map(decode_row).collect()
}

pub(crate) fn first_row<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Option<T>, AppError> {
    rows.into_iter().next().map(decode_row).transpose()
}
