use crate::error::ActionResult;
use serde::Serialize;

/// Wire shape of an action result: `{ "data": ... }` or `{ "error": "..." }`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ActionResponse<T> {
    Data { data: T },
    Error { error: String },
}

impl<T> From<ActionResult<T>> for ActionResponse<T> {
    fn from(result: ActionResult<T>) -> Self {
        match result {
            Ok(data) => ActionResponse::Data { data },
            Err(e) => ActionResponse::Error {
                error: e.to_string(),
            },
        }
    }
}
