//! Credentials accepted by `start`.
//!
//! | Authorization header  | Body                      | Meaning                     |
//! |-----------------------|---------------------------|-----------------------------|
//! | absent or empty       | no `anonymous` key        | new anonymous player        |
//! | absent or empty       | `{"anonymous": "<name>"}` | existing anonymous player   |
//! | `a:<name>`            | ignored                   | existing anonymous player   |
//! | `Bearer <username>`   | ignored                   | identified player           |
//!
//! Anything else, or an empty name, is a bad request.

use serde_json::Value;

use crate::error::CollectorError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartCredentials {
    NewAnonymous,
    Anonymous(String),
    Identified(String),
}

const ANONYMOUS_PREFIX: &str = "a:";

pub fn parse_start_credentials(
    header: Option<&str>,
    body: Option<&Value>,
) -> Result<StartCredentials, CollectorError> {
    let header = header.map(str::trim).filter(|h| !h.is_empty());

    let Some(header) = header else {
        return from_body(body);
    };

    if let Some(name) = header.strip_prefix(ANONYMOUS_PREFIX) {
        return non_empty(name).map(StartCredentials::Anonymous);
    }

    match header.split_once(' ') {
        Some((scheme, username)) if scheme.eq_ignore_ascii_case("bearer") => {
            non_empty(username).map(StartCredentials::Identified)
        }
        _ => Err(CollectorError::BadRequest(
            "Invalid authorization header".to_string(),
        )),
    }
}

fn from_body(body: Option<&Value>) -> Result<StartCredentials, CollectorError> {
    match body.and_then(|b| b.get("anonymous")) {
        None | Some(Value::Null) => Ok(StartCredentials::NewAnonymous),
        Some(Value::String(name)) => non_empty(name).map(StartCredentials::Anonymous),
        Some(_) => Err(CollectorError::BadRequest(
            "Field 'anonymous' must be a string".to_string(),
        )),
    }
}

fn non_empty(name: &str) -> Result<String, CollectorError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CollectorError::BadRequest(
            "Player name must not be empty".to_string(),
        ));
    }
    Ok(name.to_string())
}
