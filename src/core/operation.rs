//! The operations a resource view can expose

use axum::routing::MethodFilter;
use std::fmt;
use std::str::FromStr;

/// A named operation of a resource view
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operation {
    List,
    Count,
    GetOne,
    Create,
    Replace,
    Update,
    Delete,
    /// Application-defined operation served at `{base}/{name}`
    Custom(String),
}

/// Error for an operation name that is not recognised
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown operation '{0}'")]
pub struct UnknownOperation(pub String);

impl Operation {
    /// The seven standard operations, in registration order
    pub const STANDARD: [Operation; 7] = [
        Operation::List,
        Operation::Count,
        Operation::GetOne,
        Operation::Create,
        Operation::Replace,
        Operation::Update,
        Operation::Delete,
    ];

    pub fn name(&self) -> &str {
        match self {
            Operation::List => "list",
            Operation::Count => "count",
            Operation::GetOne => "get_one",
            Operation::Create => "create",
            Operation::Replace => "replace",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Custom(name) => name,
        }
    }

    /// HTTP method of a standard operation
    ///
    /// Custom operations carry their method at registration.
    pub fn method(&self) -> Option<MethodFilter> {
        match self {
            Operation::List | Operation::Count | Operation::GetOne => Some(MethodFilter::GET),
            Operation::Create => Some(MethodFilter::POST),
            Operation::Replace => Some(MethodFilter::PUT),
            Operation::Update => Some(MethodFilter::PATCH),
            Operation::Delete => Some(MethodFilter::DELETE),
            Operation::Custom(_) => None,
        }
    }

    /// Route path of this operation under `base`
    pub fn path(&self, base: &str) -> String {
        let base = base.trim_end_matches('/');
        match self {
            Operation::List | Operation::Create => {
                if base.is_empty() {
                    "/".to_string()
                } else {
                    base.to_string()
                }
            }
            Operation::Count => format!("{}/count", base),
            Operation::GetOne | Operation::Replace | Operation::Update | Operation::Delete => {
                format!("{}/{{id}}", base)
            }
            Operation::Custom(name) => format!("{}/{}", base, name),
        }
    }

    pub fn is_standard(&self) -> bool {
        !matches!(self, Operation::Custom(_))
    }

    /// Parse a configured operation name, accepting only standard ones
    pub fn parse_standard(name: &str) -> Result<Self, UnknownOperation> {
        let op: Operation = name.parse()?;
        if op.is_standard() {
            Ok(op)
        } else {
            Err(UnknownOperation(name.to_string()))
        }
    }
}

impl FromStr for Operation {
    type Err = UnknownOperation;

    /// Standard names map to their variant; any other identifier-like name
    /// is a custom operation
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "list" => Operation::List,
            "count" => Operation::Count,
            "get_one" => Operation::GetOne,
            "create" => Operation::Create,
            "replace" => Operation::Replace,
            "update" => Operation::Update,
            "delete" => Operation::Delete,
            other => {
                let valid = !other.is_empty()
                    && other
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
                if !valid {
                    return Err(UnknownOperation(other.to_string()));
                }
                Operation::Custom(other.to_string())
            }
        })
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
