use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HiveError {
    SessionNotFound {
        session_id: String,
    },
    NoRecyclable {
        remote: String,
    },
    Corrupted {
        session_id: String,
        reason: String,
    },
    InvalidSessionState {
        session_id: String,
        current_state: String,
        expected_state: String,
    },
    CommandFailed {
        command: String,
        status: Option<i32>,
        stderr: String,
    },
    Template {
        template: String,
        message: String,
    },
    PathTraversal {
        pattern: String,
        path: String,
    },
    Io {
        operation: String,
        path: String,
        message: String,
    },
    Cancelled {
        operation: String,
    },
    Config {
        key: String,
        message: String,
    },
}

impl HiveError {
    pub fn io(operation: &str, path: impl fmt::Display, error: impl ToString) -> Self {
        HiveError::Io {
            operation: operation.to_string(),
            path: path.to_string(),
            message: error.to_string(),
        }
    }

    pub fn config(key: &str, message: impl ToString) -> Self {
        HiveError::Config {
            key: key.to_string(),
            message: message.to_string(),
        }
    }

    pub fn cancelled(operation: &str) -> Self {
        HiveError::Cancelled {
            operation: operation.to_string(),
        }
    }

    pub fn not_found(session_id: &str) -> Self {
        HiveError::SessionNotFound {
            session_id: session_id.to_string(),
        }
    }
}

impl fmt::Display for HiveError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::SessionNotFound { session_id } => {
                write!(f, "Session '{session_id}' not found")
            }
            Self::NoRecyclable { remote } => {
                write!(f, "No recyclable session for remote '{remote}'")
            }
            Self::Corrupted { session_id, reason } => {
                write!(f, "Session '{session_id}' is corrupted: {reason}")
            }
            Self::InvalidSessionState {
                session_id,
                current_state,
                expected_state,
            } => {
                write!(
                    f,
                    "Session '{session_id}' is in state '{current_state}', expected '{expected_state}'"
                )
            }
            Self::CommandFailed {
                command,
                status,
                stderr,
            } => {
                let status = status
                    .map(|code| code.to_string())
                    .unwrap_or_else(|| "signal".to_string());
                if stderr.is_empty() {
                    write!(f, "Command '{command}' failed (exit status {status})")
                } else {
                    write!(
                        f,
                        "Command '{command}' failed (exit status {status}): {stderr}"
                    )
                }
            }
            Self::Template { template, message } => {
                write!(f, "Template '{template}' could not be rendered: {message}")
            }
            Self::PathTraversal { pattern, path } => {
                write!(
                    f,
                    "Copy pattern '{pattern}' resolves outside the source directory: {path}"
                )
            }
            Self::Io {
                operation,
                path,
                message,
            } => {
                write!(f, "I/O error during '{operation}' on '{path}': {message}")
            }
            Self::Cancelled { operation } => {
                write!(f, "Operation '{operation}' was cancelled")
            }
            Self::Config { key, message } => {
                write!(f, "Configuration error for key '{key}': {message}")
            }
        }
    }
}

impl std::error::Error for HiveError {}

fn root_kind(error: &anyhow::Error) -> Option<&HiveError> {
    error.chain().find_map(|cause| cause.downcast_ref::<HiveError>())
}

pub fn is_not_found(error: &anyhow::Error) -> bool {
    matches!(root_kind(error), Some(HiveError::SessionNotFound { .. }))
}

pub fn is_no_recyclable(error: &anyhow::Error) -> bool {
    matches!(root_kind(error), Some(HiveError::NoRecyclable { .. }))
}

pub fn is_cancelled(error: &anyhow::Error) -> bool {
    matches!(root_kind(error), Some(HiveError::Cancelled { .. }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn command_failure_mentions_status_and_stderr() {
        let err = HiveError::CommandFailed {
            command: "git pull".to_string(),
            status: Some(1),
            stderr: "fatal: not a git repository".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Command 'git pull' failed (exit status 1): fatal: not a git repository"
        );

        let killed = HiveError::CommandFailed {
            command: "sleep 5".to_string(),
            status: None,
            stderr: String::new(),
        };
        assert_eq!(
            killed.to_string(),
            "Command 'sleep 5' failed (exit status signal)"
        );
    }

    #[test]
    fn predicates_see_through_context() {
        let err = anyhow::Error::new(HiveError::not_found("abc123"))
            .context("Failed to recycle session 'abc123'");
        assert!(is_not_found(&err));
        assert!(!is_cancelled(&err));

        let result: anyhow::Result<()> = Err(HiveError::cancelled("clone").into());
        let err = result.context("Failed to create session").unwrap_err();
        assert!(is_cancelled(&err));
    }

    #[test]
    fn no_recyclable_is_distinguishable() {
        let err: anyhow::Error = HiveError::NoRecyclable {
            remote: "https://github.com/x/y".to_string(),
        }
        .into();
        assert!(is_no_recyclable(&err));
        assert!(!is_not_found(&err));
    }
}
