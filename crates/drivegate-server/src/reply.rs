//! Control-channel replies.

use std::fmt;

use drivegate_kernel::{GateError, SessionError};

use crate::command::ParseError;

/// A numbered reply, possibly multi-line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub code: u16,
    lines: Vec<String>,
}

impl Reply {
    pub fn new(code: u16, text: impl Into<String>) -> Self {
        Self {
            code,
            lines: vec![text.into()],
        }
    }

    /// `code-first`, indented middle lines, `code last`.
    pub fn multiline(code: u16, lines: Vec<String>) -> Self {
        Self { code, lines }
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// Positive completion or preliminary reply.
    pub fn is_success(&self) -> bool {
        self.code < 400
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.lines.as_slice() {
            [] => write!(f, "{}\r\n", self.code),
            [only] => write!(f, "{} {}\r\n", self.code, only),
            [first, middle @ .., last] => {
                write!(f, "{}-{}\r\n", self.code, first)?;
                for line in middle {
                    write!(f, " {line}\r\n")?;
                }
                write!(f, "{} {}\r\n", self.code, last)
            }
        }
    }
}

impl From<&GateError> for Reply {
    fn from(e: &GateError) -> Self {
        match e {
            GateError::AuthFailed(_) => Reply::new(530, "Authentication failed."),
            GateError::PermissionDenied(_) => Reply::new(550, "Permission denied."),
            GateError::NotFound(path) => Reply::new(550, format!("{path}: No such file or directory.")),
            GateError::NotADirectory(path) => Reply::new(550, format!("{path}: Not a directory.")),
            GateError::IsADirectory(path) => Reply::new(550, format!("{path}: Is a directory.")),
            GateError::Conflict(path) => Reply::new(550, format!("{path}: File exists.")),
            GateError::NotEmpty(path) => Reply::new(550, format!("{path}: Directory not empty.")),
            GateError::InvalidPath(msg) => Reply::new(553, format!("{msg}.")),
            GateError::Store(_) => Reply::new(451, "Local error in user store."),
            GateError::Io(e) => Reply::new(550, format!("{e}.")),
        }
    }
}

impl From<&SessionError> for Reply {
    fn from(e: &SessionError) -> Self {
        match e {
            SessionError::NotLoggedIn => Reply::new(530, "Log in with USER and PASS first."),
            SessionError::UserRequired => Reply::new(503, "Login with USER first."),
            SessionError::AlreadyLoggedIn => Reply::new(503, "Already logged in."),
            SessionError::Closed => Reply::new(421, "Session closed."),
            SessionError::RenameSequence => Reply::new(503, "RNFR required first."),
            SessionError::Gate(e) => Reply::from(e),
        }
    }
}

impl From<&ParseError> for Reply {
    fn from(e: &ParseError) -> Self {
        match e {
            ParseError::Unknown(verb) => Reply::new(500, format!("Command {verb:?} not understood.")),
            ParseError::MissingArgument(_) | ParseError::BadArgument(_) => {
                Reply::new(501, "Syntax error in parameters or arguments.")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_and_multi_line_wire_forms() {
        assert_eq!(Reply::new(200, "OK.").to_string(), "200 OK.\r\n");
        let feat = Reply::multiline(211, vec!["Features:".into(), "EPSV".into(), "End".into()]);
        assert_eq!(feat.to_string(), "211-Features:\r\n EPSV\r\n211 End\r\n");
    }

    #[test]
    fn namespace_errors_are_550() {
        for e in [
            GateError::not_found("C:\\x"),
            GateError::not_a_directory("C:\\x"),
            GateError::is_a_directory("C:\\x"),
            GateError::conflict("C:\\x"),
            GateError::not_empty("C:\\x"),
            GateError::permission_denied("C:\\x"),
        ] {
            assert_eq!(Reply::from(&e).code, 550, "{e}");
        }
    }

    #[test]
    fn session_errors() {
        assert_eq!(Reply::from(&SessionError::UserRequired).code, 503);
        assert_eq!(Reply::from(&SessionError::NotLoggedIn).code, 530);
        assert_eq!(Reply::from(&SessionError::Gate(GateError::auth_failed("bob"))).code, 530);
        assert_eq!(Reply::from(&SessionError::Closed).code, 421);
    }
}
