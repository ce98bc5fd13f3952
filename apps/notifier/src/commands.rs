//! Operator commands read from stdin.

/// A parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Sign in with a session token.
    Login(String),
    /// Sign out, closing the push channel.
    Logout,
    Status,
    /// Anything else is forwarded as a raw payload.
    Send(String),
}

impl Command {
    /// Parses one line; blank lines yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let (head, rest) = match line.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (line, ""),
        };
        let command = match head {
            "/login" => Self::Login(rest.to_string()),
            "/logout" => Self::Logout,
            "/status" => Self::Status,
            _ => Self::Send(line.to_string()),
        };
        Some(command)
    }
}
