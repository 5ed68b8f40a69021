use std::fmt::Display;

/// Advisory commands a client may send over the push channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Ask the server to re-send a full snapshot.
    Refresh,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Refresh => "refresh",
        }
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
