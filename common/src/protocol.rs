pub mod command;
pub mod decode;
pub mod host;

pub use command::Command;
pub use decode::{DecodeError, decode_batch};
pub use host::{CandidateError, HostCandidate, HostRecord, HostStatus, parse_checked_at};
