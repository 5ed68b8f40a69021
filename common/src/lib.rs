#[cfg(feature = "logger")]
pub mod logger;

#[cfg(feature = "protocol")]
pub mod protocol;

#[cfg(feature = "runtime")]
pub mod runtime;
