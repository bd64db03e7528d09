mod error;

pub use error::ErrorKind;

/// The packfetch `Result` type
pub type Result<T> = std::result::Result<T, crate::ErrorKind>;
