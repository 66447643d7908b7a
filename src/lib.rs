//! Strip comments, and optionally preprocessor lines, from C/C++ source.
//!
//! The work is done by a single-pass byte scanner ([`scanner::Scanner`]) that
//! knows just enough about string literals, `/* */` and `//` comments and `#`
//! lines to decide what to copy to its output.

pub mod config;
pub mod data;
pub mod preproc;
pub mod scanner;
pub mod tracing_config;

pub use config::Config;
pub use data::{Result, StripError};
pub use scanner::{Scanner, Summary, process};
