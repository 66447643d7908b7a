use std::io;

#[derive(Debug)]
pub struct StripError {
    pub msg: String,
    pub line: usize, // Scanner line counter when the failure happened.
    pub cause: io::Error,
}

impl StripError {
    pub fn new(msg: impl Into<String>, line: usize, cause: io::Error) -> Self {
        Self {
            msg: msg.into(),
            line,
            cause,
        }
    }

    pub fn read(line: usize, cause: io::Error) -> Self {
        Self::new("failed to read input", line, cause)
    }

    pub fn write(line: usize, cause: io::Error) -> Self {
        Self::new("failed to write output", line, cause)
    }
}

impl std::fmt::Display for StripError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Error at line {}: {}", self.line, self.msg)
    }
}

impl std::error::Error for StripError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.cause)
    }
}

pub type Result<T> = std::result::Result<T, StripError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn display_names_line_and_keeps_cause_as_source() {
        let err = StripError::write(7, io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"));
        assert_eq!(err.to_string(), "Error at line 7: failed to write output");
        assert_eq!(err.source().unwrap().to_string(), "pipe closed");
    }
}
