use phf::phf_set;

use crate::config::Config;

/// Directive names a C/C++ preprocessor understands.
pub static KNOWN_DIRECTIVES: phf::Set<&'static str> = phf_set! {
    "include",
    "include_next",
    "import",
    "define",
    "undef",
    "if",
    "ifdef",
    "ifndef",
    "elif",
    "else",
    "endif",
    "error",
    "warning",
    "pragma",
    "line",
    "ident",
    "sccs",
    "assert",
    "unassert",
};

pub fn is_known_directive(name: &str) -> bool {
    KNOWN_DIRECTIVES.contains(name)
}

/// One preprocessor line (with its continuations) being consumed.
///
/// The text is buffered until the closing newline so the whole line can be
/// dropped once its name turns out to be in the deletion set.
#[derive(Debug, Clone)]
pub struct Directive {
    buffer: Vec<u8>,
    name: String,
    name_done: bool,
    skip: bool,
    keep_text: bool,
}

impl Directive {
    /// Starts a directive at its `#`.
    pub fn start(config: &Config) -> Self {
        let keep_text = !config.delete_preprocessor;
        let mut buffer = Vec::new();
        if keep_text {
            buffer.push(b'#');
        }
        Self {
            buffer,
            name: String::new(),
            name_done: false,
            skip: false,
            keep_text,
        }
    }

    /// Feeds the next character. Returns `true` once the directive is over,
    /// i.e. on a newline not preceded by a backslash.
    pub fn feed(&mut self, ch: u8, prev: Option<u8>, config: &Config) -> bool {
        if !self.name_done {
            if ch.is_ascii_alphabetic() {
                self.name.push(ch.to_ascii_lowercase() as char);
            } else if !self.name.is_empty() {
                self.name_done = true;
                if config.deletes(&self.name) {
                    self.skip = true;
                    self.buffer.clear();
                }
            }
        }

        if self.keep_text && !self.skip {
            self.buffer.push(ch);
        }

        ch == b'\n' && prev != Some(b'\\')
    }

    /// Lowercased directive name, or `""` if none was seen yet.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_skipped(&self) -> bool {
        self.skip
    }

    /// Text to emit for a finished directive. Empty when it was deleted by
    /// name or when preprocessor lines are not kept at all.
    pub fn into_output(self) -> Vec<u8> {
        if self.skip { Vec::new() } else { self.buffer }
    }
}
