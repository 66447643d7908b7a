use std::collections::BTreeSet;

/// Options for one run of the filter. Immutable once scanning starts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    /// Drop every preprocessor line, whatever its name.
    pub delete_preprocessor: bool,
    /// Keep `/* ... */` comments instead of discarding them.
    pub keep_ansi_comment: bool,
    /// Keep `// ...` comments instead of discarding them.
    pub keep_cpp_comment: bool,
    /// Lowercase names of directives to drop (e.g. `include`).
    pub delete_directives: BTreeSet<String>,
    /// Reserved. Accepted for compatibility, never consulted.
    pub ignore_comment_lines: Vec<String>,
    /// Let an unescaped quote in plain text open a string literal.
    ///
    /// Off by default: historically the very first quote of a stream never
    /// opens a string, and since no later quote can either, comment markers
    /// inside string literals are treated as real comments.
    pub track_strings: bool,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `name` to the deletion set. Blank names are ignored.
    pub fn delete_directive(&mut self, name: &str) -> &mut Self {
        let name = name.trim().to_lowercase();
        if !name.is_empty() {
            self.delete_directives.insert(name);
        }
        self
    }

    pub fn delete_includes(&mut self) -> &mut Self {
        self.delete_directive("include")
    }

    /// True if a directive with this (already lowercased) name is dropped.
    pub fn deletes(&self, name: &str) -> bool {
        self.delete_directives.contains(name)
    }
}
