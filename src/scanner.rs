use std::io::{self, BufRead, BufReader, Read, Write};

use tracing::{debug, trace};

use crate::config::Config;
use crate::data::*;
use crate::preproc::Directive;

/// Byte reader with one character of lookahead.
///
/// Carriage returns are dropped on read, so `\r\n` comes out as `\n`. The
/// lookahead is the raw next byte though, which can still be a `\r`.
#[derive(Debug)]
pub struct CharSource<R> {
    inner: R,
    pub line: usize,
    pub current: Option<u8>,
    pub next: Option<u8>,
    pub previous: Option<u8>,
    pub bytes_read: usize,
}

impl<R: BufRead> CharSource<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            line: 1,
            current: None,
            next: None,
            previous: None,
            bytes_read: 0,
        }
    }

    fn peek_byte(&mut self) -> io::Result<Option<u8>> {
        loop {
            match self.inner.fill_buf() {
                Ok(buf) => return Ok(buf.first().copied()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        loop {
            let Some(byte) = self.peek_byte()? else {
                return Ok(None);
            };
            self.inner.consume(1);
            self.bytes_read += 1;
            if byte != b'\r' {
                return Ok(Some(byte));
            }
        }
    }

    /// Moves one character forward and returns it, `None` at end of input.
    ///
    /// `line` is bumped as soon as the lookahead is a newline, one character
    /// before that newline is actually consumed.
    pub fn advance(&mut self) -> io::Result<Option<u8>> {
        self.previous = self.current;
        self.current = self.read_byte()?;
        self.next = self.peek_byte()?;
        if self.next == Some(b'\n') {
            self.line += 1;
        }
        Ok(self.current)
    }
}

#[derive(Debug)]
enum Mode {
    Plain,
    InString(u8),
    BlockComment,
    // The `*` of `*/` was just seen; the `/` comes next.
    BlockCommentClosing,
    LineComment,
    Directive(Directive),
}

/// Counters for one processed stream.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub bytes_read: usize,
    pub bytes_written: usize,
    pub block_comments: usize,
    pub line_comments: usize,
    pub directives_removed: usize,
    pub lines: usize,
}

/// Single-pass comment and directive filter over one input stream.
pub struct Scanner<'a, R, W> {
    source: CharSource<R>,
    sink: W,
    config: &'a Config,
    mode: Mode,
    index: usize,
    summary: Summary,
}

fn is_quote(ch: u8) -> bool {
    ch == b'"' || ch == b'\''
}

impl<'a, R: BufRead, W: Write> Scanner<'a, R, W> {
    pub fn new(input: R, sink: W, config: &'a Config) -> Self {
        Self {
            source: CharSource::new(input),
            sink,
            config,
            mode: Mode::Plain,
            index: 0,
            summary: Summary::default(),
        }
    }

    /// Line of the upcoming character (see [`CharSource::advance`]).
    pub fn line(&self) -> usize {
        self.source.line
    }

    /// Consumes the whole input, writing the filtered text to the sink.
    pub fn run(mut self) -> Result<Summary> {
        while let Some(ch) = self
            .source
            .advance()
            .map_err(|e| StripError::read(self.source.line, e))?
        {
            self.step(ch)?;
        }

        match &self.mode {
            Mode::Plain | Mode::InString(_) => {}
            Mode::Directive(directive) => debug!(
                line = self.source.line,
                name = directive.name(),
                "input ended inside a directive, dropping it"
            ),
            mode => debug!(line = self.source.line, ?mode, "input ended inside a comment"),
        }

        self.sink
            .flush()
            .map_err(|e| StripError::write(self.source.line, e))?;

        self.summary.bytes_read = self.source.bytes_read;
        self.summary.lines = self.source.line;
        debug!(summary = ?self.summary, "stream done");
        Ok(self.summary)
    }

    fn step(&mut self, ch: u8) -> Result<()> {
        let prev = self.source.previous;
        let keep_ansi = self.config.keep_ansi_comment;
        let keep_cpp = self.config.keep_cpp_comment;

        self.mode = match std::mem::replace(&mut self.mode, Mode::Plain) {
            Mode::Plain => self.plain(ch)?,
            Mode::InString(delim) => self.in_string(ch, delim)?,
            Mode::BlockComment => {
                self.emit_if(keep_ansi, ch)?;
                if ch == b'*' && self.source.next == Some(b'/') {
                    Mode::BlockCommentClosing
                } else {
                    Mode::BlockComment
                }
            }
            Mode::BlockCommentClosing => {
                self.emit_if(keep_ansi, ch)?;
                self.index += 1;
                Mode::Plain
            }
            Mode::LineComment => {
                if ch == b'\n' && prev != Some(b'\\') {
                    // The line itself survives the comment.
                    self.emit(ch)?;
                    self.index += 1;
                    Mode::Plain
                } else {
                    self.emit_if(keep_cpp, ch)?;
                    Mode::LineComment
                }
            }
            Mode::Directive(mut directive) => {
                if directive.feed(ch, prev, self.config) {
                    if directive.is_skipped() || self.config.delete_preprocessor {
                        self.summary.directives_removed += 1;
                        debug!(
                            line = self.source.line,
                            name = directive.name(),
                            "removed directive"
                        );
                    }
                    self.emit_all(&directive.into_output())?;
                    self.index += 1;
                    Mode::Plain
                } else {
                    Mode::Directive(directive)
                }
            }
        };
        Ok(())
    }

    fn plain(&mut self, ch: u8) -> Result<Mode> {
        let prev = self.source.previous;
        let next = self.source.next;

        if self.config.track_strings && is_quote(ch) && prev != Some(b'\\') {
            self.emit(ch)?;
            self.index += 1;
            return Ok(Mode::InString(ch));
        }

        if ch == b'/' && next == Some(b'*') {
            self.summary.block_comments += 1;
            trace!(line = self.source.line, "block comment");
            self.emit_if(self.config.keep_ansi_comment, ch)?;
            return Ok(Mode::BlockComment);
        }

        if ch == b'/' && next == Some(b'/') && self.is_boundary(prev) {
            self.summary.line_comments += 1;
            trace!(line = self.source.line, "line comment");
            self.emit_if(self.config.keep_cpp_comment, ch)?;
            return Ok(Mode::LineComment);
        }

        if ch == b'#' && self.is_boundary(prev) {
            return Ok(Mode::Directive(Directive::start(self.config)));
        }

        self.emit(ch)?;
        self.index += 1;
        Ok(Mode::Plain)
    }

    fn in_string(&mut self, ch: u8, delim: u8) -> Result<Mode> {
        let prev = self.source.previous;
        self.emit(ch)?;
        self.index += 1;

        if !is_quote(ch) || prev == Some(b'\\') {
            return Ok(Mode::InString(delim));
        }
        if ch == delim {
            Ok(Mode::Plain)
        } else {
            // A quote of the other kind takes over as the delimiter.
            Ok(Mode::InString(ch))
        }
    }

    /// Whether a line comment or directive may start after `ch`.
    fn is_boundary(&self, ch: Option<u8>) -> bool {
        self.index == 0 || matches!(ch, Some(b' ' | b'\n' | b'\t'))
    }

    fn emit(&mut self, ch: u8) -> Result<()> {
        self.emit_all(&[ch])
    }

    fn emit_if(&mut self, keep: bool, ch: u8) -> Result<()> {
        if keep { self.emit(ch) } else { Ok(()) }
    }

    fn emit_all(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        self.sink
            .write_all(bytes)
            .map_err(|e| StripError::write(self.source.line, e))?;
        self.summary.bytes_written += bytes.len();
        Ok(())
    }
}

/// Filters `input` into `output` according to `config`.
pub fn process<R: Read, W: Write>(input: R, output: W, config: &Config) -> Result<()> {
    Scanner::new(BufReader::new(input), output, config).run()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip(input: &str, config: &Config) -> String {
        let mut out = Vec::new();
        process(input.as_bytes(), &mut out, config).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn summary(input: &str, config: &Config) -> Summary {
        Scanner::new(input.as_bytes(), Vec::new(), config)
            .run()
            .unwrap()
    }

    fn keep_all() -> Config {
        Config {
            keep_ansi_comment: true,
            keep_cpp_comment: true,
            ..Config::default()
        }
    }

    #[test]
    fn trailing_line_comment_is_removed() {
        assert_eq!(strip("int x; // trailing\n", &Config::new()), "int x; \n");
    }

    #[test]
    fn block_comment_is_removed() {
        assert_eq!(strip("/* block */\ncode();", &Config::new()), "\ncode();");
        assert_eq!(strip("a/*b*/c", &Config::new()), "ac");
        assert_eq!(
            strip("x = 1; /* multi\n line\n */ y = 2;\n", &Config::new()),
            "x = 1;  y = 2;\n"
        );
    }

    #[test]
    fn slash_star_slash_closes_immediately() {
        assert_eq!(strip("/*/x", &Config::new()), "x");
    }

    #[test]
    fn line_comment_needs_a_boundary() {
        assert_eq!(strip("a//b\n", &Config::new()), "a//b\n");
        assert_eq!(strip("url: http://x\n", &Config::new()), "url: http://x\n");
        assert_eq!(strip("//top\nx\n", &Config::new()), "\nx\n");
        assert_eq!(strip("a\t// tab\n", &Config::new()), "a\t\n");
    }

    #[test]
    fn line_comment_continues_over_backslash_newline() {
        assert_eq!(strip("// a\\\nb\n", &Config::new()), "\n");
        assert_eq!(strip("x // a\\\nb\nc\n", &Config::new()), "x \nc\n");
    }

    #[test]
    fn keeping_comments_is_a_passthrough() {
        let input = "/* c */ x; // d\n#define Y \\\n 2\n\"s\" 'c'\r\n// e\\\nf\n";
        assert_eq!(strip(input, &keep_all()), input.replace('\r', ""));
    }

    #[test]
    fn keep_flags_are_independent() {
        let input = "/* a */ x // b\n";
        let ansi = Config {
            keep_ansi_comment: true,
            ..Config::default()
        };
        let cpp = Config {
            keep_cpp_comment: true,
            ..Config::default()
        };
        assert_eq!(strip(input, &ansi), "/* a */ x \n");
        assert_eq!(strip(input, &cpp), " x // b\n");
    }

    #[test]
    fn carriage_returns_are_dropped() {
        assert_eq!(strip("a\r\nb\r\n", &Config::new()), "a\nb\n");
        assert_eq!(strip("a\rb", &Config::new()), "ab");
        assert_eq!(strip("a\r\r\r\n", &Config::new()), "a\n");
    }

    #[test]
    fn deleted_include_loses_its_newline() {
        let mut config = Config::new();
        config.delete_includes();
        assert_eq!(strip("#include <a.h>\nmain();", &config), "main();");
        assert_eq!(
            strip("#define A 1\n  #  Include \"b.h\"\nx\n", &config),
            "#define A 1\n  x\n"
        );
        assert_eq!(strip("#include \\\n <a.h>\nx", &config), "x");
    }

    #[test]
    fn any_directive_name_can_be_deleted() {
        let mut config = Config::new();
        config.delete_directive("pragma").delete_directive("undef");
        assert_eq!(
            strip("#pragma once\n#undef X\n#define X\n", &config),
            "#define X\n"
        );
    }

    #[test]
    fn delete_preprocessor_removes_every_directive() {
        let config = Config {
            delete_preprocessor: true,
            ..Config::default()
        };
        assert_eq!(strip("#define X 1\n", &config), "");
        assert_eq!(
            strip("#if A\nint a;\n#endif\nint b;\n", &config),
            "int a;\nint b;\n"
        );
    }

    #[test]
    fn directive_needs_a_boundary() {
        let config = Config {
            delete_preprocessor: true,
            ..Config::default()
        };
        assert_eq!(strip("x#y\n", &config), "x#y\n");
        // Only the very first character counts as start of input.
        assert_eq!(strip("/**/#define X\n", &config), "#define X\n");
    }

    #[test]
    fn quotes_do_not_open_strings_by_default() {
        assert_eq!(
            strip("\"a /* not a comment */ b\"", &Config::new()),
            "\"a  b\""
        );
        assert_eq!(strip("s = \"x\"; // y\n", &Config::new()), "s = \"x\"; \n");
    }

    #[test]
    fn tracked_strings_hide_comment_markers() {
        let config = Config {
            track_strings: true,
            ..Config::default()
        };
        assert_eq!(
            strip("\"a /* not a comment */ b\"", &config),
            "\"a /* not a comment */ b\""
        );
        assert_eq!(
            strip("p(\"a\\\" // x\" /* c */);\n", &config),
            "p(\"a\\\" // x\" );\n"
        );
        assert_eq!(strip("c = '#'; // x\n", &config), "c = '#'; \n");
    }

    #[test]
    fn other_quote_kind_switches_the_delimiter() {
        let config = Config {
            track_strings: true,
            ..Config::default()
        };
        // The `'` takes over, so the closing `"` reopens a string and the
        // comment stays.
        assert_eq!(strip("\"it's\" // c\n", &config), "\"it's\" // c\n");
    }

    #[test]
    fn unterminated_constructs_stop_silently() {
        assert_eq!(strip("a /* never", &Config::new()), "a ");
        assert_eq!(strip("a /* never", &keep_all()), "a /* never");
        assert_eq!(strip("x\n#define X 1", &Config::new()), "x\n");
        assert_eq!(strip("x // no newline", &Config::new()), "x ");
    }

    #[test]
    fn ignore_comment_lines_is_inert() {
        let config = Config {
            ignore_comment_lines: vec!["NOLINT".to_string()],
            ..Config::default()
        };
        assert_eq!(strip("a // NOLINT\n", &config), "a \n");
    }

    #[test]
    fn summary_counts_what_was_seen() {
        let mut config = Config::new();
        config.delete_includes();
        let input = "/* a */ x // b\n#include <x>\n#define Y\n";
        let summary = summary(input, &config);
        assert_eq!(summary.block_comments, 1);
        assert_eq!(summary.line_comments, 1);
        assert_eq!(summary.directives_removed, 1);
        assert_eq!(summary.bytes_read, input.len());
        assert_eq!(summary.bytes_written, " x \n#define Y\n".len());
    }

    #[test]
    fn line_counter_follows_lookahead() {
        assert_eq!(summary("a\nb\n", &Config::new()).lines, 3);
        assert_eq!(summary("a\nb", &Config::new()).lines, 2);
        // The lookahead sees the raw `\r`, never the `\n` behind it.
        assert_eq!(summary("a\r\nb\r\n", &Config::new()).lines, 1);
    }

    #[test]
    fn advance_tracks_previous_and_next() {
        let mut source = CharSource::new(&b"ab\n"[..]);
        assert_eq!(source.advance().unwrap(), Some(b'a'));
        assert_eq!((source.previous, source.next, source.line), (None, Some(b'b'), 1));
        assert_eq!(source.advance().unwrap(), Some(b'b'));
        assert_eq!((source.previous, source.next, source.line), (Some(b'a'), Some(b'\n'), 2));
        assert_eq!(source.advance().unwrap(), Some(b'\n'));
        assert_eq!(source.advance().unwrap(), None);
        assert_eq!(source.next, None);
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "disk on fire"))
        }
    }

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn read_errors_propagate() {
        let err = process(FailingReader, Vec::new(), &Config::new()).unwrap_err();
        assert_eq!(err.msg, "failed to read input");
        assert_eq!(err.cause.kind(), io::ErrorKind::Other);
    }

    #[test]
    fn write_errors_propagate() {
        let err = process(&b"x"[..], FailingWriter, &Config::new()).unwrap_err();
        assert_eq!(err.msg, "failed to write output");
        assert_eq!(err.cause.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn fully_removed_input_writes_nothing() {
        let config = Config::new();
        assert_eq!(strip("/* only */", &config), "");
        assert_eq!(strip("", &config), "");
        assert!(process(&b"/* x */"[..], FailingWriter, &config).is_ok());
    }
}
