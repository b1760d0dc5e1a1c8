use std::path::PathBuf;

use colored::Colorize;

use self::lexer::Span;

pub mod ast;
pub mod intern;
pub mod lexer;
pub mod parser;

#[derive(Debug)]
pub struct SourceFile {
    pub contents: String,
    pub origin: SourceFileOrigin,
}

impl SourceFile {
    pub fn new_in_memory(contents: impl Into<String>) -> Self {
        Self {
            contents: contents.into(),
            origin: SourceFileOrigin::Memory,
        }
    }

    pub fn value_of_span(&self, span: Span) -> &str {
        &self.contents[span.start..span.end]
    }

    /// 1-based line number of a byte position
    pub fn row_for_position(&self, position: usize) -> usize {
        let position = position.min(self.contents.len());
        self.contents[..position].matches('\n').count() + 1
    }

    /// 1-based column number of a byte position
    pub fn column_for_position(&self, position: usize) -> usize {
        let position = position.min(self.contents.len());
        match self.contents[..position].rfind('\n') {
            Some(newline) => position - newline,
            None => position + 1,
        }
    }

    /// Prints the source line containing the start of the span with the
    /// spanned region underlined.
    pub fn highlight_span(&self, span: Span) {
        let start = span.start.min(self.contents.len());
        let line_start = match self.contents[..start].rfind('\n') {
            Some(newline) => newline + 1,
            None => 0,
        };
        let line_end = self.contents[line_start..]
            .find('\n')
            .map(|offset| line_start + offset)
            .unwrap_or(self.contents.len());

        let row = self.row_for_position(span.start);
        let gutter = format!("{row:>4} | ");
        let gutter_width = gutter.len();

        eprintln!("{}{}", gutter.blue(), &self.contents[line_start..line_end]);

        let underline_start = start - line_start;
        let underline_len = (span.end.min(line_end)).saturating_sub(start).max(1);
        eprintln!(
            "{}{}{}",
            " ".repeat(gutter_width),
            " ".repeat(underline_start),
            "^".repeat(underline_len).red().bold()
        );
    }

    /// Reports a fatal diagnostic pointing at `span` and aborts the
    /// compilation with exit status 1.
    pub fn report_fatal_error(&self, span: Span, message: &str) -> ! {
        eprintln!(
            "{} {} ({}:{}:{})",
            "error:".red().bold(),
            message,
            self.origin,
            self.row_for_position(span.start),
            self.column_for_position(span.start)
        );
        self.highlight_span(span);
        std::process::exit(1);
    }
}

#[derive(Debug)]
pub enum SourceFileOrigin {
    Memory,
    File(PathBuf),
}

impl core::fmt::Display for SourceFileOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceFileOrigin::Memory => f.write_str("<memory>"),
            SourceFileOrigin::File(path) => f.write_fmt(format_args!("{}", path.display())),
        }
    }
}
