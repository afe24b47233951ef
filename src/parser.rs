use crate::body_parser::parse_music_line;
use crate::config::ParserOptions;
use crate::error::{AbcError, Diagnostic, DiagnosticKind};
use crate::field_parser::parse_field;
use crate::lyrics_parser::{parse_lyrics, parse_symbols};
use crate::macros::MacroSet;
use crate::transforms;
use crate::tune::Tune;
use crate::tunebook::{Section, Tunebook};
use crate::types::element::{AlignToken, Element, ElementId, LyricsLine, SymbolLine};
use crate::types::field::{Field, FieldValue, allowed_in_body};
use crate::types::header::Header;
use crate::types::instruction::Instruction;
use crate::types::text::TextString;
use crate::types::unit::Embellishment;
use std::path::PathBuf;
use std::rc::Rc;

const MAX_INCLUDE_DEPTH: usize = 4;

pub struct Parser {
    options: ParserOptions,
}

pub fn parse(text: &str) -> Result<Tunebook, AbcError> {
    Parser::new().parse(text)
}

pub fn parse_fragment(text: &str) -> Result<Tune, AbcError> {
    Parser::new().parse_fragment(text)
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    pub fn new() -> Self {
        Self {
            options: ParserOptions::default(),
        }
    }

    pub fn with_options(options: ParserOptions) -> Self {
        Self { options }
    }

    /// Parses a whole file: an optional file header followed by tunes and
    /// text sections separated by blank lines.
    pub fn parse(&self, text: &str) -> Result<Tunebook, AbcError> {
        let mut options = self.options.clone();
        let mut file_header = Header::new();
        let mut master: Option<Rc<Header>> = None;
        let mut diagnostics = Vec::new();
        let mut tunes = Vec::new();
        let mut sections = Vec::new();

        for block in split_blocks(text) {
            let (start, lines) = match block {
                Block::Typeset(text) => {
                    sections.push(Section::TypesetText(text));
                    continue;
                }
                Block::Lines { start, lines } => (start, lines),
            };

            if starts_tune(&lines) {
                let master = master
                    .get_or_insert_with(|| Rc::new(std::mem::take(&mut file_header)))
                    .clone();
                let reader = TuneReader::new(Header::with_master(master), options.clone(), false);
                let tune = reader.read(start, &lines)?;
                sections.push(Section::Tune(tunes.len()));
                tunes.push(tune);
            } else if master.is_none() && file_header.fields.is_empty() && has_fields(&lines) {
                for (offset, line) in lines.iter().enumerate() {
                    let line_no = start + offset;
                    if !read_header_line(
                        line,
                        line_no,
                        &mut file_header,
                        &mut options,
                        &mut diagnostics,
                        0,
                    ) {
                        log::debug!("Line #{}: skipping music in file header", line_no);
                    }
                }
            } else {
                let text = free_text(&lines);
                if !text.as_str().is_empty() {
                    sections.push(Section::FreeText(text));
                }
            }
        }

        Ok(Tunebook {
            header: master.unwrap_or_else(|| Rc::new(file_header)),
            tunes,
            sections,
            diagnostics,
        })
    }

    /// Parses a single tune that may lack X:, T: or K:, as embedded in
    /// other documents. Blank lines do not end it.
    pub fn parse_fragment(&self, text: &str) -> Result<Tune, AbcError> {
        let lines: Vec<&str> = text.lines().collect();
        let reader = TuneReader::new(Header::new(), self.options.clone(), true);
        reader.read(1, &lines)
    }
}

enum Block<'a> {
    Lines { start: usize, lines: Vec<&'a str> },
    Typeset(String),
}

fn split_blocks(text: &str) -> Vec<Block<'_>> {
    let mut blocks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut start = 1;
    let mut typeset: Option<Vec<&str>> = None;

    for (idx, line) in text.lines().enumerate() {
        if let Some(text) = typeset.as_mut() {
            if line.trim_start().starts_with("%%endtext") {
                blocks.push(Block::Typeset(text.join("\n")));
                typeset = None;
            } else {
                text.push(line.strip_prefix("%%").unwrap_or(line));
            }
            continue;
        }
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(Block::Lines {
                    start,
                    lines: std::mem::take(&mut current),
                });
            }
            continue;
        }
        if current.is_empty() {
            if line.trim_start().starts_with("%%begintext") {
                typeset = Some(Vec::new());
                continue;
            }
            start = idx + 1;
        }
        current.push(line);
    }

    if let Some(text) = typeset {
        blocks.push(Block::Typeset(text.join("\n")));
    }
    if !current.is_empty() {
        blocks.push(Block::Lines {
            start,
            lines: current,
        });
    }
    blocks
}

#[derive(Debug, PartialEq)]
enum Line<'a> {
    Comment,
    Directive(&'a str),
    Field(char, &'a str),
    Music(&'a str),
}

fn classify(line: &str) -> Line<'_> {
    if let Some(directive) = line.strip_prefix("%%") {
        return Line::Directive(strip_comment(directive));
    }
    if line.starts_with('%') {
        return Line::Comment;
    }
    let mut chars = line.chars();
    if let (Some(id), Some(':')) = (chars.next(), chars.next()) {
        // `A:|` is a note followed by a repeat bar
        let bar_follows = matches!(chars.next(), Some('|' | ':'));
        if (id.is_ascii_alphabetic() || id == '+') && !bar_follows {
            return Line::Field(id, strip_comment(&line[2..]));
        }
    }
    Line::Music(line)
}

/// Cuts a trailing `%` comment. `\%` is a literal percent sign.
fn strip_comment(text: &str) -> &str {
    let mut escaped = false;
    for (idx, c) in text.char_indices() {
        match c {
            '\\' => escaped = !escaped,
            '%' if !escaped => return &text[..idx],
            _ => escaped = false,
        }
    }
    text
}

fn first_content_line<'a>(lines: &[&'a str]) -> Option<Line<'a>> {
    lines
        .iter()
        .map(|l| classify(l))
        .find(|l| *l != Line::Comment)
}

fn starts_tune(lines: &[&str]) -> bool {
    matches!(first_content_line(lines), Some(Line::Field('X', _)))
}

fn has_fields(lines: &[&str]) -> bool {
    lines
        .iter()
        .any(|l| matches!(classify(l), Line::Field(..) | Line::Directive(_)))
}

fn free_text(lines: &[&str]) -> TextString {
    let text: Vec<&str> = lines
        .iter()
        .filter(|l| classify(l) != Line::Comment)
        .copied()
        .collect();
    TextString::new(&text.join("\n"))
}

fn push_warnings(diagnostics: &mut Vec<Diagnostic>, line_no: usize, warnings: Vec<DiagnosticKind>) {
    diagnostics.extend(warnings.into_iter().map(|w| Diagnostic::new(line_no, w)));
}

fn invalid_value(id: char, value: &str, err: anyhow::Error) -> DiagnosticKind {
    DiagnosticKind::InvalidFieldValue(id, value.trim().to_string(), err.to_string())
}

/// Re-reads `field` with `value` appended, for a `+:` line.
fn continue_field(
    field: &mut Field,
    value: &str,
    in_body: bool,
    warnings: &mut Vec<DiagnosticKind>,
) -> anyhow::Result<()> {
    let raw = format!("{} {}", field.raw.trim_end(), value.trim());
    let inline = field.inline;
    *field = parse_field(field.id, &raw, in_body, warnings)?;
    field.inline = inline;
    Ok(())
}

fn read_include(path: &str, options: &ParserOptions) -> Result<String, String> {
    let full = match &options.include_dir {
        Some(dir) => dir.join(path),
        None => PathBuf::from(path),
    };
    std::fs::read_to_string(&full).map_err(|e| e.to_string())
}

/// Reads a header line into `header`. Returns `false` for a music line,
/// which the header does not take.
fn read_header_line(
    line: &str,
    line_no: usize,
    header: &mut Header,
    options: &mut ParserOptions,
    diagnostics: &mut Vec<Diagnostic>,
    depth: usize,
) -> bool {
    let (id, value) = match classify(line) {
        Line::Comment => return true,
        Line::Music(_) => return false,
        Line::Directive(text) => ('I', text),
        Line::Field(id, value) => (id, value),
    };
    let mut warnings = Vec::new();

    if id == '+' {
        match header.fields.last_mut() {
            Some(field) => {
                if let Err(e) = continue_field(field, value, false, &mut warnings) {
                    warnings.push(invalid_value(field.id, value, e));
                }
            }
            None => warnings.push(DiagnosticKind::DanglingContinuation),
        }
        push_warnings(diagnostics, line_no, warnings);
        return true;
    }

    match parse_field(id, value, false, &mut warnings) {
        Ok(field) => {
            let instruction = field.instruction().cloned();
            header.push(field);
            if let Some(instruction) = instruction {
                options.apply(&instruction);
                if let Instruction::AbcInclude(path) = &instruction {
                    push_warnings(diagnostics, line_no, warnings);
                    include(path, line_no, header, options, diagnostics, depth);
                    return true;
                }
            }
        }
        Err(e) => warnings.push(invalid_value(id, value, e)),
    }
    push_warnings(diagnostics, line_no, warnings);
    true
}

/// Reads the header lines of an `abc-include` file. Every line is reported
/// at the directive's line.
fn include(
    path: &str,
    line_no: usize,
    header: &mut Header,
    options: &mut ParserOptions,
    diagnostics: &mut Vec<Diagnostic>,
    depth: usize,
) {
    let failed = |reason: String, diagnostics: &mut Vec<Diagnostic>| {
        log::warn!("Line #{}: cannot include \"{}\": {}", line_no, path, reason);
        diagnostics.push(Diagnostic::new(
            line_no,
            DiagnosticKind::IncludeFailed(path.to_string(), reason),
        ));
    };
    if depth >= MAX_INCLUDE_DEPTH {
        failed("includes nested too deeply".to_string(), diagnostics);
        return;
    }
    match read_include(path, options) {
        Ok(content) => {
            for included in content.lines().filter(|l| !l.trim().is_empty()) {
                read_header_line(included, line_no, header, options, diagnostics, depth + 1);
            }
        }
        Err(reason) => failed(reason, diagnostics),
    }
}

/// Which element a body `+:` line continues.
#[derive(Debug, Clone, Copy)]
enum Continuable {
    Lyrics,
    Symbols,
    Field(ElementId),
}

struct TuneReader {
    tune: Tune,
    options: ParserOptions,
    macros: MacroSet,
    in_body: bool,
    fragment: bool,
    last: Option<Continuable>,
}

impl TuneReader {
    fn new(header: Header, options: ParserOptions, fragment: bool) -> Self {
        Self {
            tune: Tune::new(header, options.clone()),
            options,
            macros: MacroSet::new(),
            in_body: false,
            fragment,
            last: None,
        }
    }

    fn read(mut self, start: usize, lines: &[&str]) -> Result<Tune, AbcError> {
        for (offset, line) in lines.iter().enumerate() {
            let line_no = start + offset;
            if self.fragment && line.trim().is_empty() {
                continue;
            }
            if let Err(e) = self.read_line(line, line_no) {
                if self.fragment {
                    return Err(e);
                }
                return Err(AbcError::InTune {
                    refnum: self.tune.refnum,
                    source: Box::new(e),
                });
            }
        }
        if !self.in_body {
            self.start_body();
        }

        let mut tune = self.tune;
        log::debug!(
            "Tune X:{}: {} elements, {} diagnostics",
            tune.refnum,
            tune.items.len(),
            tune.diagnostics.len()
        );
        transforms::postprocess(&mut tune);
        Ok(tune)
    }

    fn read_line(&mut self, line: &str, line_no: usize) -> Result<(), AbcError> {
        if self.in_body {
            return self.read_body_line(line, line_no);
        }
        match classify(line) {
            Line::Field('X', value) => {
                self.read_refnum(value, line_no);
                Ok(())
            }
            Line::Field('K', _) => {
                self.header_line(line, line_no);
                self.start_body();
                Ok(())
            }
            Line::Music(_) => {
                if !self.fragment {
                    self.tune.diagnose(line_no, DiagnosticKind::MissingKey);
                }
                self.start_body();
                self.read_body_line(line, line_no)
            }
            _ => {
                self.header_line(line, line_no);
                Ok(())
            }
        }
    }

    fn header_line(&mut self, line: &str, line_no: usize) {
        read_header_line(
            line,
            line_no,
            &mut self.tune.header,
            &mut self.options,
            &mut self.tune.diagnostics,
            0,
        );
    }

    fn read_refnum(&mut self, value: &str, line_no: usize) {
        if self.tune.header.refnum().is_some() {
            self.tune.diagnose(line_no, DiagnosticKind::DuplicateRefNumber);
            return;
        }
        match parse_field('X', value, false, &mut Vec::new()) {
            Ok(field) => {
                if let FieldValue::RefNumber(n) = field.value {
                    self.tune.refnum = n;
                }
                self.tune.header.push(field);
            }
            Err(_) => self.tune.diagnose(
                line_no,
                DiagnosticKind::InvalidRefNumber(value.trim().to_string()),
            ),
        }
    }

    fn start_body(&mut self) {
        self.in_body = true;
        self.tune.options = self.options.clone();
        for (target, replacement) in self.tune.header.macros() {
            if let Err(e) = self.macros.define(&target, &replacement) {
                log::warn!("Ignoring macro \"{}\": {}", target, e);
            }
        }
    }

    fn read_body_line(&mut self, line: &str, line_no: usize) -> Result<(), AbcError> {
        match classify(line) {
            Line::Comment => {}
            Line::Directive(text) => self.body_field('I', text, line_no),
            Line::Field('+', value) => self.continuation(value, line_no)?,
            Line::Field('w', value) => {
                let tokens = parse_lyrics(value);
                self.tune.push(
                    Element::LyricsLine(LyricsLine {
                        tokens,
                        continuation: false,
                    }),
                    line_no,
                );
                self.last = Some(Continuable::Lyrics);
            }
            Line::Field('s', value) => {
                let tokens = self.symbols(value, line_no)?;
                self.tune.push(
                    Element::SymbolLine(SymbolLine {
                        tokens,
                        continuation: false,
                    }),
                    line_no,
                );
                self.last = Some(Continuable::Symbols);
            }
            Line::Field(id, value) => self.body_field(id, value, line_no),
            Line::Music(text) => {
                let expanded = self.macros.expand(text);
                let music = parse_music_line(&expanded, line_no, &mut self.options)?;
                log::trace!("Line #{}: {} elements", line_no, music.elements.len());
                for element in music.elements {
                    self.tune.push(element, line_no);
                }
                push_warnings(&mut self.tune.diagnostics, line_no, music.warnings);
                self.last = None;
            }
        }
        Ok(())
    }

    fn symbols(
        &self,
        value: &str,
        line_no: usize,
    ) -> Result<Vec<AlignToken<Embellishment>>, AbcError> {
        parse_symbols(value, self.options.decoration_delimiter)
            .map_err(|e| AbcError::syntax(line_no, 3, e.to_string()))
    }

    fn body_field(&mut self, id: char, value: &str, line_no: usize) {
        if !allowed_in_body(id) {
            self.tune
                .diagnose(line_no, DiagnosticKind::FieldNotAllowed(id, "tune body"));
            return;
        }
        let mut warnings = Vec::new();
        match parse_field(id, value, true, &mut warnings) {
            Ok(field) => {
                if let Some(instruction) = field.instruction() {
                    self.options.apply(instruction);
                }
                if let FieldValue::Macro {
                    target,
                    replacement,
                } = &field.value
                {
                    if let Err(e) = self.macros.define(target, replacement) {
                        warnings.push(invalid_value(id, value, e));
                    }
                }
                let element = self.tune.push(Element::Field(field), line_no);
                self.last = Some(Continuable::Field(element));
            }
            Err(e) => warnings.push(invalid_value(id, value, e)),
        }
        push_warnings(&mut self.tune.diagnostics, line_no, warnings);
    }

    fn continuation(&mut self, value: &str, line_no: usize) -> Result<(), AbcError> {
        match self.last {
            Some(Continuable::Lyrics) => {
                self.tune.push(
                    Element::LyricsLine(LyricsLine {
                        tokens: parse_lyrics(value),
                        continuation: true,
                    }),
                    line_no,
                );
            }
            Some(Continuable::Symbols) => {
                let tokens = self.symbols(value, line_no)?;
                self.tune.push(
                    Element::SymbolLine(SymbolLine {
                        tokens,
                        continuation: true,
                    }),
                    line_no,
                );
            }
            Some(Continuable::Field(id)) => {
                let mut warnings = Vec::new();
                if let Element::Field(field) = &mut self.tune.items[id].element {
                    if let Err(e) = continue_field(field, value, true, &mut warnings) {
                        warnings.push(invalid_value(field.id, value, e));
                    }
                }
                push_warnings(&mut self.tune.diagnostics, line_no, warnings);
            }
            None => self
                .tune
                .diagnose(line_no, DiagnosticKind::DanglingContinuation),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LineBreakSet;
    use crate::types::key::Tonic;
    use pretty_assertions::assert_eq;

    fn kinds(diagnostics: &[Diagnostic]) -> Vec<DiagnosticKind> {
        diagnostics.iter().map(|d| d.kind.clone()).collect()
    }

    #[test]
    fn test_sections() {
        let text = "\
%abc-2.1
C:Trad
M:6/8

Some words about the tunes.

X:1
T:First
K:G
GAB|

%%begintext
Notes

for players
%%endtext

X:2
T:Second
K:D
DEF|
";
        let book = parse(text).unwrap();
        assert_eq!(book.tunes().len(), 2);
        assert_eq!(book.sections().len(), 4);
        assert!(matches!(&book.sections()[0], Section::FreeText(t) if t.as_str() == "Some words about the tunes."));
        assert_eq!(book.sections()[1], Section::Tune(0));
        assert_eq!(
            book.sections()[2],
            Section::TypesetText("Notes\n\nfor players".to_string())
        );
        assert_eq!(book.sections()[3], Section::Tune(1));

        // file header fields are inherited by every tune
        let second = book.tune(2).unwrap();
        assert_eq!(second.title().as_deref(), Some("Second"));
        assert_eq!(second.composers(), vec!["Trad"]);
        assert_eq!(second.meter().to_string(), "6/8");
        assert_eq!(book.header().text('C').as_deref(), Some("Trad"));
    }

    #[test]
    fn test_header_diagnostics() {
        let tune = parse("X:1\nX:2\nT:T\nK:C\nabc|\nA:Author\n").unwrap();
        let tune = &tune.tunes()[0];
        assert_eq!(tune.refnum, 1);
        assert_eq!(
            kinds(&tune.diagnostics),
            vec![
                DiagnosticKind::DuplicateRefNumber,
                DiagnosticKind::FieldNotAllowed('A', "tune body"),
            ]
        );
        assert_eq!(tune.diagnostics[1].line, 6);

        let book = parse("X:one\nK:C\nabc\n").unwrap();
        assert_eq!(
            kinds(&book.tunes()[0].diagnostics),
            vec![DiagnosticKind::InvalidRefNumber("one".to_string())]
        );
    }

    #[test]
    fn test_missing_key() {
        let book = parse("X:1\nT:T\nabc|\n").unwrap();
        let tune = &book.tunes()[0];
        assert_eq!(kinds(&tune.diagnostics), vec![DiagnosticKind::MissingKey]);
        assert_eq!(tune.notes().len(), 3);

        // fragments need no header at all
        let tune = parse_fragment("abc|").unwrap();
        assert!(tune.diagnostics.is_empty());
        assert_eq!(tune.refnum, 1);
        assert_eq!(tune.title(), None);
        assert_eq!(tune.key().tonic, Tonic::None);
        assert_eq!(tune.clef().to_string(), "treble");
    }

    #[test]
    fn test_syntax_error_is_fatal() {
        let err = parse("X:1\nK:C\nab\n\nX:7\nK:C\nab #|\n").unwrap_err();
        assert_eq!(
            err,
            AbcError::InTune {
                refnum: 7,
                source: Box::new(AbcError::syntax(7, 4, "Unexpected character '#'")),
            }
        );
        assert_eq!(err.line(), 7);
        assert!(parse_fragment("ab #").is_err());
    }

    #[test]
    fn test_directive_is_instruction() {
        let a = parse("X:1\n%%linebreak $\nK:C\nab\n").unwrap();
        let b = parse("X:1\nI:linebreak $\nK:C\nab\n").unwrap();
        let expected = LineBreakSet {
            eol: false,
            dollar: true,
            bang: false,
        };
        assert_eq!(a.tunes()[0].options.linebreaks, expected);
        assert_eq!(b.tunes()[0].options.linebreaks, expected);
        assert_eq!(a.tunes()[0].header.instructions(), b.tunes()[0].header.instructions());
    }

    #[test]
    fn test_field_continuation() {
        let book = parse("X:1\nT:Part one\n+:and two\nK:C\nabc\nw:la la\n+:la\n").unwrap();
        let tune = &book.tunes()[0];
        assert_eq!(tune.title().as_deref(), Some("Part one and two"));
        let lines: Vec<bool> = tune
            .items
            .iter()
            .filter_map(|i| match &i.element {
                Element::LyricsLine(l) => Some(l.continuation),
                _ => None,
            })
            .collect();
        assert_eq!(lines, vec![false, true]);

        let book = parse("X:1\nK:C\nabc\n+:def\n").unwrap();
        assert_eq!(
            kinds(&book.tunes()[0].diagnostics),
            vec![DiagnosticKind::DanglingContinuation]
        );
    }

    #[test]
    fn test_comments() {
        let book = parse("X:1\nT:Title % a comment\n% whole line\nK:C\nab % trailing\n").unwrap();
        let tune = &book.tunes()[0];
        assert_eq!(tune.title().as_deref(), Some("Title"));
        assert_eq!(tune.notes().len(), 2);
    }

    #[test]
    fn test_macros_expand_body() {
        let book = parse("X:1\nm:~G3 = G{A}G{F}G\nK:G\n~G3 B|\n").unwrap();
        let tune = &book.tunes()[0];
        let letters: String = tune.notes().iter().map(|n| n.pitch.note).collect();
        assert_eq!(letters, "GGGB");
    }

    #[test]
    fn test_include() {
        let dir = std::env::temp_dir().join("abc-tunes-include-test");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("common.abh"), "C:From include\nM:3/4\n").unwrap();
        let options = ParserOptions {
            include_dir: Some(dir),
            ..ParserOptions::default()
        };
        let parser = Parser::with_options(options);

        let book = parser
            .parse("X:1\n%%abc-include common.abh\nK:C\nabc\n")
            .unwrap();
        let tune = &book.tunes()[0];
        assert_eq!(tune.composers(), vec!["From include"]);
        assert_eq!(tune.meter().to_string(), "3/4");

        let book = parser.parse("X:1\n%%abc-include missing.abh\nK:C\nabc\n").unwrap();
        let tune = &book.tunes()[0];
        assert!(matches!(
            &tune.diagnostics[0].kind,
            DiagnosticKind::IncludeFailed(path, _) if path == "missing.abh"
        ));
        assert_eq!(tune.notes().len(), 3);
    }

    #[test]
    fn test_bar_after_letter_is_music() {
        assert_eq!(classify("A:|B"), Line::Music("A:|B"));
        assert_eq!(classify("T:Title"), Line::Field('T', "Title"));
        assert_eq!(classify("%%score 1 2"), Line::Directive("score 1 2"));
        assert_eq!(strip_comment("50\\% off % note"), "50\\% off ");
    }
}
