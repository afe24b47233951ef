use crate::config::ParserOptions;
use crate::error::{AbcError, DiagnosticKind};
use crate::field_parser::{is_user_symbol, parse_field};
use crate::types::duration::{Duration, checked_mul, parse_multiplier};
use crate::types::element::{
    BarLine, BrokenDirection, BrokenRhythm, Chord, Element, LineBreakMarker, LineBreakSymbol,
    MeasureRest, Note, OverlayMarker, Rest, SlurKind, SlurMarker, Spacer, TieMarker,
    VariantEnding,
};
use crate::types::field::allowed_inline;
use crate::types::pitch::{Pitch, parse_accidental};
use crate::types::unit::{Decoration, Embellishment, GraceNotes, TupletMarker, UnitState};
use anyhow::{Result, anyhow, bail};

/// Elements read from one music line.
#[derive(Debug, Default)]
pub struct MusicLine {
    pub elements: Vec<Element>,
    pub warnings: Vec<DiagnosticKind>,
    /// The line ended with `\`: the next music line continues it.
    pub continued: bool,
}

/// Tokenizes one music line. Inline I: fields update `options` for the
/// rest of the line and the lines after it.
pub fn parse_music_line(
    line: &str,
    line_no: usize,
    options: &mut ParserOptions,
) -> Result<MusicLine, AbcError> {
    let mut lexer = Lexer::new(line, options);
    match lexer.run() {
        Ok(()) => Ok(lexer.finish()),
        Err(e) => Err(AbcError::syntax(line_no, lexer.pos + 1, e.to_string())),
    }
}

struct Lexer<'a> {
    chars: Vec<char>,
    pos: usize,
    options: &'a mut ParserOptions,
    out: MusicLine,
    /// Embellishments waiting for the unit or bar line they precede.
    pending: Vec<Embellishment>,
    grace: Option<GraceNotes>,
}

impl<'a> Lexer<'a> {
    fn new(line: &str, options: &'a mut ParserOptions) -> Self {
        Self {
            chars: line.chars().collect(),
            pos: 0,
            options,
            out: MusicLine::default(),
            pending: Vec::new(),
            grace: None,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let mut s = String::new();
        while let Some(c) = self.peek().filter(|c| pred(*c)) {
            s.push(c);
            self.pos += 1;
        }
        s
    }

    fn rest_of_line(&self) -> String {
        self.chars[self.pos..].iter().collect()
    }

    fn run(&mut self) -> Result<()> {
        while let Some(c) = self.peek() {
            match c {
                ' ' | '\t' => {
                    self.take_while(|c| c == ' ' || c == '\t');
                    let after_space = matches!(self.out.elements.last(), Some(Element::Space));
                    if !self.out.elements.is_empty() && !after_space {
                        self.out.elements.push(Element::Space);
                    }
                }
                '%' => break,
                '\\' => {
                    self.bump();
                    let rest = self.rest_of_line();
                    let rest = rest.trim_start();
                    if rest.is_empty() || rest.starts_with('%') {
                        self.out.continued = true;
                        break;
                    }
                    bail!("Unexpected '\\'");
                }
                '`' => {
                    self.bump();
                }
                '"' => {
                    self.bump();
                    let text = self.read_quoted()?;
                    self.pending.push(Embellishment::from_quoted(&text));
                }
                '!' if self.options.bang_is_linebreak() => {
                    self.bump();
                    self.push_break(LineBreakSymbol::Bang);
                }
                c if c == self.options.decoration_delimiter => {
                    self.bump();
                    let decoration = self.read_decoration(c)?;
                    self.pending.push(Embellishment::Decoration(decoration));
                }
                '.' => {
                    self.bump();
                    match self.peek() {
                        Some('|') => self.read_bar(".".to_string())?,
                        Some('(') => {
                            self.bump();
                            self.out.elements.push(Element::Slur(SlurMarker {
                                kind: SlurKind::Start,
                                dotted: true,
                            }));
                        }
                        Some('-') => {
                            self.bump();
                            self.out
                                .elements
                                .push(Element::Tie(TieMarker { dotted: true }));
                        }
                        _ => self
                            .pending
                            .push(Embellishment::Decoration(Decoration::shorthand('.'))),
                    }
                }
                c if is_user_symbol(c) => {
                    self.bump();
                    self.pending
                        .push(Embellishment::Decoration(Decoration::shorthand(c)));
                }
                '{' => {
                    self.bump();
                    let group = self.read_grace()?;
                    match self.grace.as_mut() {
                        Some(existing) => existing.items.extend(group.items),
                        None => self.grace = Some(group),
                    }
                }
                '(' => {
                    self.bump();
                    if self.peek().is_some_and(|c| c.is_ascii_digit()) {
                        let tuplet = self.read_tuplet()?;
                        self.out.elements.push(Element::Tuplet(tuplet));
                    } else {
                        self.out.elements.push(Element::Slur(SlurMarker {
                            kind: SlurKind::Start,
                            dotted: false,
                        }));
                    }
                }
                ')' => {
                    self.bump();
                    self.flush_pending();
                    self.out.elements.push(Element::Slur(SlurMarker {
                        kind: SlurKind::End,
                        dotted: false,
                    }));
                }
                '-' => {
                    self.bump();
                    self.out
                        .elements
                        .push(Element::Tie(TieMarker { dotted: false }));
                }
                '>' | '<' => {
                    let marker = self.read_broken_rhythm()?;
                    self.out.elements.push(Element::BrokenRhythm(marker));
                }
                '[' => self.read_bracket()?,
                '|' | ':' => self.read_bar(String::new())?,
                'y' => {
                    self.bump();
                    let specified_length = self.read_length()?;
                    self.out
                        .elements
                        .push(Element::Spacer(Spacer { specified_length }));
                }
                '&' => {
                    let count = self.take_while(|c| c == '&').len();
                    self.flush_pending();
                    self.out
                        .elements
                        .push(Element::Overlay(OverlayMarker { count }));
                }
                '$' => {
                    self.bump();
                    if self.options.linebreaks.dollar {
                        self.push_break(LineBreakSymbol::Dollar);
                    }
                }
                'z' | 'x' => {
                    self.bump();
                    let length = self.read_length()?;
                    let rest = Rest {
                        invisible: c == 'x',
                        unit: UnitState::new(length),
                    };
                    self.push_unit(Element::Rest(rest));
                }
                'Z' | 'X' => {
                    self.bump();
                    let digits = self.take_while(|c| c.is_ascii_digit());
                    let measures: u32 = if digits.is_empty() {
                        1
                    } else {
                        digits
                            .parse()
                            .map_err(|_| anyhow!("Invalid measure count \"{}\"", digits))?
                    };
                    if measures == 0 {
                        bail!("Zero measure count");
                    }
                    let rest = MeasureRest {
                        invisible: c == 'X',
                        measures,
                        unit: UnitState::new(Duration::from_integer(measures as i64)),
                    };
                    self.push_unit(Element::MeasureRest(rest));
                }
                '^' | '_' | '=' | 'A'..='G' | 'a'..='g' => {
                    let note = self.read_note()?;
                    self.push_unit(Element::Note(note));
                }
                _ => bail!("Unexpected character '{}'", c),
            }
        }
        Ok(())
    }

    fn finish(mut self) -> MusicLine {
        self.flush_pending();
        if self.grace.take().is_some() {
            self.out.warnings.push(DiagnosticKind::DanglingGraceNotes);
        }
        if !self.out.continued {
            if self.options.linebreaks.eol {
                self.out.elements.push(Element::LineBreak(LineBreakMarker {
                    symbol: LineBreakSymbol::EndOfLine,
                }));
            } else if !matches!(self.out.elements.last(), Some(Element::Space)) {
                self.out.elements.push(Element::Space);
            }
        }
        self.out
    }

    /// Moves waiting embellishments and grace notes onto a unit.
    fn push_unit(&mut self, mut element: Element) {
        if let Some(unit) = element.as_unit_mut() {
            let state = unit.unit_mut();
            state.embellishments.append(&mut self.pending);
            state.grace_notes = self.grace.take();
        }
        self.out.elements.push(element);
    }

    /// Embellishments with nothing to attach to stand on their own.
    fn flush_pending(&mut self) {
        for embellishment in self.pending.drain(..) {
            self.out.elements.push(match embellishment {
                Embellishment::Decoration(d) => Element::Decoration(d),
                Embellishment::Annotation(a) => Element::Annotation(a),
                Embellishment::ChordSymbol(c) => Element::ChordSymbol(c),
            });
        }
    }

    fn push_break(&mut self, symbol: LineBreakSymbol) {
        self.flush_pending();
        self.out
            .elements
            .push(Element::LineBreak(LineBreakMarker { symbol }));
    }

    fn read_length(&mut self) -> Result<Duration> {
        let text = self.take_while(|c| c.is_ascii_digit() || c == '/');
        parse_multiplier(&text)
    }

    fn read_quoted(&mut self) -> Result<String> {
        let mut text = String::new();
        loop {
            match self.bump() {
                None => bail!("Unterminated string \"{}\"", text),
                Some('"') => return Ok(text),
                Some('\\') => {
                    text.push('\\');
                    if let Some(next) = self.bump() {
                        text.push(next);
                    }
                }
                Some(c) => text.push(c),
            }
        }
    }

    fn read_decoration(&mut self, delimiter: char) -> Result<Decoration> {
        let name = self.take_while(|c| c != delimiter);
        if !self.eat(delimiter) {
            bail!("Unterminated decoration \"{}{}\"", delimiter, name);
        }
        if name.is_empty() {
            bail!("Empty decoration");
        }
        Ok(Decoration::named(&name))
    }

    fn read_note(&mut self) -> Result<Note> {
        let accidental_text = match self.peek() {
            Some('=') => {
                self.bump();
                "=".to_string()
            }
            Some(c @ ('^' | '_')) => {
                let mut s = String::new();
                s.push(c);
                self.bump();
                if self.eat(c) {
                    s.push(c);
                }
                s
            }
            _ => String::new(),
        };
        let accidental = if accidental_text.is_empty() {
            None
        } else {
            parse_accidental(&accidental_text)
        };

        let letter = match self.bump() {
            Some(c @ ('A'..='G' | 'a'..='g')) => c,
            _ => bail!("Expected note after accidental \"{}\"", accidental_text),
        };
        let marks = self.take_while(|c| c == ',' || c == '\'');
        let length = self.read_length()?;
        Ok(Note::new(Pitch::from_letter(letter, &marks, accidental), length))
    }

    /// Reads chord members after the opening `[`.
    fn read_chord(&mut self) -> Result<Chord> {
        let mut notes: Vec<Note> = Vec::new();
        let mut embellishments = Vec::new();
        loop {
            match self.peek() {
                None => bail!("Unterminated chord"),
                Some(']') => {
                    self.bump();
                    break;
                }
                Some(' ') | Some('\t') => {
                    self.bump();
                }
                Some('"') => {
                    self.bump();
                    let text = self.read_quoted()?;
                    embellishments.push(Embellishment::from_quoted(&text));
                }
                Some(d) if d == self.options.decoration_delimiter => {
                    self.bump();
                    embellishments.push(Embellishment::Decoration(self.read_decoration(d)?));
                }
                Some('-') => {
                    self.bump();
                    if let Some(last) = notes.last_mut() {
                        last.unit.tied_right = true;
                    }
                }
                Some('.') if self.peek_at(1) == Some('-') => {
                    self.pos += 2;
                    if let Some(last) = notes.last_mut() {
                        last.unit.tied_right = true;
                        last.unit.tied_right_dotted = true;
                    }
                }
                Some('^' | '_' | '=' | 'A'..='G' | 'a'..='g') => notes.push(self.read_note()?),
                Some(c) => bail!("Unexpected character '{}' in chord", c),
            }
        }
        let Some(first) = notes.first() else {
            bail!("Empty chord");
        };
        let length = checked_mul(first.unit.specified_length, self.read_length()?)
            .ok_or_else(|| anyhow!("Chord length is out of range"))?;
        let mut unit = UnitState::new(length);
        unit.embellishments = embellishments;
        Ok(Chord { notes, unit })
    }

    /// Reads a grace-note group after the opening `{`.
    fn read_grace(&mut self) -> Result<GraceNotes> {
        let acciaccatura = self.eat('/');
        let mut items = Vec::new();
        loop {
            match self.peek() {
                None => bail!("Unterminated grace notes"),
                Some('}') => {
                    self.bump();
                    break;
                }
                Some(' ') | Some('\t') => {
                    self.bump();
                }
                Some('[') => {
                    self.bump();
                    items.push(Element::Chord(self.read_chord()?));
                }
                Some('>' | '<') => items.push(Element::BrokenRhythm(self.read_broken_rhythm()?)),
                Some('^' | '_' | '=' | 'A'..='G' | 'a'..='g') => {
                    items.push(Element::Note(self.read_note()?))
                }
                Some(c) => bail!("Unexpected character '{}' in grace notes", c),
            }
        }
        Ok(GraceNotes {
            acciaccatura,
            items,
        })
    }

    /// Reads `p[:q[:r]]` after the opening `(`.
    fn read_tuplet(&mut self) -> Result<TupletMarker> {
        let number = |s: String| -> Result<Option<u32>> {
            if s.is_empty() {
                Ok(None)
            } else {
                let n: u32 = s.parse().map_err(|_| anyhow!("Invalid tuplet \"{}\"", s))?;
                if n == 0 {
                    bail!("Zero in tuplet");
                }
                Ok(Some(n))
            }
        };
        let p = number(self.take_while(|c| c.is_ascii_digit()))?
            .ok_or_else(|| anyhow!("Missing tuplet size"))?;
        let mut q = None;
        let mut r = None;
        if self.eat(':') {
            q = number(self.take_while(|c| c.is_ascii_digit()))?;
            if self.eat(':') {
                r = number(self.take_while(|c| c.is_ascii_digit()))?;
            }
        }
        Ok(TupletMarker { p, q, r })
    }

    fn read_broken_rhythm(&mut self) -> Result<BrokenRhythm> {
        let Some(c) = self.peek() else {
            bail!("Expected broken rhythm");
        };
        let count = self.take_while(|x| x == c).len() as u32;
        if matches!(self.peek(), Some('>' | '<')) {
            bail!("Mixed broken rhythm markers");
        }
        let direction = if c == '>' {
            BrokenDirection::Dotted
        } else {
            BrokenDirection::Snapped
        };
        Ok(BrokenRhythm { direction, count })
    }

    fn read_bracket(&mut self) -> Result<()> {
        match (self.peek_at(1), self.peek_at(2)) {
            (Some(id), Some(':')) if id.is_ascii_alphabetic() => self.read_inline_field(),
            (Some('|'), _) | (Some(']'), _) => {
                self.bump();
                self.read_bar("[".to_string())
            }
            (Some(d), _) if d.is_ascii_digit() => {
                self.bump();
                self.read_variant()
            }
            _ => {
                self.bump();
                let chord = self.read_chord()?;
                self.push_unit(Element::Chord(chord));
                Ok(())
            }
        }
    }

    fn read_bar(&mut self, prefix: String) -> Result<()> {
        let mut text = prefix;
        text.push_str(&self.take_while(|c| c == '|' || c == ':'));
        if (text.ends_with('|') || text == "[") && self.eat(']') {
            text.push(']');
        }
        let mut bar =
            BarLine::parse(&text).ok_or_else(|| anyhow!("Invalid bar line \"{}\"", text))?;
        bar.embellishments.append(&mut self.pending);
        self.out.elements.push(Element::BarLine(bar));
        if self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.read_variant()?;
        }
        Ok(())
    }

    fn read_variant(&mut self) -> Result<()> {
        let text = self.take_while(|c| c.is_ascii_digit() || c == ',' || c == '-');
        let ending = VariantEnding::parse(&text)
            .ok_or_else(|| anyhow!("Invalid variant ending \"{}\"", text))?;
        self.flush_pending();
        self.out.elements.push(Element::VariantEnding(ending));
        Ok(())
    }

    fn read_inline_field(&mut self) -> Result<()> {
        self.bump();
        let id = self.bump().ok_or_else(|| anyhow!("Unterminated inline field"))?;
        self.bump();
        let value = self.take_while(|c| c != ']');
        if !self.eat(']') {
            bail!("Unterminated inline field [{}:{}", id, value);
        }
        if !allowed_inline(id) {
            self.out
                .warnings
                .push(DiagnosticKind::FieldNotAllowed(id, "inline field"));
            return Ok(());
        }
        match parse_field(id, &value, true, &mut self.out.warnings) {
            Ok(mut field) => {
                field.inline = true;
                if let Some(instruction) = field.instruction() {
                    self.options.apply(instruction);
                }
                self.flush_pending();
                self.out.elements.push(Element::Field(field));
            }
            Err(e) => self.out.warnings.push(DiagnosticKind::InvalidFieldValue(
                id,
                value.trim().to_string(),
                e.to_string(),
            )),
        }
        Ok(())
    }
}
