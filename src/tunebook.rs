use crate::error::Diagnostic;
use crate::tune::Tune;
use crate::types::header::Header;
use crate::types::text::TextString;
use serde::Serialize;
use std::rc::Rc;

/// A blank-line separated block of the tunebook, in file order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Section {
    /// Index into `Tunebook::tunes`.
    Tune(usize),
    FreeText(TextString),
    /// Contents of a `%%begintext` ... `%%endtext` block.
    TypesetText(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct Tunebook {
    /// File header, shared as the master of every tune header.
    pub header: Rc<Header>,
    pub tunes: Vec<Tune>,
    pub sections: Vec<Section>,
    /// Diagnostics from the file header and free text. Each tune carries
    /// its own.
    pub diagnostics: Vec<Diagnostic>,
}

impl Tunebook {
    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn tunes(&self) -> &[Tune] {
        &self.tunes
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn tune(&self, refnum: u32) -> Option<&Tune> {
        self.tunes.iter().find(|t| t.refnum == refnum)
    }

    pub fn all_diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .chain(self.tunes.iter().flat_map(|t| t.diagnostics.iter()))
    }
}
