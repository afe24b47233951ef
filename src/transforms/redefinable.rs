use crate::error::DiagnosticKind;
use crate::tune::Tune;
use crate::types::element::Element;
use crate::types::field::FieldValue;
use crate::types::unit::{Decoration, Embellishment, is_known_decoration};
use once_cell::sync::Lazy;
use std::collections::BTreeMap;

/// Symbol table before any U: field.
static DEFAULT_SYMBOLS: Lazy<BTreeMap<char, &'static str>> = Lazy::new(|| {
    BTreeMap::from([
        ('.', "staccato"),
        ('~', "roll"),
        ('H', "fermata"),
        ('L', "accent"),
        ('M', "lowermordent"),
        ('O', "coda"),
        ('P', "uppermordent"),
        ('S', "segno"),
        ('T', "trill"),
        ('u', "upbow"),
        ('v', "downbow"),
    ])
});

type SymbolTable = BTreeMap<char, Option<String>>;

struct Resolver {
    table: SymbolTable,
    unknown: Vec<String>,
}

impl Resolver {
    /// Fills in the decoration's name. Returns false when the symbol stands
    /// for no decoration.
    fn resolve(&mut self, decoration: &mut Decoration) -> bool {
        if let (Some(symbol), true) = (decoration.shorthand, decoration.name.is_empty()) {
            match self.table.get(&symbol) {
                Some(Some(name)) => decoration.name = name.clone(),
                Some(None) => return false,
                None => {
                    log::warn!("Symbol '{}' is not defined", symbol);
                    return false;
                }
            }
        }
        if !is_known_decoration(&decoration.name) && !self.unknown.contains(&decoration.name) {
            self.unknown.push(decoration.name.clone());
        }
        true
    }

    fn resolve_all(&mut self, embellishments: &mut Vec<Embellishment>) {
        embellishments.retain_mut(|e| match e {
            Embellishment::Decoration(d) => self.resolve(d),
            _ => true,
        });
    }

    fn resolve_element(&mut self, element: &mut Element) {
        match element {
            Element::BarLine(bar) => self.resolve_all(&mut bar.embellishments),
            Element::Decoration(decoration) => {
                if !self.resolve(decoration) {
                    decoration.name.clear();
                }
            }
            _ => {
                let Some(unit) = element.as_unit_mut() else {
                    return;
                };
                let state = unit.unit_mut();
                self.resolve_all(&mut state.embellishments);
                if let Some(grace) = state.grace_notes.as_mut() {
                    for item in grace.items.iter_mut() {
                        self.resolve_element(item);
                    }
                }
            }
        }
    }
}

/// Replaces shorthand decoration symbols with the decorations they stand
/// for. Header U: fields apply to the whole tune, body U: fields from where
/// they appear.
pub fn transform(tune: &mut Tune) {
    let mut table: SymbolTable = DEFAULT_SYMBOLS
        .iter()
        .map(|(symbol, name)| (*symbol, Some(name.to_string())))
        .collect();
    table.extend(tune.header.user_symbols());

    let mut resolver = Resolver {
        table,
        unknown: Vec::new(),
    };
    let mut diagnostics = Vec::new();

    for item in tune.items.iter_mut() {
        if let Element::Field(field) = &item.element {
            if let FieldValue::UserSymbol { symbol, decoration } = &field.value {
                resolver.table.insert(*symbol, decoration.clone());
            }
            continue;
        }
        resolver.resolve_element(&mut item.element);
        for name in resolver.unknown.drain(..) {
            log::warn!("Unknown decoration \"{}\" on line {}", name, item.line);
            diagnostics.push((item.line, DiagnosticKind::UnknownDecoration(name)));
        }
    }

    for (line, kind) in diagnostics {
        tune.diagnose(line, kind);
    }
}

#[cfg(test)]
mod tests {
    use crate::error::DiagnosticKind;
    use crate::tune::Tune;
    use crate::types::element::Element;
    use crate::types::unit::Embellishment;
    use crate::util::parse_tune;
    use pretty_assertions::assert_eq;

    fn decorations(tune: &Tune) -> Vec<Vec<String>> {
        tune.items
            .iter()
            .filter_map(|i| i.element.as_unit())
            .map(|u| u.unit().decorations().map(|d| d.name.clone()).collect())
            .collect()
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_default_symbols() {
        let tune = parse_tune("X:1\nK:C\nTA .B ~c uHd\n");
        assert_eq!(
            decorations(&tune),
            vec![
                names(&["trill"]),
                names(&["staccato"]),
                names(&["roll"]),
                names(&["upbow", "fermata"]),
            ]
        );
    }

    #[test]
    fn test_header_and_body_redefinition() {
        let tune = parse_tune("X:1\nU:T=!fermata!\nK:C\nTA\nU:T=!accent!\nTB\n");
        assert_eq!(
            decorations(&tune),
            vec![names(&["fermata"]), names(&["accent"])]
        );
    }

    #[test]
    fn test_file_header_symbols() {
        let book = crate::parse("U:W=!coda!\n\nX:1\nK:C\nWA\n\nX:2\nU:W=!segno!\nK:C\nWA\n").unwrap();
        assert_eq!(decorations(&book.tunes[0]), vec![names(&["coda"])]);
        assert_eq!(decorations(&book.tunes[1]), vec![names(&["segno"])]);
    }

    #[test]
    fn test_removed_and_undefined_symbols() {
        let tune = parse_tune("X:1\nU:T=!nil!\nK:C\nTA WB !trill!c\n");
        assert_eq!(
            decorations(&tune),
            vec![names(&[]), names(&[]), names(&["trill"])]
        );
    }

    #[test]
    fn test_bar_and_standalone_decorations() {
        let tune = parse_tune("X:1\nU:W=!nil!\nK:C\nA T| B W\n");
        let bar = tune
            .items
            .iter()
            .find_map(|i| i.element.as_bar_line())
            .unwrap();
        let bar_names: Vec<String> = bar
            .embellishments
            .iter()
            .filter_map(|e| match e {
                Embellishment::Decoration(d) => Some(d.name.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(bar_names, names(&["trill"]));
        let standalone: Vec<String> = tune
            .items
            .iter()
            .filter_map(|i| match &i.element {
                Element::Decoration(d) => Some(d.name.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(standalone, names(&[""]));
    }

    #[test]
    fn test_unknown_decoration() {
        let tune = parse_tune("X:1\nK:C\n!wobble!A\n");
        assert_eq!(decorations(&tune), vec![names(&["wobble"])]);
        assert!(
            tune.diagnostics
                .iter()
                .any(|d| d.kind == DiagnosticKind::UnknownDecoration("wobble".to_string()))
        );
    }
}
