use std::collections::BTreeMap;

use scraper::{Html, Selector};
use tracing::warn;

use super::sections::section_siblings;
use super::tables::{cell_text, flatten_rows, parse_table};

pub const UNKNOWN_MODE: &str = "unknownMode";

/// Map an exceptions header ("Protected Mode Exceptions", "SIMD Floating-Point
/// Exceptions", ...) to a camelCase mode key.
pub fn mode_key(text: &str, known: &[(String, String)]) -> String {
    let text = text.trim();
    if let Some((_, key)) = known.iter().find(|(needle, _)| text.contains(needle.as_str())) {
        return key.clone();
    }

    let stem = text.strip_suffix("Exceptions").unwrap_or(text);
    let mut words = stem.split_whitespace();
    let Some(first) = words.next() else {
        return UNKNOWN_MODE.to_string();
    };
    let mut key = first.to_lowercase();
    for word in words {
        key.push_str(&title_case(&word.to_lowercase()));
    }
    key
}

// Upper-cases every letter that follows a separator, so "floating-point"
// becomes "Floating-Point".
fn title_case(word: &str) -> String {
    let mut out = String::with_capacity(word.len());
    let mut at_boundary = true;
    for c in word.chars() {
        if at_boundary {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        at_boundary = !(c.is_alphanumeric() || c == '_');
    }
    out
}

/// Collect paragraphs and flattened tables under every exceptions header,
/// grouped by mode key. A mode key seen twice on one page keeps both blocks
/// in document order.
pub fn collect(
    doc: &Html,
    headers: &Selector,
    known: &[(String, String)],
    page: &str,
) -> BTreeMap<String, Vec<String>> {
    let mut modes: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for header in doc.select(headers) {
        let key = mode_key(&cell_text(header), known);
        let entries: Vec<String> = section_siblings(header)
            .filter_map(|el| match el.value().name() {
                "p" => Some(cell_text(el)),
                "table" => Some(flatten_rows(&parse_table(el))),
                _ => None,
            })
            .collect();

        if modes.contains_key(&key) {
            warn!("Duplicate exception mode {} on {}; appending", key, page);
        }
        modes.entry(key).or_default().extend(entries);
    }

    modes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractionProfile;

    fn known() -> Vec<(String, String)> {
        ExtractionProfile::default().exception_modes
    }

    #[test]
    fn known_modes_use_lookup() {
        let k = known();
        assert_eq!(mode_key("Protected Mode Exceptions", &k), "protectedMode");
        assert_eq!(mode_key("Real-Address Mode Exceptions", &k), "realAddressMode");
        assert_eq!(mode_key("Virtual-8086 Mode Exceptions", &k), "virtual8086Mode");
        assert_eq!(mode_key("Compatibility Mode Exceptions", &k), "compatibilityMode");
        assert_eq!(mode_key(" 64-Bit Mode Exceptions\n", &k), "64BitMode");
    }

    #[test]
    fn first_lookup_match_wins() {
        let k = known();
        assert_eq!(
            mode_key("64-Bit Mode and Compatibility Mode Exceptions", &k),
            "64BitMode"
        );
    }

    #[test]
    fn unknown_titles_are_camel_cased() {
        let k = known();
        assert_eq!(
            mode_key("SIMD Floating-Point Exceptions", &k),
            "simdFloating-Point"
        );
        assert_eq!(mode_key("Other Exceptions", &k), "other");
        assert_eq!(mode_key("Numeric Exceptions", &k), "numeric");
        assert_eq!(mode_key("FLOATING POINT EXCEPTIONS", &k), "floatingPointExceptions");
    }

    #[test]
    fn empty_title_is_unknown_mode() {
        let k = known();
        assert_eq!(mode_key("Exceptions", &k), UNKNOWN_MODE);
        assert_eq!(mode_key("   ", &k), UNKNOWN_MODE);
    }

    #[test]
    fn collects_paragraphs_and_tables_in_order() {
        let doc = Html::parse_document(
            r#"<h2 class="exceptions">Protected Mode Exceptions</h2>
               <p>#GP(0) If the destination is located in a non-writable segment.</p>
               <table><tr><th>Vector</th><th>Cause</th></tr><tr><td>#UD</td><td>LOCK</td></tr></table>
               <p>#SS(0) Stack fault.</p>
               <h2 class="exceptions">Real-Address Mode Exceptions</h2>
               <p>#GP If a memory operand is outside the CS, DS, ES, FS, or GS segment limit.</p>
               <h2 id="other">Not exceptions</h2>
               <p>ignored</p>"#,
        );
        let sel = Selector::parse("h2.exceptions").unwrap();
        let modes = collect(&doc, &sel, &known(), "test");

        assert_eq!(modes.len(), 2);
        assert_eq!(
            modes["protectedMode"],
            vec![
                "#GP(0) If the destination is located in a non-writable segment.".to_string(),
                "Vector: #UD; Cause: LOCK;".to_string(),
                "#SS(0) Stack fault.".to_string(),
            ]
        );
        assert_eq!(modes["realAddressMode"].len(), 1);
    }

    #[test]
    fn duplicate_mode_appends() {
        let doc = Html::parse_document(
            r#"<h2 class="exceptions">Protected Mode Exceptions</h2><p>first</p>
               <h2 class="exceptions">Protected Mode Exceptions (cont.)</h2><p>second</p>"#,
        );
        let sel = Selector::parse("h2.exceptions").unwrap();
        let modes = collect(&doc, &sel, &known(), "test");
        assert_eq!(modes["protectedMode"], vec!["first", "second"]);
    }
}
