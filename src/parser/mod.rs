pub mod exceptions;
pub mod sections;
pub mod tables;

use scraper::{Html, Selector};

use crate::config::{ExtractionProfile, TextSection};
use crate::error::{Result, ScrapeError};
use crate::model::{ExtractedRecord, Link, Row, Value};

pub const TITLE_FIELD: &str = "instructionName";
pub const DETAILS_TABLE_FIELD: &str = "detailsTable";
pub const OPERAND_TABLE_FIELD: &str = "operandEncodingTable";
pub const EXCEPTIONS_FIELD: &str = "exceptions";

/// Detail-page extractor with its selectors compiled once up front.
pub struct Extractor {
    title: Selector,
    table: Selector,
    section_header: Selector,
    exceptions_header: Selector,
    secondary_table_header_id: String,
    secondary_table_sentinel: String,
    text_sections: Vec<TextSection>,
    exception_modes: Vec<(String, String)>,
}

impl Extractor {
    pub fn new(profile: &ExtractionProfile) -> Result<Self> {
        Ok(Self {
            title: selector(&profile.title_selector)?,
            table: selector("table")?,
            section_header: selector(&profile.section_header)?,
            exceptions_header: selector(&format!(
                "{}.{}",
                profile.section_header, profile.exceptions_class
            ))?,
            secondary_table_header_id: profile.secondary_table_header_id.clone(),
            secondary_table_sentinel: profile.secondary_table_sentinel.clone(),
            text_sections: profile.text_sections.clone(),
            exception_modes: profile.exception_modes.clone(),
        })
    }

    /// Title → tables → header-scoped text → exceptions. Each step is
    /// independent; a step that finds nothing leaves an empty value.
    pub fn extract(&self, link: &Link, html: &str) -> ExtractedRecord {
        let doc = Html::parse_document(html);
        let mut record = ExtractedRecord::new(link);

        let title = doc
            .select(&self.title)
            .next()
            .map(tables::cell_text)
            .unwrap_or_default();
        record.set(TITLE_FIELD, Value::Scalar(title));

        let (details, operands) = self.tables(&doc);
        record.set(DETAILS_TABLE_FIELD, Value::Table(details));
        record.set(OPERAND_TABLE_FIELD, Value::Table(operands));

        for section in &self.text_sections {
            let text = sections::text_under_header(&doc, &self.section_header, &section.header_id);
            record.set(&section.field, Value::Scalar(text));
        }

        let modes = exceptions::collect(
            &doc,
            &self.exceptions_header,
            &self.exception_modes,
            &link.identifier,
        );
        record.set(EXCEPTIONS_FIELD, Value::KeyedBlocks(modes));

        record
    }

    fn tables(&self, doc: &Html) -> (Vec<Row>, Vec<Row>) {
        let all: Vec<_> = doc.select(&self.table).collect();
        let Some(first) = all.first() else {
            return (Vec::new(), Vec::new());
        };
        let details = tables::parse_table(*first);

        // Prefer the table right under the operand-encoding header; only fall
        // back to the second table when its headers carry the sentinel label.
        let operands = match sections::find_header(
            doc,
            &self.section_header,
            &self.secondary_table_header_id,
        ) {
            Some(header) => sections::next_element(header)
                .filter(|el| el.value().name() == "table")
                .map(tables::parse_table)
                .unwrap_or_default(),
            None => all
                .get(1)
                .filter(|t| tables::has_header_label(**t, &self.secondary_table_sentinel))
                .map(|t| tables::parse_table(*t))
                .unwrap_or_default(),
        };

        (details, operands)
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| ScrapeError::Config(format!("selector {:?}: {}", css, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> Extractor {
        Extractor::new(&ExtractionProfile::default()).unwrap()
    }

    fn link() -> Link {
        Link::new("https://www.felixcloutier.com/x86/add", "Core Instructions")
    }

    fn fixture(name: &str) -> String {
        std::fs::read_to_string(format!("tests/fixtures/{}.html", name)).unwrap()
    }

    #[test]
    fn add_fixture() {
        let record = extractor().extract(&link(), &fixture("add"));
        assert!(record.is_ok());
        assert_eq!(record.scalar(TITLE_FIELD), Some("ADD — Add"));

        let details = record.table(DETAILS_TABLE_FIELD).unwrap();
        assert_eq!(details.len(), 3);
        assert_eq!(details[0]["Opcode"], "04 ib");
        assert_eq!(details[0]["Instruction"], "ADD AL, imm8");
        assert_eq!(details[0]["column_3"], "I");

        let operands = record.table(OPERAND_TABLE_FIELD).unwrap();
        assert_eq!(operands.len(), 2);
        assert_eq!(operands[0]["Op/En"], "RM");

        assert!(record
            .scalar("descriptionText")
            .unwrap()
            .starts_with("Adds the destination operand"));
        assert_eq!(record.scalar("operationText"), Some("DEST := DEST + SRC;"));
        assert_eq!(
            record.scalar("flagsAffectedText"),
            Some("The OF, SF, ZF, AF, CF, and PF flags are set according to the result.")
        );

        let modes = record.keyed(EXCEPTIONS_FIELD).unwrap();
        let keys: Vec<&str> = modes.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec!["64BitMode", "protectedMode", "realAddressMode", "simdFloating-Point"]
        );
        assert_eq!(modes["protectedMode"].len(), 2);
        assert!(modes["simdFloating-Point"][0].starts_with("Exception: #XM;"));
    }

    #[test]
    fn extraction_is_idempotent() {
        let html = fixture("add");
        let a = serde_json::to_string(&extractor().extract(&link(), &html)).unwrap();
        let b = serde_json::to_string(&extractor().extract(&link(), &html)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn second_table_needs_sentinel_without_header() {
        let html = r#"<h1>X</h1>
            <table><tr><th>Opcode</th></tr><tr><td>90</td></tr></table>
            <table><tr><th>Unrelated</th></tr><tr><td>1</td></tr></table>"#;
        let record = extractor().extract(&link(), html);
        assert_eq!(record.table(DETAILS_TABLE_FIELD).unwrap().len(), 1);
        assert!(record.table(OPERAND_TABLE_FIELD).unwrap().is_empty());

        let html = r#"<h1>X</h1>
            <table><tr><th>Opcode</th></tr><tr><td>90</td></tr></table>
            <table><tr><th>Op/En</th><th>Operand 1</th></tr><tr><td>ZO</td><td>NA</td></tr></table>"#;
        let record = extractor().extract(&link(), html);
        assert_eq!(record.table(OPERAND_TABLE_FIELD).unwrap()[0]["Op/En"], "ZO");
    }

    #[test]
    fn operand_header_must_be_followed_by_table() {
        let html = r#"<h1>X</h1>
            <table><tr><th>Opcode</th></tr><tr><td>90</td></tr></table>
            <h2 id="instruction-operand-encoding">Instruction Operand Encoding</h2>
            <p>None.</p>
            <table><tr><th>Op/En</th></tr><tr><td>ZO</td></tr></table>"#;
        let record = extractor().extract(&link(), html);
        assert!(record.table(OPERAND_TABLE_FIELD).unwrap().is_empty());
    }

    #[test]
    fn empty_page_yields_empty_fields() {
        let record = extractor().extract(&link(), "<html><body></body></html>");
        assert!(record.is_ok());
        assert_eq!(record.scalar(TITLE_FIELD), Some(""));
        assert!(record.table(DETAILS_TABLE_FIELD).unwrap().is_empty());
        assert_eq!(record.scalar("operationText"), Some(""));
        assert!(record.keyed(EXCEPTIONS_FIELD).unwrap().is_empty());
        assert_eq!(record.category, "Core Instructions");
    }

    #[test]
    fn bad_selector_is_config_error() {
        let profile = ExtractionProfile {
            title_selector: "h1[".into(),
            ..ExtractionProfile::default()
        };
        assert!(matches!(Extractor::new(&profile), Err(ScrapeError::Config(_))));
    }
}
