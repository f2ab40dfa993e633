use scraper::{ElementRef, Html, Selector};

use super::tables::cell_text;

/// Element siblings after `header`, up to (not including) the next element
/// with the same tag name.
pub fn section_siblings<'a>(header: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    let tag = header.value().name();
    header
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .take_while(move |el| el.value().name() != tag)
}

/// The element directly after `header`, ignoring text nodes.
pub fn next_element(header: ElementRef) -> Option<ElementRef> {
    header.next_siblings().find_map(ElementRef::wrap)
}

/// First element matched by `headers` whose id is `id`.
pub fn find_header<'a>(doc: &'a Html, headers: &Selector, id: &str) -> Option<ElementRef<'a>> {
    doc.select(headers).find(|h| h.value().id() == Some(id))
}

/// Text of every `p` and `pre` block in the section opened by the header with
/// the given id, joined by newlines. A missing header gives an empty string.
pub fn text_under_header(doc: &Html, headers: &Selector, id: &str) -> String {
    let Some(header) = find_header(doc, headers, id) else {
        return String::new();
    };
    section_siblings(header)
        .filter(|el| matches!(el.value().name(), "p" | "pre"))
        .map(cell_text)
        .collect::<Vec<_>>()
        .join("\n")
}
