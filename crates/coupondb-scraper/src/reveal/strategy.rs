//! Ordered code-extraction strategies for reveal pages.

use coupondb_core::is_placeholder_code;
use scraper::{ElementRef, Html};

use crate::html;
use crate::site::{CLIPBOARD_ATTR, CODE_ATTR};

/// One way of locating a code in a reveal document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStrategy {
    /// Elements matching the selector. Inputs yield their `value`; other
    /// elements yield their clipboard attribute, code attribute, or text.
    Selector(&'static str),
    /// Any element carrying the attribute yields its value.
    Attribute(&'static str),
}

/// Strategies tried in order; the first usable code wins.
pub const REVEAL_CASCADE: &[ExtractionStrategy] = &[
    ExtractionStrategy::Selector("input#code.input.code"),
    ExtractionStrategy::Selector("input.code"),
    ExtractionStrategy::Attribute(CLIPBOARD_ATTR),
    ExtractionStrategy::Selector(".coupon-code"),
    ExtractionStrategy::Selector(".code"),
];

impl ExtractionStrategy {
    /// CSS selector matching the elements this strategy reads.
    #[must_use]
    pub fn css(self) -> String {
        match self {
            ExtractionStrategy::Selector(css) => css.to_string(),
            ExtractionStrategy::Attribute(name) => format!("[{name}]"),
        }
    }

    /// First non-placeholder code this strategy finds in `document`.
    #[must_use]
    pub fn apply(self, document: &Html) -> Option<String> {
        let sel = html::selector(&self.css())?;
        document
            .select(&sel)
            .filter_map(|el| match self {
                ExtractionStrategy::Selector(_) => read_element(el),
                ExtractionStrategy::Attribute(name) => html::attr(el, name),
            })
            .find(|code| !is_placeholder_code(code))
    }
}

fn read_element(el: ElementRef<'_>) -> Option<String> {
    if el.value().name().eq_ignore_ascii_case("input") {
        return html::attr(el, "value");
    }
    html::attr(el, CLIPBOARD_ATTR)
        .or_else(|| html::attr(el, CODE_ATTR))
        .or_else(|| Some(html::element_text(el)).filter(|t| !t.is_empty()))
}

/// Runs [`REVEAL_CASCADE`] with early exit.
#[must_use]
pub fn extract_code(document: &Html) -> Option<String> {
    REVEAL_CASCADE
        .iter()
        .find_map(|strategy| strategy.apply(document))
}

/// Comma-joined selector matching any element the cascade could read; used
/// as the bounded wait-for-selector on reveal pages.
#[must_use]
pub fn cascade_wait_selector() -> String {
    REVEAL_CASCADE
        .iter()
        .map(|s| s.css())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(body: &str) -> Option<String> {
        extract_code(&Html::parse_document(body))
    }

    #[test]
    fn reads_input_value_first() {
        let body = r#"<input id="code" class="input code" value="SAVE20">
                      <span class="coupon-code">OTHER</span>"#;
        assert_eq!(code(body).as_deref(), Some("SAVE20"));
    }

    #[test]
    fn falls_through_placeholder_values() {
        let body = r#"<input class="code" value="No code required">
                      <button data-clipboard-text="CLIP15">Copy</button>"#;
        assert_eq!(code(body).as_deref(), Some("CLIP15"));
    }

    #[test]
    fn element_prefers_clipboard_then_code_attr_then_text() {
        assert_eq!(
            code(r#"<div class="coupon-code" data-code="ATTR">TEXT</div>"#).as_deref(),
            Some("ATTR")
        );
        assert_eq!(
            code(r#"<div class="coupon-code"> TEXT5 </div>"#).as_deref(),
            Some("TEXT5")
        );
    }

    #[test]
    fn skips_empty_matches_and_uses_later_strategy() {
        let body = r#"<div class="coupon-code">   </div><span class="code">LAST</span>"#;
        assert_eq!(code(body).as_deref(), Some("LAST"));
    }

    #[test]
    fn returns_none_when_nothing_usable() {
        assert_eq!(code("<p>Sorry, this offer expired.</p>"), None);
        assert_eq!(code(r#"<span class="code">no code required</span>"#), None);
    }

    #[test]
    fn wait_selector_lists_every_strategy() {
        let sel = cascade_wait_selector();
        assert!(sel.starts_with("input#code.input.code, input.code"));
        assert!(sel.contains("[data-clipboard-text]"));
        assert!(sel.ends_with(".code"));
    }
}
