//! Small DOM helpers shared by the extractors.

use scraper::{ElementRef, Selector};

/// Parses a CSS selector, logging and returning `None` if it is malformed.
pub(crate) fn selector(css: &str) -> Option<Selector> {
    match Selector::parse(css) {
        Ok(s) => Some(s),
        Err(e) => {
            tracing::error!(selector = css, error = %e, "invalid CSS selector");
            None
        }
    }
}

/// Collapses runs of whitespace into single spaces and trims the ends.
pub(crate) fn normalize_text(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) fn element_text(el: ElementRef<'_>) -> String {
    normalize_text(&el.text().collect::<Vec<_>>().join(" "))
}

/// Text of the first descendant of `el` matching `css` with non-empty text.
pub(crate) fn first_text(el: ElementRef<'_>, css: &str) -> Option<String> {
    let sel = selector(css)?;
    el.select(&sel)
        .map(element_text)
        .find(|text| !text.is_empty())
}

/// Trimmed, non-empty value of attribute `name` on `el`.
pub(crate) fn attr(el: ElementRef<'_>, name: &str) -> Option<String> {
    el.value()
        .attr(name)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// First non-empty `name` attribute on `el` or any descendant matching `css`.
pub(crate) fn attr_in(el: ElementRef<'_>, css: &str, name: &str) -> Option<String> {
    attr_in_where(el, css, name, |_| true)
}

/// Like [`attr_in`], but values rejected by `accept` are skipped and the
/// search moves on to the next candidate.
pub(crate) fn attr_in_where<F>(
    el: ElementRef<'_>,
    css: &str,
    name: &str,
    accept: F,
) -> Option<String>
where
    F: Fn(&str) -> bool,
{
    if let Some(value) = attr(el, name).filter(|v| accept(v)) {
        return Some(value);
    }
    let sel = selector(css)?;
    el.select(&sel)
        .filter_map(|child| attr(child, name))
        .find(|v| accept(v))
}
