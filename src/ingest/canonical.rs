//! Canonical text builders for embedding input.
//!
//! Record side and query side use different templates but the same rules:
//! parts joined with `" > "`, empty parts skipped, whitespace collapsed, no
//! locale-dependent formatting. Identical input always yields identical text.

use crate::models::{ClassificationRecord, ProductAttributes};

const SEPARATOR: &str = " > ";

/// `hierarchy > commodity name > description (ITC:primary GST:secondary)`
pub fn record_text(record: &ClassificationRecord) -> String {
    let codes = format!(
        "(ITC:{} GST:{})",
        record.primary_code, record.secondary_code
    );
    let description = collapse(&record.description);
    let tail = if description.is_empty() {
        codes
    } else {
        format!("{description} {codes}")
    };

    join_parts([
        record.hierarchy_context.as_deref().unwrap_or_default(),
        record.commodity_name.as_str(),
        tail.as_str(),
    ])
}

/// `category > tags > name > description > key: value; ...`, truncated to `max_chars`.
pub fn product_text(attrs: &ProductAttributes, max_chars: usize) -> String {
    let tags = attrs
        .tags
        .iter()
        .map(|t| collapse(t))
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(", ");
    let attributes = attrs
        .attributes
        .iter()
        .filter(|(_, v)| !v.trim().is_empty())
        .map(|(k, v)| format!("{}: {}", collapse(k), collapse(v)))
        .collect::<Vec<_>>()
        .join("; ");

    let text = join_parts([
        attrs.category.as_deref().unwrap_or_default(),
        tags.as_str(),
        attrs.name.as_str(),
        attrs.description.as_deref().unwrap_or_default(),
        attributes.as_str(),
    ]);
    truncate_chars(&text, max_chars)
}

/// Free text queries are only collapsed and truncated.
pub fn free_text(text: &str, max_chars: usize) -> String {
    truncate_chars(&collapse(text), max_chars)
}

fn join_parts<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    parts
        .into_iter()
        .map(collapse)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(SEPARATOR)
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}
