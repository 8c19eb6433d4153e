//! Catalogue ingestion: heuristic parsing and canonical text building.

pub mod canonical;
pub mod parser;

use uuid::Uuid;

use crate::models::ClassificationRecord;
use parser::ParsedRecord;

/// Turn parser output into catalogue records, tagging each with `source`.
pub fn into_records(parsed: Vec<ParsedRecord>, source: &str) -> Vec<ClassificationRecord> {
    parsed
        .into_iter()
        .map(|p| {
            let hierarchy_context = chapter_label(&p.primary_code);
            ClassificationRecord {
                id: Uuid::new_v4(),
                primary_code: p.primary_code,
                secondary_code: p.secondary_code,
                commodity_name: p.category,
                description: p.description,
                tax_rate: p.tax_rate,
                hierarchy_context,
                sources: vec![source.to_string()],
            }
        })
        .collect()
}

/// "Chapter NN" from the first two digits of a code.
fn chapter_label(primary_code: &str) -> Option<String> {
    let chapter: String = primary_code.chars().take(2).collect();
    if chapter.len() == 2 && chapter.chars().all(|c| c.is_ascii_digit()) {
        Some(format!("Chapter {chapter}"))
    } else {
        None
    }
}
