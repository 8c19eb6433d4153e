//! Heuristic catalogue parser.
//!
//! The source corpus is flattened table text with no reliable record
//! separators. A record starts at a 6-8 digit code preceded by a run of
//! label-like characters on the same line; its description runs until the
//! next label+code pair or the end of the corpus.
//!
//! This is deliberately not a table extractor. Anything that does not look
//! like `label code description` is skipped without error.

use anyhow::{Context, Result};
use regex::Regex;

use crate::config::ParserConfig;

/// Raw tuple produced by the parser, before ids and chapter context are assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRecord {
    pub category: String,
    pub primary_code: String,
    pub secondary_code: String,
    pub description: String,
    pub tax_rate: Option<f64>,
}

pub struct RecordParser {
    header: Regex,
    heading: Option<Regex>,
    trailing_rate: Regex,
    config: ParserConfig,
}

/// Span of one `label code` header inside the corpus.
struct Header {
    start: usize,
    end: usize,
    category: String,
    code: String,
}

impl RecordParser {
    pub fn new(config: ParserConfig) -> Result<Self> {
        // Label: starts with a letter, no digits or line breaks. Code: 6-8 digits.
        let header = Regex::new(
            r"(?P<category>[A-Za-z][A-Za-z \t,;:&()/'.\-]*?)[ \t]*\b(?P<code>\d{6,8})\b",
        )
        .context("Failed to compile record header pattern")?;
        let trailing_rate = Regex::new(r"\b(?P<rate>\d{1,2}(?:\.\d+)?)\s*%\s*$")
            .context("Failed to compile tax rate pattern")?;

        let heading = if config.heading_pattern.is_empty() {
            None
        } else {
            Some(
                Regex::new(&config.heading_pattern)
                    .context("Failed to compile section heading pattern")?,
            )
        };

        Ok(Self {
            header,
            heading,
            trailing_rate,
            config,
        })
    }

    /// Extract records in corpus order.
    pub fn parse(&self, corpus: &str) -> Vec<ParsedRecord> {
        let headers: Vec<Header> = self
            .header
            .captures_iter(corpus)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                Some(Header {
                    start: whole.start(),
                    end: whole.end(),
                    category: caps.name("category")?.as_str().to_string(),
                    code: caps.name("code")?.as_str().to_string(),
                })
            })
            .collect();

        let mut records = Vec::with_capacity(headers.len());

        for (i, header) in headers.iter().enumerate() {
            let window_end = headers.get(i + 1).map(|h| h.start).unwrap_or(corpus.len());
            let raw_description = &corpus[header.end..window_end];

            let category = self.clean_category(&header.category);
            if category.is_empty() {
                continue;
            }

            let mut description = self.clean_description(raw_description);
            let tax_rate = self.take_tax_rate(&mut description);

            if description.chars().count() < self.config.min_description_len {
                tracing::warn!(
                    "Suspiciously short description for code {}: {:?}",
                    header.code,
                    description
                );
            }

            records.push(ParsedRecord {
                category,
                secondary_code: derive_secondary_code(&header.code),
                primary_code: header.code.clone(),
                description,
                tax_rate,
            });
        }

        tracing::info!("Parsed {} catalogue records", records.len());
        records
    }

    /// Trim a category label, keeping only its tail when it is implausibly long.
    fn clean_category(&self, raw: &str) -> String {
        let collapsed = collapse_whitespace(raw);
        let len = collapsed.chars().count();
        if len <= self.config.max_category_len {
            return collapsed;
        }
        // A long capture is leaked description text from the previous record.
        collapsed
            .chars()
            .skip(len - self.config.max_category_len)
            .collect::<String>()
            .trim()
            .to_string()
    }

    fn clean_description(&self, raw: &str) -> String {
        let mut text = match &self.heading {
            Some(heading) => heading.replace_all(raw, " ").into_owned(),
            None => raw.to_string(),
        };
        for boilerplate in &self.config.boilerplate {
            if !boilerplate.is_empty() {
                text = text.replace(boilerplate.as_str(), " ");
            }
        }
        collapse_whitespace(&text)
    }

    /// Strip a trailing percentage off `description` and return it as the tax rate.
    fn take_tax_rate(&self, description: &mut String) -> Option<f64> {
        let caps = self.trailing_rate.captures(description)?;
        let rate = caps.name("rate")?.as_str().parse::<f64>().ok()?;
        let cut = caps.get(0)?.start();
        description.truncate(cut);
        let trimmed_len = description.trim_end().len();
        description.truncate(trimmed_len);
        Some(rate)
    }
}

/// The secondary code is derived, never parsed: the first four characters.
pub fn derive_secondary_code(primary_code: &str) -> String {
    primary_code.chars().take(4).collect()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
