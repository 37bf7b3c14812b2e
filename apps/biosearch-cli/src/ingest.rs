//! CSV ingestion: maps the scraped-paper export (and its header variants)
//! onto [`Document`] records. All normalization happens here, once; nothing
//! downstream ever re-cleans field values.

use anyhow::Context;
use biosearch_core::types::Document;
use csv::StringRecord;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

/// Canonical column -> accepted header spellings, matched after lowercasing,
/// BOM-stripping and space-to-underscore folding.
const ALIASES: &[(&str, &[&str])] = &[
    ("id", &["id", "pmcid", "pmc_id"]),
    ("title", &["title"]),
    ("abstract", &["abstract", "summary"]),
    ("authors", &["authors", "author"]),
    ("keywords", &["keywords", "tags"]),
    ("year", &["year", "publication_year", "pub_year", "date_iso", "date"]),
    ("organism", &["organism"]),
    ("mission", &["mission"]),
    ("environment", &["environment"]),
    ("source", &["source"]),
    ("doi", &["doi"]),
    ("url", &["url", "link"]),
];

pub fn load_csv(path: &Path) -> anyhow::Result<Vec<Document>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    read_documents(file)
}

pub fn read_documents<R: Read>(reader: R) -> anyhow::Result<Vec<Document>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let columns = ColumnMap::from_headers(csv_reader.headers().context("missing CSV header")?);

    let mut documents = Vec::new();
    for (row, record) in csv_reader.records().enumerate() {
        let record = record.with_context(|| format!("unreadable CSV row {}", row + 2))?;
        match columns.document(&record, row) {
            Some(doc) => documents.push(doc),
            None => tracing::warn!(row = row + 2, "skipping row without a title"),
        }
    }
    Ok(documents)
}

struct ColumnMap {
    indices: HashMap<&'static str, usize>,
}

impl ColumnMap {
    fn from_headers(headers: &StringRecord) -> Self {
        let mut indices = HashMap::new();
        for (position, header) in headers.iter().enumerate() {
            let normalized = header
                .trim_start_matches('\u{feff}')
                .trim()
                .to_lowercase()
                .replace(' ', "_");
            for (canonical, spellings) in ALIASES {
                if spellings.contains(&normalized.as_str()) {
                    indices.entry(*canonical).or_insert(position);
                }
            }
        }
        Self { indices }
    }

    fn get<'r>(&self, record: &'r StringRecord, column: &str) -> Option<&'r str> {
        let value = record.get(*self.indices.get(column)?)?.trim();
        if value.is_empty() {
            None
        } else {
            Some(value)
        }
    }

    fn optional(&self, record: &StringRecord, column: &str) -> Option<String> {
        self.get(record, column).map(str::to_string)
    }

    fn document(&self, record: &StringRecord, row: usize) -> Option<Document> {
        let title = self.get(record, "title")?.to_string();
        let url = self.optional(record, "url").unwrap_or_default();
        let source = self.optional(record, "source");
        let doi = self.optional(record, "doi");
        let has_doi = doi.is_some();
        let has_osdr = url.to_lowercase().contains("osdr")
            || source
                .as_deref()
                .is_some_and(|s| s.to_lowercase().contains("osdr"));

        Some(Document {
            id: self
                .optional(record, "id")
                .unwrap_or_else(|| format!("row-{}", row + 1)),
            title,
            abstract_text: self.optional(record, "abstract").unwrap_or_default(),
            authors: self.optional(record, "authors").unwrap_or_default(),
            keywords: self.optional(record, "keywords").unwrap_or_default(),
            year: self.get(record, "year").and_then(parse_year),
            organism: self.optional(record, "organism"),
            mission: self.optional(record, "mission"),
            environment: self.optional(record, "environment"),
            source,
            doi,
            url,
            has_doi,
            has_osdr,
        })
    }
}

/// Accepts a bare year or any value with an embedded four-digit year, e.g.
/// an ISO date like `2021-05-14`.
fn parse_year(raw: &str) -> Option<i32> {
    for run in raw.split(|c: char| !c.is_ascii_digit()) {
        if run.len() == 4 {
            if let Ok(year) = run.parse::<i32>() {
                if (1800..=2100).contains(&year) {
                    return Some(year);
                }
            }
        }
    }
    None
}
