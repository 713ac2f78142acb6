//! Flat dependency report.

use std::io::{self, Write};

use mozdep::{vocab, KnowledgeGraph, Ns, Subject};
use serde::{Deserialize, Serialize};

use crate::enumerate_dependencies;

/// Placeholder for a single-valued column the graph has no fact for.
pub const UNKNOWN: &str = "unknown";

pub const CSV_HEADER: [&str; 9] = [
    "Name",
    "Version",
    "Language",
    "Upstream Version",
    "Upstream Repo",
    "Vulnerabilities",
    "Detector",
    "Component",
    "Files",
];

/// One report line per dependency subject.
///
/// Multi-valued columns are joined: vulnerability info links with spaces,
/// components with `;`, files with newlines. They are empty, not
/// [`UNKNOWN`], when nothing is known.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DependencyRow {
    pub name: String,
    pub version: String,
    pub language: String,
    pub upstream_version: String,
    pub upstream_repo: String,
    pub vulnerabilities: String,
    pub detector: String,
    pub component: String,
    pub files: String,
}

impl DependencyRow {
    /// Columns in [`CSV_HEADER`] order.
    pub fn fields(&self) -> [&str; 9] {
        [
            self.name.as_str(),
            self.version.as_str(),
            self.language.as_str(),
            self.upstream_version.as_str(),
            self.upstream_repo.as_str(),
            self.vulnerabilities.as_str(),
            self.detector.as_str(),
            self.component.as_str(),
            self.files.as_str(),
        ]
    }
}

fn single(g: &KnowledgeGraph, dep: &Subject, predicate: &Ns) -> String {
    g.v_from([dep])
        .out(predicate)
        .values()
        .into_iter()
        .min()
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn joined(mut values: Vec<String>, separator: &str) -> String {
    values.sort();
    values.join(separator)
}

/// Build the report, sorted by name, version and language.
pub fn dependency_rows(g: &KnowledgeGraph) -> Vec<DependencyRow> {
    let mut rows: Vec<DependencyRow> = enumerate_dependencies(g)
        .map(|dep| {
            let files = g.v_from([&dep]).in_(&vocab::FILE_PART_OF);
            DependencyRow {
                name: single(g, &dep, &vocab::DEP_NAME),
                version: single(g, &dep, &vocab::VERSION_SPEC),
                language: single(g, &dep, &vocab::LANGUAGE_NAME),
                upstream_version: single(g, &dep, &vocab::REPO_VERSION),
                upstream_repo: single(g, &dep, &vocab::REPO_URL),
                vulnerabilities: joined(
                    g.v_from([&dep])
                        .in_(&vocab::VULN_AFFECTS)
                        .out(&vocab::VULN_INFO_LINK)
                        .values(),
                    " ",
                ),
                detector: single(g, &dep, &vocab::DETECTOR_NAME),
                component: joined(files.out(&vocab::BZ_COMPONENT_NAME).values(), ";"),
                files: joined(files.out(&vocab::FILE_PATH).values(), "\n"),
            }
        })
        .collect();
    rows.sort();
    rows
}

fn write_record<W: Write>(out: &mut W, fields: &[&str]) -> io::Result<()> {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.write_all(b",")?;
        }
        if field.contains(|c: char| matches!(c, ',' | '"' | '\n' | '\r')) {
            write!(out, "\"{}\"", field.replace('"', "\"\""))?;
        } else {
            out.write_all(field.as_bytes())?;
        }
    }
    out.write_all(b"\r\n")
}

/// Write `rows` as RFC 4180 CSV with a header line.
pub fn write_csv<W: Write>(mut out: W, rows: &[DependencyRow]) -> io::Result<()> {
    write_record(&mut out, &CSV_HEADER)?;
    for row in rows {
        write_record(&mut out, &row.fields())?;
    }
    out.flush()
}
