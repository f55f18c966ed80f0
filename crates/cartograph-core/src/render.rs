//! Markdown views of the symbol registry and pattern findings

use std::fmt::Write;

use crate::content::{PatternReport, SymbolRegistry};
use crate::error::ManifestError;
use crate::manifest::{ManifestDocument, ManifestKind, NOTES_KEY};
use crate::model::{PatternCategory, SymbolRecord};

/// Render the Markdown view for `document`, if its kind has one.
pub fn render_markdown(
    kind: ManifestKind,
    document: &ManifestDocument,
) -> Result<Option<String>, ManifestError> {
    let text = match kind {
        ManifestKind::Symbols => Some(render_symbols(document, &document.auto.to_content()?)),
        ManifestKind::Patterns => Some(render_patterns(document, &document.auto.to_content()?)),
        _ => None,
    };
    Ok(text)
}

pub fn render_symbols(document: &ManifestDocument, registry: &SymbolRegistry) -> String {
    let mut out = String::new();
    header(&mut out, "Symbol Registry", document);
    let _ = writeln!(
        out,
        "{} symbols in {} files.\n",
        registry.total_symbols, registry.total_files
    );

    for (file, symbols) in &registry.files {
        let _ = writeln!(out, "## `{}`\n", file);
        let _ = writeln!(out, "| Line | Kind | Name | Exported | Signature |");
        let _ = writeln!(out, "|-----:|------|------|:--------:|-----------|");
        for symbol in symbols {
            let _ = writeln!(
                out,
                "| {} | {} | `{}` | {} | `{}` |",
                symbol.start_line,
                symbol.kind,
                symbol.qualified_name,
                if symbol.is_exported { "yes" } else { "" },
                escape_cell(&signature_line(symbol)),
            );
        }
        out.push('\n');
    }

    notes(&mut out, document);
    out
}

pub fn render_patterns(document: &ManifestDocument, report: &PatternReport) -> String {
    let mut out = String::new();
    header(&mut out, "Detected Patterns", document);

    for category in PatternCategory::ALL {
        let findings: Vec<_> = report
            .findings
            .iter()
            .filter(|f| f.category == category)
            .collect();
        let _ = writeln!(out, "## {}\n", category.title());
        if findings.is_empty() {
            out.push_str("_None detected._\n\n");
            continue;
        }
        for finding in findings {
            let _ = writeln!(out, "- {}", finding.description);
        }
        out.push('\n');
    }

    notes(&mut out, document);
    out
}

fn header(out: &mut String, title: &str, document: &ManifestDocument) {
    let _ = writeln!(out, "# {}\n", title);
    let _ = writeln!(
        out,
        "_Generated by cartograph. Version {}, updated {}. Edit `notes` or `_manual` in the JSON document, not this file._\n",
        document.metadata.version,
        document.metadata.last_updated.format("%Y-%m-%d %H:%M UTC"),
    );
}

fn notes(out: &mut String, document: &ManifestDocument) {
    if let Some(serde_json::Value::String(text)) = document.manual.get(NOTES_KEY) {
        let _ = writeln!(out, "## Notes\n\n{}", text.trim_end());
    }
}

fn signature_line(symbol: &SymbolRecord) -> String {
    let mut line = symbol.signature_text.clone();
    if let Some(ret) = &symbol.return_type_text {
        if !line.contains(ret.as_str()) {
            let _ = write!(line, ": {}", ret);
        }
    }
    line
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('`', "'")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{AutoRegion, ManifestMetadata, ManualRegion};
    use crate::model::{PatternFinding, SymbolKind};
    use serde_json::json;

    fn document<C: crate::content::ManifestContent>(content: &C) -> ManifestDocument {
        let mut manual = ManualRegion::default();
        manual.insert("notes", json!("keep me")).unwrap();
        ManifestDocument {
            metadata: ManifestMetadata {
                last_updated: "2026-05-06T07:08:00Z".parse().unwrap(),
                version: 4,
                changes_since_last_update: 1,
                auto_generated: true,
            },
            auto: AutoRegion::from_content(content).unwrap(),
            manual,
            ignored_keys: Vec::new(),
        }
    }

    #[test]
    fn test_symbols_view() {
        let registry = SymbolRegistry::from_records(vec![SymbolRecord {
            name: "pick".to_string(),
            qualified_name: "Picker.pick".to_string(),
            kind: SymbolKind::Method,
            file_path: "src/picker.ts".to_string(),
            start_line: 3,
            signature_text: "pick(a: A | B)".to_string(),
            is_async: false,
            is_exported: true,
            parameters: vec![],
            return_type_text: Some("void".to_string()),
        }]);
        let doc = document(&registry);

        let text = render_markdown(ManifestKind::Symbols, &doc).unwrap().unwrap();
        assert!(text.starts_with("# Symbol Registry"));
        assert!(text.contains("Version 4, updated 2026-05-06 07:08 UTC"));
        assert!(text.contains("## `src/picker.ts`"));
        assert!(text.contains("| 3 | method | `Picker.pick` | yes | `pick(a: A \\| B): void` |"));
        assert!(text.contains("## Notes\n\nkeep me"));
    }

    #[test]
    fn test_patterns_view_lists_every_category() {
        let report = PatternReport::new(
            1,
            vec![PatternFinding {
                category: PatternCategory::DataFlow,
                description: "async/await".to_string(),
            }],
        );
        let text = render_markdown(ManifestKind::Patterns, &document(&report))
            .unwrap()
            .unwrap();
        assert!(text.contains("## Data flow\n\n- async/await"));
        assert!(text.contains("## Naming\n\n_None detected._"));
    }

    #[test]
    fn test_kinds_without_view() {
        let doc = document(&crate::content::ImportGraph::default());
        assert!(render_markdown(ManifestKind::Imports, &doc).unwrap().is_none());
    }
}
