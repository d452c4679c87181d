//! Output formatting for command results, in markdown and JSON.

use crate::db::index::IndexStats;
use crate::types::IndexSummary;
use clap::ValueEnum;
use serde_json::json;

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Json,
    #[value(alias = "md")]
    Markdown,
}

/// Format the summaries of one indexing run (main root, then derivatives).
pub fn format_summaries(summaries: &[IndexSummary], format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => {
            let value = json!({ "roots": summaries, "total": total(summaries) });
            serde_json::to_string_pretty(&value).unwrap_or_default()
        }
        OutputFormat::Markdown => format_summaries_markdown(summaries),
    }
}

fn total(summaries: &[IndexSummary]) -> IndexSummary {
    let mut total = IndexSummary::default();
    for summary in summaries {
        total.absorb(summary);
    }
    total
}

fn format_summaries_markdown(summaries: &[IndexSummary]) -> String {
    let mut md = String::new();
    md.push_str(&format!("# Indexed roots ({})\n\n", summaries.len()));

    for summary in summaries {
        md.push_str(&format!("## {}\n", summary.root.display()));
        push_summary_fields(&mut md, summary);
        md.push('\n');
    }

    if summaries.len() > 1 {
        md.push_str("## Total\n");
        push_summary_fields(&mut md, &total(summaries));
    }
    md
}

fn push_summary_fields(md: &mut String, summary: &IndexSummary) {
    md.push_str(&format!("- **directories**: {}\n", summary.directories));
    md.push_str(&format!("- **files**: {}\n", summary.files));
    md.push_str(&format!("- **filename tags**: {}\n", summary.filename_tags));
    md.push_str(&format!("- **metadata tags**: {}\n", summary.metadata_tags));
    md.push_str(&format!(
        "- **metadata entities**: {}\n",
        summary.metadata_entities
    ));
    md.push_str(&format!("- **associations**: {}\n", summary.associations));
}

/// Format database row counts.
pub fn format_stats(stats: &IndexStats, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(stats).unwrap_or_default(),
        OutputFormat::Markdown => {
            let mut md = String::from("# Index\n");
            md.push_str(&format!("- **files**: {}\n", stats.files));
            md.push_str(&format!(
                "- **entities**: {} ({} from metadata)\n",
                stats.entities, stats.metadata_entities
            ));
            md.push_str(&format!("- **tags**: {}\n", stats.tags));
            md.push_str(&format!("- **associations**: {}\n", stats.associations));
            md
        }
    }
}
