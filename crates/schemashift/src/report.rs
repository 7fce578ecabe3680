//! Plan rendering for the `plan` command.

use clap::ValueEnum;
use serde::Serialize;
use std::fmt::Write as _;

use schemashift_core::{CollectionId, PlanEntry, PlanSummary, TransformationPlan};

use crate::error::Result;

/// Output format for a rendered plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable summary.
    #[default]
    Text,
    /// Machine-readable JSON.
    Json,
    /// Machine-readable YAML.
    Yaml,
}

#[derive(Serialize)]
struct PlanReport<'a> {
    summary: PlanSummary,
    execution_order: Vec<&'a CollectionId>,
    plan: &'a TransformationPlan,
}

impl<'a> PlanReport<'a> {
    fn new(plan: &'a TransformationPlan) -> Self {
        Self {
            summary: plan.summary(),
            execution_order: plan.execution_order().into_iter().map(|e| &e.id).collect(),
            plan,
        }
    }
}

/// Renders `plan` in `format`.
///
/// # Errors
///
/// Returns a serialization error for the JSON and YAML formats.
pub fn render(plan: &TransformationPlan, format: ReportFormat) -> Result<String> {
    match format {
        ReportFormat::Text => Ok(render_text(plan)),
        ReportFormat::Json => {
            let mut text = serde_json::to_string_pretty(&PlanReport::new(plan))?;
            text.push('\n');
            Ok(text)
        }
        ReportFormat::Yaml => Ok(serde_yaml::to_string(&PlanReport::new(plan))?),
    }
}

fn render_text(plan: &TransformationPlan) -> String {
    let summary = plan.summary();
    let mut out = String::new();
    let _ = writeln!(out, "Transformation plan");
    let _ = writeln!(
        out,
        "   Collections: {} ({} sharded, {} dropped first)",
        summary.collections, summary.sharded, summary.dropped
    );
    let _ = writeln!(
        out,
        "   Indexes:     {} kept, {} removed as redundant",
        summary.indexes_kept, summary.indexes_removed
    );
    let _ = writeln!(out, "   Colocation:  {} group(s)", summary.colocation_groups);
    let _ = writeln!(out, "   Warnings:    {}", summary.warnings);

    for (position, entry) in plan.execution_order().into_iter().enumerate() {
        let _ = writeln!(out);
        write_entry(&mut out, position + 1, entry);
    }
    out
}

fn write_entry(out: &mut String, position: usize, entry: &PlanEntry) {
    let _ = writeln!(out, "{position}. {} (section {})", entry.id, entry.section);
    match &entry.shard_key {
        Some(key) => {
            let _ = writeln!(out, "   shard key: {key}");
        }
        None => {
            let _ = writeln!(out, "   shard key: none (unsharded)");
        }
    }
    if let Some(anchor) = &entry.colocate_with {
        let _ = writeln!(out, "   co-located with: {anchor}");
    }
    if entry.drop_if_exists {
        let _ = writeln!(out, "   drops the target collection first");
    }
    for index in &entry.indexes {
        let _ = writeln!(out, "   + {} {}", index.name, index.key);
    }
    for removed in &entry.removed_indexes {
        let _ = writeln!(
            out,
            "   - {} (covered by {})",
            removed.index.name, removed.subsumed_by
        );
    }
    for warning in &entry.warnings {
        let _ = writeln!(out, "   ! {warning}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemashift_core::{
        build, IndexDefinition, IndexDirection, IndexKeySpec, SectionConfig, ShardKey,
        SourceCollection, SourceSnapshot,
    };

    fn sample_plan() -> TransformationPlan {
        let snapshot = SourceSnapshot::from_collections([
            SourceCollection::new(CollectionId::new("shop", "orders"))
                .with_shard_key(ShardKey::hashed("customerId"))
                .with_indexes([
                    IndexDefinition::from_key(IndexKeySpec::single("status", IndexDirection::Ascending)),
                    IndexDefinition::from_key(IndexKeySpec::from_pairs([
                        ("status", IndexDirection::Ascending),
                        ("createdAt", IndexDirection::Descending),
                    ])),
                ]),
            SourceCollection::new(CollectionId::new("shop", "customers")),
        ])
        .expect("snapshot");
        let sections = vec![
            SectionConfig::including(["shop.*"]).optimize_compound_indexes(true),
            SectionConfig::including(["shop.orders"])
                .optimize_compound_indexes(true)
                .migrate_shard_key(true)
                .co_locate_with("customers"),
        ];
        build(&sections, &snapshot).expect("plan")
    }

    #[test]
    fn test_text_report_lists_entries_in_execution_order() {
        // Arrange
        let plan = sample_plan();

        // Act
        let text = render(&plan, ReportFormat::Text).expect("render");

        // Assert
        assert!(text.starts_with("Transformation plan\n"));
        assert!(text.contains("2 (1 sharded, 0 dropped first)"));
        let customers = text.find("1. shop.customers").expect("customers");
        let orders = text.find("2. shop.orders (section 1)").expect("orders");
        assert!(customers < orders);
        assert!(text.contains(r#"shard key: {customerId: "hashed"}"#));
        assert!(text.contains("co-located with: shop.customers"));
        assert!(text.contains("- status_1 (covered by status_1_createdAt_-1)"));
        assert!(text.contains("! "));
    }

    #[test]
    fn test_json_report_carries_summary_and_order() {
        let plan = sample_plan();

        let json = render(&plan, ReportFormat::Json).expect("render");
        let value: serde_json::Value = serde_json::from_str(&json).expect("parse");

        assert_eq!(value["summary"]["indexes_removed"], 1);
        assert_eq!(value["execution_order"][0]["collection"], "customers");
        assert_eq!(value["execution_order"][1]["collection"], "orders");
        assert!(value["plan"]["entries"].is_array());
    }

    #[test]
    fn test_yaml_report_parses_back() {
        let plan = sample_plan();

        let yaml = render(&plan, ReportFormat::Yaml).expect("render");
        let value: serde_yaml::Value = serde_yaml::from_str(&yaml).expect("parse");

        assert_eq!(value["summary"]["collections"].as_u64(), Some(2));
    }

    #[test]
    fn test_empty_plan_renders_summary_only() {
        let plan = build(&[SectionConfig::including(["*"])], &SourceSnapshot::new()).expect("plan");

        let text = render(&plan, ReportFormat::Text).expect("render");

        assert_eq!(text.lines().count(), 5);
    }
}
