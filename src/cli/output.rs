//! Output formatting for CLI commands.

use serde::Serialize;

use crate::cli::args::{MenagerieArgs, OutputFormat};
use crate::download::DownloadReport;
use crate::error::Result;
use crate::manager::UpsertReport;
use crate::model::Model;
use crate::vector::point::ScoredPoint;

/// Result types that know how to print themselves for people.
pub trait HumanOutput {
    fn print_human(&self);
}

/// Status of one collection after `create-collections`.
#[derive(Debug, Serialize)]
pub struct CollectionCreation {
    pub collection: String,
    pub model: Model,
    pub dimension: usize,
    pub created: bool,
}

#[derive(Debug, Serialize)]
pub struct CollectionsCreated {
    pub collections: Vec<CollectionCreation>,
}

#[derive(Debug, Serialize)]
pub struct CollectionDeleted {
    pub collection: String,
}

/// A collection present in the vector database.
#[derive(Debug, Serialize)]
pub struct CollectionSummary {
    pub name: String,
    /// Model the collection is mapped to, if any.
    pub model: Option<Model>,
    pub points: u64,
}

#[derive(Debug, Serialize)]
pub struct CollectionList {
    pub collections: Vec<CollectionSummary>,
}

#[derive(Debug, Serialize)]
pub struct UpsertSummary {
    pub reports: Vec<UpsertReport>,
}

#[derive(Debug, Serialize)]
pub struct CollectionHits {
    pub collection: String,
    pub hits: Vec<ScoredPoint>,
}

#[derive(Debug, Serialize)]
pub struct SearchResults {
    pub value: String,
    pub results: Vec<CollectionHits>,
}

/// Output a result in the selected format.
pub fn output_result<T: Serialize + HumanOutput>(
    message: &str,
    result: &T,
    args: &MenagerieArgs,
) -> Result<()> {
    match args.output_format {
        OutputFormat::Human => {
            if args.verbosity() > 0 {
                println!("{message}");
                println!();
            }
            result.print_human();
            Ok(())
        }
        OutputFormat::Json => output_json(result, args),
    }
}

fn output_json<T: Serialize>(result: &T, args: &MenagerieArgs) -> Result<()> {
    let json = if args.pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };
    println!("{json}");
    Ok(())
}

impl HumanOutput for CollectionsCreated {
    fn print_human(&self) {
        for c in &self.collections {
            let state = if c.created { "created" } else { "exists" };
            println!("{:<16} {:<5} {:>5} dims  {state}", c.collection, c.model, c.dimension);
        }
    }
}

impl HumanOutput for CollectionDeleted {
    fn print_human(&self) {
        println!("Deleted: {}", self.collection);
    }
}

impl HumanOutput for CollectionList {
    fn print_human(&self) {
        if self.collections.is_empty() {
            println!("No collections.");
            return;
        }
        println!("Collections:");
        println!("════════════");
        for c in &self.collections {
            let model = c.model.map(|m| m.as_str()).unwrap_or("-");
            println!("{:<16} {model:<5} {} point(s)", c.name, c.points);
        }
    }
}

impl HumanOutput for UpsertSummary {
    fn print_human(&self) {
        for report in &self.reports {
            println!(
                "{}: {}/{} upserted",
                report.collection,
                report.upserted,
                report.total()
            );
            for failure in &report.failures {
                println!("  failed {}: {}", failure.value, failure.error);
            }
        }
    }
}

impl HumanOutput for SearchResults {
    fn print_human(&self) {
        for group in &self.results {
            println!("Results from {}:", group.collection);
            println!("═══════════════");
            if group.hits.is_empty() {
                println!("No results found.");
            }
            for (i, hit) in group.hits.iter().enumerate() {
                println!();
                println!("Result {}: (Similarity: {:.4})", i + 1, hit.score);
                println!("─────────────");
                println!("Filename: {}", hit.filename().unwrap_or("-"));
                if let Some(category) = hit.payload_str("category") {
                    println!("Category: {category}");
                }
            }
            println!();
        }
    }
}

impl HumanOutput for DownloadReport {
    fn print_human(&self) {
        for path in &self.downloaded {
            println!("Downloaded {}", path.display());
        }
        for (key, error) in &self.failed {
            println!("Failed {key}: {error}");
        }
        println!(
            "{} downloaded, {} failed",
            self.downloaded.len(),
            self.failed.len()
        );
    }
}
