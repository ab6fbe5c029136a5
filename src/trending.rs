//! The recent-research digest and `evh trending`.

use anyhow::{bail, Result};
use evidence_harness_core::trending::{trending_report, TrendingReport};
use tracing::debug;

use crate::app::App;

/// Digest over the `years` latest publication years, or
/// `[trending].recent_years` when not given.
pub fn trending(app: &App, years: Option<usize>) -> Result<TrendingReport> {
    let span = years.unwrap_or(app.config.trending.recent_years);
    if span == 0 {
        bail!("years must be >= 1");
    }
    let report = trending_report(&app.store, span);
    debug!(
        span,
        papers = report.papers.len(),
        new_ingredients = report.new_ingredients.len(),
        "trending digest"
    );
    Ok(report)
}

/// `evh trending`.
pub fn run_trending(app: &App, years: Option<usize>) -> Result<()> {
    let report = trending(app, years)?;
    let Some([first, last]) = report.years.filter(|_| !report.papers.is_empty()) else {
        println!("No new research papers found in the corpus.");
        return Ok(());
    };

    println!("What's new in research ({} to {})", first, last);
    println!(
        "{} new studies | {} new harmful ingredients | {} study designs | {} funding sources",
        report.papers.len(),
        report.new_ingredients.len(),
        report.study_designs.len(),
        report.funding_sources.len()
    );

    for paper in &report.papers {
        println!();
        println!("{}  {}", paper.document, paper.title);
        println!(
            "    {} | {} | {}",
            paper.authors.as_deref().unwrap_or("Various Authors"),
            paper.publication_type.as_deref().unwrap_or("Research Paper"),
            paper.year.as_deref().unwrap_or("Recent")
        );
        if let Some(findings) = &paper.key_findings {
            println!("    Key findings: {}", findings);
        }
        if !paper.tags.is_empty() {
            let tags: Vec<String> = paper.tags.iter().map(|t| format!("[{}]", t.text)).collect();
            println!("    {}", tags.join(" "));
        }
    }

    if !report.new_ingredients.is_empty() {
        println!();
        println!("New harmful ingredients:");
        for ingredient in &report.new_ingredients {
            println!("  {} ({})", ingredient.name, ingredient.titles.join("; "));
            if let Some(impact) = &ingredient.health_impact {
                println!("    health impact: {}", impact);
            }
        }
    }

    for group in &report.health_findings {
        println!();
        println!("{}:", group.category.replace('_', " "));
        for finding in &group.findings {
            println!("  {}: {}", finding.title, finding.description);
        }
    }
    Ok(())
}
