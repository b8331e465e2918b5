use crate::config::Config;
use anyhow::{anyhow, Context, Result};
use canopy_dom::{MemoryDom, NodeId, RenderTree};
use canopy_overlay::reindex::full_resync;
use canopy_overlay::{OverlayConfig, Registry, Tagged};
use clap::Args;
use colored::Colorize;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// HTML fixture to inspect
    pub fixture: PathBuf,

    /// Only report this structure (defaults to `defaultStruct` from config)
    #[arg(short, long = "struct")]
    pub structure: Option<String>,

    /// Recompute addresses from the tree shape before reporting
    #[arg(long)]
    pub resync: bool,

    /// Exit with an error when addresses have gaps or duplicates
    #[arg(long)]
    pub check: bool,

    /// Config file (defaults to canopy.config.json in the working directory)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Sibling groups whose indices are not exactly `0..n`
pub fn address_issues(tagged: &[Tagged<NodeId>]) -> Vec<String> {
    let mut groups: BTreeMap<(String, String), Vec<u32>> = BTreeMap::new();
    for entry in tagged {
        let (Some(structure), Some(index)) = (&entry.structure, entry.path.last_index()) else {
            continue;
        };
        groups
            .entry((structure.clone(), entry.path.parent().to_string()))
            .or_default()
            .push(index);
    }

    let mut issues = Vec::new();
    for ((structure, parent), mut indices) in groups {
        indices.sort_unstable();
        let scope = if parent.is_empty() {
            format!("{} (roots)", structure)
        } else {
            format!("{} under {}", structure, parent)
        };
        for pair in indices.windows(2) {
            if pair[0] == pair[1] {
                issues.push(format!("{}: duplicate index {}", scope, pair[0]));
            }
        }
        let mut expected = 0;
        for &index in &indices {
            for missing in expected..index {
                issues.push(format!("{}: missing index {}", scope, missing));
            }
            expected = expected.max(index + 1);
        }
    }
    issues
}

fn print_table(dom: &MemoryDom, config: &OverlayConfig, tagged: &[Tagged<NodeId>]) {
    let width = tagged
        .iter()
        .map(|t| t.path.to_string().len() + t.path.depth() * 2)
        .max()
        .unwrap_or(0)
        .max("ADDRESS".len());

    println!(
        "{:<width$}  {:<16} {:<10} {:<10} {}",
        "ADDRESS".bold(),
        "STRUCT".bold(),
        "TAG".bold(),
        "ALIAS".bold(),
        "TEXT KEY".bold(),
        width = width
    );
    for entry in tagged {
        let indent = "  ".repeat(entry.path.depth().saturating_sub(1));
        let address = format!("{}{}", indent, entry.path);
        println!(
            "{:<width$}  {:<16} {:<10} {:<10} {}",
            address.cyan(),
            entry.structure.as_deref().unwrap_or("-"),
            dom.tag_name(&entry.node),
            entry.alias.as_ref().map(|a| a.to_string()).unwrap_or_else(|| "-".to_string()),
            dom.attribute(&entry.node, &config.attributes.text_key)
                .unwrap_or_else(|| "-".to_string()),
            width = width
        );
    }
}

pub fn inspect(args: InspectArgs, cwd: &str) -> Result<()> {
    let config = match &args.config {
        Some(path) => Config::load_file(path)?,
        None => Config::load(cwd)?,
    };
    let structure = args.structure.or(config.default_struct);

    let markup = fs::read_to_string(&args.fixture)
        .with_context(|| format!("Cannot read fixture {}", args.fixture.display()))?;
    let mut dom = MemoryDom::from_markup(&markup).context("Cannot parse fixture")?;
    let overlay = config.overlay;

    println!("🔍 {} {}", "Inspecting".green().bold(), args.fixture.display());

    if args.resync {
        let targets = match &structure {
            Some(s) => vec![s.clone()],
            None => {
                let mut all: Vec<String> = Registry::new(&overlay)
                    .all_tagged(&dom, None)
                    .into_iter()
                    .filter_map(|t| t.structure)
                    .collect();
                all.sort();
                all.dedup();
                all
            }
        };
        for target in targets {
            let rewritten = full_resync(&mut dom, &overlay, &target);
            println!("   Resynced {}: {} addresses rewritten", target.bold(), rewritten);
        }
    }
    println!();

    let tagged = Registry::new(&overlay).all_tagged(&dom, structure.as_deref());
    if tagged.is_empty() {
        println!("{}", "⚠️  No tagged elements found".yellow());
        return Ok(());
    }
    print_table(&dom, &overlay, &tagged);

    let issues = address_issues(&tagged);
    println!();
    if issues.is_empty() {
        println!("✨ {} {} tagged elements, addresses contiguous", "Done".green().bold(), tagged.len());
        return Ok(());
    }

    for issue in &issues {
        println!("   {} {}", "✗".red(), issue);
    }
    println!("   {} {}", "Issues:".red(), issues.len());

    if args.check {
        return Err(anyhow!("{} address issues found", issues.len()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tagged(markup: &str) -> Vec<Tagged<NodeId>> {
        let dom = MemoryDom::from_markup(markup).unwrap();
        let config = OverlayConfig::default();
        Registry::new(&config).all_tagged(&dom, None)
    }

    #[test]
    fn test_contiguous_addresses_have_no_issues() {
        let entries = tagged(
            r#"<ul data-qs-struct="page" data-qs-node="0">
                <li data-qs-struct="page" data-qs-node="0.0">A</li>
                <li data-qs-struct="page" data-qs-node="0.1">B</li>
            </ul>"#,
        );
        assert!(address_issues(&entries).is_empty());
    }

    #[test]
    fn test_gaps_and_duplicates_are_reported() {
        let entries = tagged(
            r#"<ul data-qs-struct="page" data-qs-node="0">
                <li data-qs-struct="page" data-qs-node="0.0">A</li>
                <li data-qs-struct="page" data-qs-node="0.0">B</li>
                <li data-qs-struct="page" data-qs-node="0.3">C</li>
            </ul>"#,
        );
        let issues = address_issues(&entries);
        assert_eq!(
            issues,
            vec![
                "page under 0: duplicate index 0".to_string(),
                "page under 0: missing index 1".to_string(),
                "page under 0: missing index 2".to_string(),
            ]
        );
    }

    #[test]
    fn test_structures_are_checked_separately() {
        let entries = tagged(
            r#"<header data-qs-struct="menu" data-qs-node="0"></header>
               <main data-qs-struct="page" data-qs-node="0"></main>"#,
        );
        assert!(address_issues(&entries).is_empty());
    }
}
