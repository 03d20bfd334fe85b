use std::path::Path;

use anyhow::{bail, Context};
use colored::Colorize;
use objdiff_core::{render_text, ChangeKind, DiffConfig, Differ, DisplayEntry, ReplayMode};
use objdiff_persist::{InMemoryWorkspace, PersistCall, RecordingSink, SnapshotCollector};
use objdiff_types::{display_value, ObjectId, ObjectRecord, Snapshot};
use tracing::debug;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Diff(args) => cmd_diff(args, &cli.format),
        Command::Tree(args) => cmd_tree(args, &cli.format),
        Command::Replay(args) => cmd_replay(args, &cli.format),
        Command::Normalize(args) => cmd_normalize(args),
    }
}

fn load_snapshot(path: &Path) -> anyhow::Result<Snapshot> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading snapshot {}", path.display()))?;
    let snapshot = Snapshot::from_json_str(&text)
        .with_context(|| format!("parsing snapshot {}", path.display()))?;
    debug!(
        path = %path.display(),
        objects = snapshot.objects.len(),
        properties = snapshot.properties.len(),
        "snapshot loaded"
    );
    Ok(snapshot)
}

fn load_config(path: Option<&Path>) -> anyhow::Result<DiffConfig> {
    match path {
        Some(path) => Ok(DiffConfig::load(path)?),
        None => Ok(DiffConfig::default()),
    }
}

fn compute(pair: &SnapshotPair) -> anyhow::Result<(Snapshot, Snapshot, Differ)> {
    let old = load_snapshot(&pair.old)?;
    let new = load_snapshot(&pair.new)?;
    let differ = Differ::diff(&old, &new)?;
    Ok((old, new, differ))
}

fn parent_label(record: &ObjectRecord) -> &str {
    record.parent().map(ObjectId::as_str).unwrap_or("<none>")
}

/// One line per removal, addition and property change, in replay order.
fn describe_changes(differ: &Differ) -> anyhow::Result<Vec<String>> {
    let mut lines = Vec::new();
    for record in differ.to_remove() {
        lines.push(format!(
            "- {} {} (from {})",
            record.simple_type(),
            record.id,
            parent_label(record)
        ));
    }
    for record in differ.replay_order()? {
        lines.push(format!(
            "+ {} {} (under {}, index {})",
            record.simple_type(),
            record.id,
            parent_label(record),
            record.sibling_index
        ));
    }
    for change in differ.property_changes() {
        lines.push(format!(
            "~ {}.{}: {} -> {}",
            change.object_id,
            change.name,
            display_value(change.data_type, &change.old_value),
            display_value(change.data_type, &change.new_value)
        ));
    }
    Ok(lines)
}

fn colorize_change(line: &str) -> String {
    match line.chars().next() {
        Some('-') => line.red().to_string(),
        Some('+') => line.green().to_string(),
        Some('~') => line.yellow().to_string(),
        _ => line.to_string(),
    }
}

fn cmd_diff(args: DiffArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let pair = &args.snapshots;
    let (_, _, mut differ) = compute(pair)?;

    if let Some(workspace) = &args.omit_root {
        let new_root = args.new_root.as_deref().map(ObjectId::new);
        if !differ.omit_root_object(&ObjectId::new(workspace.as_str()), new_root.as_ref())? {
            eprintln!("{} no added root under {}", "warning:".yellow().bold(), workspace);
        }
    }
    differ.sort_for_replay()?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(differ.change_set())?);
        }
        OutputFormat::Text => {
            if differ.change_set().is_empty() {
                println!("{} snapshots are identical", "✓".green().bold());
                return Ok(());
            }
            for line in describe_changes(&differ)? {
                println!("{}", colorize_change(&line));
            }
            println!(
                "\n{} removed, {} added, {} property changes",
                differ.to_remove().len().to_string().red(),
                differ.to_add().len().to_string().green(),
                differ.property_changes().len().to_string().yellow()
            );
        }
    }
    Ok(())
}

fn display_entries(args: &TreeArgs) -> anyhow::Result<Vec<DisplayEntry>> {
    let config = load_config(args.snapshots.config.as_deref())?;
    let root = match (&args.root, &config.root_id) {
        (Some(root), _) => ObjectId::new(root.as_str()),
        (None, Some(root)) => root.clone(),
        (None, None) => bail!("no display root: pass --root or set root_id in the config"),
    };
    let (_, _, differ) = compute(&args.snapshots)?;
    Ok(differ.display_tree(&root, &config.interesting_properties)?)
}

fn cmd_tree(args: TreeArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let entries = display_entries(&args)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        OutputFormat::Text => {
            if entries.is_empty() {
                println!("No changes below the root.");
            }
            for entry in &entries {
                let text = render_text(std::slice::from_ref(entry));
                let text = text.trim_end();
                let line = match entry.kind {
                    ChangeKind::LeftOnly => text.red(),
                    ChangeKind::RightOnly => text.green(),
                    ChangeKind::Modified => text.yellow(),
                    ChangeKind::Same => text.normal(),
                };
                println!("{line}");
            }
        }
    }
    Ok(())
}

fn cmd_replay(args: ReplayArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let config = load_config(args.snapshots.config.as_deref())?;
    let mode = if args.conditional {
        ReplayMode::Conditional
    } else {
        config.replay_mode
    };
    let (old, new, differ) = compute(&args.snapshots)?;

    if args.show_ops {
        let sink = RecordingSink::new();
        differ.persist_to(&sink, mode)?;
        let calls = sink.into_calls();
        match format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&calls)?),
            OutputFormat::Text => {
                for call in &calls {
                    println!("{}", describe_call(call));
                }
            }
        }
        return Ok(());
    }

    let workspace = InMemoryWorkspace::from_snapshot(&old);
    let stats = differ.persist_to(&workspace, mode)?;
    let expected = InMemoryWorkspace::from_snapshot(&new).snapshot();
    let converged = workspace.snapshot() == expected;

    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({ "stats": stats, "converged": converged })
        ),
        OutputFormat::Text => {
            println!(
                "Replayed {} removals, {} additions, {} property changes",
                stats.removed, stats.added, stats.properties
            );
            if converged {
                println!("{} workspace matches the new snapshot", "✓".green().bold());
            } else {
                println!("{} workspace differs from the new snapshot", "✗".red().bold());
            }
        }
    }
    if !converged {
        bail!("replayed workspace does not match {}", args.snapshots.new.display());
    }
    Ok(())
}

fn describe_call(call: &PersistCall) -> String {
    match call {
        PersistCall::Begin => "begin".bold().to_string(),
        PersistCall::Commit => "commit".bold().to_string(),
        PersistCall::Rollback => "rollback".red().bold().to_string(),
        PersistCall::AddObject { parent_id, type_tag, id, sibling_index } => format!(
            "  {} {} {} under {} at {}",
            "add".green(),
            type_tag,
            id,
            parent_id.as_ref().map(ObjectId::as_str).unwrap_or("<none>"),
            sibling_index
        ),
        PersistCall::RemoveObject { parent_id, id } => format!(
            "  {} {} from {}",
            "remove".red(),
            id,
            parent_id.as_ref().map(ObjectId::as_str).unwrap_or("<none>")
        ),
        PersistCall::SetProperty { id, name, data_type, old_value, new_value } => {
            let new = display_value(*data_type, new_value);
            match old_value {
                Some(old) => format!(
                    "  {} {}.{} = {} (was {})",
                    "set".yellow(),
                    id,
                    name,
                    new,
                    display_value(*data_type, old)
                ),
                None => format!("  {} {}.{} = {}", "set".yellow(), id, name, new),
            }
        }
    }
}

fn cmd_normalize(args: NormalizeArgs) -> anyhow::Result<()> {
    let snapshot = load_snapshot(&args.snapshot)?;
    let workspace = InMemoryWorkspace::from_snapshot(&snapshot);
    let collector = SnapshotCollector::new();
    workspace.export_to(&collector)?;
    let json = collector.into_snapshot().to_json_string()?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, json + "\n")
                .with_context(|| format!("writing {}", path.display()))?;
            println!("{} wrote {}", "✓".green().bold(), path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}
