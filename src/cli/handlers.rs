use std::path::Path;

use crate::cli::commands::{Cli, Commands, InitArgs, ListArgs};
use crate::io::config_io::{self, ConfigError};
use crate::io::paths::AppDirs;
use crate::io::records::RecordStore;
use crate::remote::source::RemoteSource;

/// Dispatch a parsed CLI to its handler.
pub fn dispatch(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let root = cli.config_dir.as_deref().map(Path::new);
    let dirs = AppDirs::resolve(root);
    match cli.command {
        Some(Commands::Init(args)) => cmd_init(&dirs, args),
        Some(Commands::Check) => cmd_check(&dirs),
        Some(Commands::List(args)) => cmd_list(&dirs, args, cli.json),
        None => unreachable!("the TUI path is handled in main"),
    }
}

fn cmd_init(dirs: &AppDirs, args: InitArgs) -> Result<(), Box<dyn std::error::Error>> {
    let path = config_io::scaffold(dirs, args.force)?;
    println!("initialized {}", path.display());
    println!("panel stores under {}", dirs.data_dir.display());
    Ok(())
}

fn cmd_check(dirs: &AppDirs) -> Result<(), Box<dyn std::error::Error>> {
    let config = config_io::read_config(dirs)?;
    let problems = config_io::check_stores(dirs, &config);
    if problems.is_empty() {
        println!("ok: {} panel(s)", config.panels.len());
        Ok(())
    } else {
        for problem in &problems {
            eprintln!("problem: {}", problem);
        }
        Err(format!("{} problem(s) found", problems.len()).into())
    }
}

fn cmd_list(dirs: &AppDirs, args: ListArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = config_io::read_config(dirs)?;
    let panels: Vec<_> = match &args.panel {
        Some(id) => {
            let panel = config
                .panels
                .iter()
                .find(|p| &p.id == id)
                .ok_or_else(|| ConfigError::Invalid(format!("no panel '{}'", id)))?;
            vec![panel]
        }
        None => config.panels.iter().collect(),
    };

    let mut out = Vec::new();
    for panel in panels {
        let store = RecordStore::new(dirs.store_file(&panel.file));
        let mut items = store.fetch_all()?;
        if !args.all {
            items.retain(|i| !i.fields.done);
        }
        items.sort_by(|a, b| {
            a.group
                .cmp(&b.group)
                .then(a.order.partial_cmp(&b.order).unwrap_or(std::cmp::Ordering::Equal))
        });
        out.push((panel, items));
    }

    if json {
        let value: Vec<serde_json::Value> = out
            .iter()
            .map(|(panel, items)| {
                serde_json::json!({
                    "panel": panel.id,
                    "rows": items
                        .iter()
                        .map(|i| {
                            serde_json::json!({
                                "id": i.remote_id,
                                "group": i.group,
                                "order": i.order,
                                "title": i.fields.title,
                                "done": i.fields.done,
                                "due": i.fields.due_date,
                            })
                        })
                        .collect::<Vec<_>>(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    for (panel, items) in out {
        println!("{} ({})", panel.title, items.len());
        for item in items {
            let marker = if item.fields.done { "x" } else { " " };
            let due = item
                .fields
                .due_date
                .map(|d| format!("  due {}", d))
                .unwrap_or_default();
            let group = if item.group.is_empty() {
                String::new()
            } else {
                format!("  [{}]", item.group)
            };
            println!("  [{}] {}{}{}", marker, item.fields.title, group, due);
        }
    }
    Ok(())
}
