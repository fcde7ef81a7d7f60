use std::path::PathBuf;
use std::str::FromStr;

use chrono::{Local, NaiveDate};
use tokio::runtime::Runtime;

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::io::config_io;
use crate::io::doc_io;
use crate::io::recovery::read_recovery_log;
use crate::io::store::{StoreEvent, TaskStore};
use crate::model::config::Settings;
use crate::model::document::{DEFAULT_SECTION, Document, TaskFilter};
use crate::model::task::{Effort, Priority, Recur, Task, parse_date};
use crate::ops::reminders::plan_reminders;
use crate::ops::task_ops::{Mutation, Patch, TaskPatch, single_line};

type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Resolved global options shared by every command.
struct Context {
    settings_path: PathBuf,
    settings: Settings,
    file: Option<PathBuf>,
    json: bool,
}

impl Context {
    fn from_cli(cli: &Cli) -> Result<Context, Box<dyn std::error::Error>> {
        let settings_path = match &cli.config {
            Some(path) => PathBuf::from(path),
            None => config_io::settings_path()?,
        };
        let settings = config_io::load_settings(&settings_path);
        let file = cli
            .file
            .as_ref()
            .map(PathBuf::from)
            .or_else(|| settings.markdown_path.clone());
        Ok(Context {
            settings_path,
            settings,
            file,
            json: cli.json,
        })
    }

    fn file(&self) -> Result<PathBuf, Box<dyn std::error::Error>> {
        self.file.clone().ok_or_else(|| {
            "no task file: pass --file or run `zuri config set markdown_path <path>`".into()
        })
    }

    fn store(&self) -> Result<TaskStore, Box<dyn std::error::Error>> {
        Ok(TaskStore::new(self.file()?, self.settings.clone()))
    }

    fn load(&self) -> Result<Document, Box<dyn std::error::Error>> {
        Ok(doc_io::load_document(&self.file()?)?)
    }
}

fn runtime() -> Result<Runtime, Box<dyn std::error::Error>> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> CmdResult {
    let ctx = Context::from_cli(&cli)?;

    match cli.command {
        // Read commands
        Commands::List(args) => cmd_list(args, &ctx),
        Commands::Sections => cmd_sections(&ctx),
        Commands::Reminders => cmd_reminders(&ctx),
        Commands::Recovery => cmd_recovery(&ctx),

        // Write commands
        Commands::AddSection(args) => cmd_add_section(args, &ctx),
        Commands::Add(args) => cmd_add(args, &ctx),
        Commands::Toggle(args) => cmd_toggle(args, &ctx),
        Commands::Edit(args) => cmd_edit(args, &ctx),
        Commands::Mv(args) => cmd_mv(args, &ctx),

        Commands::Watch => cmd_watch(&ctx),
        Commands::Config(cmd) => match cmd.action {
            ConfigAction::Show => cmd_config_show(&ctx),
            ConfigAction::Set(args) => cmd_config_set(args, &ctx),
        },
    }
}

// ---------------------------------------------------------------------------
// Read commands
// ---------------------------------------------------------------------------

fn cmd_list(args: ListArgs, ctx: &Context) -> CmdResult {
    let filter: TaskFilter = args.filter.parse()?;
    let doc = ctx.load()?;
    let today = today();

    let sections: Vec<_> = match &args.section {
        Some(name) => vec![
            doc.section(name)
                .ok_or_else(|| format!("section not found: {}", name))?,
        ],
        None => doc.sections.iter().collect(),
    };

    if ctx.json {
        let results: Vec<_> = sections
            .iter()
            .map(|s| section_to_json(s, &s.filtered_on(filter, today), today))
            .collect();
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        let blocks: Vec<String> = sections
            .iter()
            .map(|s| format_section(s, &s.filtered_on(filter, today), today))
            .collect();
        if !blocks.is_empty() {
            println!("{}", blocks.join("\n\n"));
        }
    }
    Ok(())
}

fn cmd_sections(ctx: &Context) -> CmdResult {
    let doc = ctx.load()?;
    let today = today();
    let counts: Vec<_> = doc.sections.iter().map(|s| section_counts(s, today)).collect();

    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&counts)?);
    } else {
        for c in &counts {
            println!("{}  {}/{}", c.name, c.open, c.total);
        }
    }
    Ok(())
}

fn cmd_reminders(ctx: &Context) -> CmdResult {
    if !ctx.settings.features.notifications {
        if ctx.json {
            println!("[]");
        } else {
            println!("notifications are off");
        }
        return Ok(());
    }
    let doc = ctx.load()?;
    let reminders = plan_reminders(&doc, ctx.settings.notification_time, Local::now().naive_local());

    if ctx.json {
        let results: Vec<_> = reminders.iter().map(reminder_to_json).collect();
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        for reminder in &reminders {
            println!("{}", format_reminder(reminder));
        }
    }
    Ok(())
}

fn cmd_recovery(ctx: &Context) -> CmdResult {
    match read_recovery_log(&ctx.file()?)? {
        Some(log) => print!("{}", log),
        None => eprintln!("no recovery log"),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Write commands
// ---------------------------------------------------------------------------

/// Accept either a full `Section::N` id or a bare index.
fn resolve_task_id(section: &str, id: &str) -> String {
    if id.parse::<usize>().is_ok() {
        format!("{}::{}", section, id)
    } else {
        id.to_string()
    }
}

/// Look up a task before mutating, so unknown targets are reported instead
/// of silently ignored.
fn require_task(ctx: &Context, task: &TaskRef) -> Result<String, Box<dyn std::error::Error>> {
    let doc = ctx.load()?;
    let section = doc
        .section(&task.section)
        .ok_or_else(|| format!("section not found: {}", task.section))?;
    let id = resolve_task_id(&section.name, &task.id);
    if section.position_of(&id).is_none() {
        return Err(format!("task not found: {}", id).into());
    }
    Ok(id)
}

fn print_task(doc: &Document, section: &str, id: &str, json: bool) -> CmdResult {
    let task = doc
        .section(section)
        .and_then(|s| s.tasks.iter().find(|t| t.id == id))
        .ok_or_else(|| format!("task not found: {}", id))?;
    print_one(task, json)
}

fn print_one(task: &Task, json: bool) -> CmdResult {
    let today = today();
    if json {
        println!("{}", serde_json::to_string_pretty(&task_to_json(task, today))?);
    } else {
        println!("{}", format_task(task, today).trim_start());
    }
    Ok(())
}

fn cmd_add_section(args: AddSectionArgs, ctx: &Context) -> CmdResult {
    let name = single_line(&args.name);
    if name.is_empty() {
        return Err("section name is empty".into());
    }
    let store = ctx.store()?;
    runtime()?.block_on(store.mutate(Mutation::AddSection { name: name.clone() }))?;
    println!("{}", name);
    Ok(())
}

fn cmd_add(args: AddArgs, ctx: &Context) -> CmdResult {
    let section = match args.section {
        Some(section) => single_line(&section),
        None => ctx
            .load()?
            .resolve_section(None)
            .unwrap_or(DEFAULT_SECTION)
            .to_string(),
    };
    if section.is_empty() {
        return Err("section name is empty".into());
    }
    let title = args.title.join(" ");

    let store = ctx.store()?;
    let doc = runtime()?.block_on(store.mutate(Mutation::AddTask {
        section: section.clone(),
        title,
    }))?;
    let task = doc
        .section(&section)
        .and_then(|s| s.tasks.last())
        .ok_or_else(|| format!("section not found: {}", section))?;

    if ctx.json {
        print_one(task, true)
    } else {
        println!("{}", task.id);
        Ok(())
    }
}

fn cmd_toggle(args: TaskRef, ctx: &Context) -> CmdResult {
    let id = require_task(ctx, &args)?;
    let store = ctx.store()?;
    let doc = runtime()?.block_on(store.mutate(Mutation::ToggleTask {
        section: args.section.clone(),
        task_id: id.clone(),
    }))?;
    print_task(&doc, &args.section, &id, ctx.json)
}

fn parse_patch<T>(value: Option<&str>, what: &str, parse: impl Fn(&str) -> Option<T>) -> Result<Patch<T>, String> {
    match value {
        None => Ok(Patch::Keep),
        Some("none") => Ok(Patch::Clear),
        Some(v) => parse(v)
            .map(Patch::Set)
            .ok_or_else(|| format!("invalid {}: {}", what, v)),
    }
}

fn from_str_opt<T: FromStr>(s: &str) -> Option<T> {
    s.parse().ok()
}

fn cmd_edit(args: EditArgs, ctx: &Context) -> CmdResult {
    let patch = TaskPatch {
        title: args.title,
        done: match (args.done, args.undone) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        },
        priority: parse_patch(args.priority.as_deref(), "priority", from_str_opt::<Priority>)?,
        effort: parse_patch(args.effort.as_deref(), "effort", from_str_opt::<Effort>)?,
        due: parse_patch(args.due.as_deref(), "due date", parse_date)?,
        recur: parse_patch(args.recur.as_deref(), "recurrence", from_str_opt::<Recur>)?,
    };
    if patch == TaskPatch::default() {
        return Err("nothing to change (see `zuri edit --help`)".into());
    }

    let id = require_task(ctx, &args.task)?;
    let store = ctx.store()?;
    let doc = runtime()?.block_on(store.mutate(Mutation::UpdateTask {
        section: args.task.section.clone(),
        task_id: id.clone(),
        patch,
    }))?;
    print_task(&doc, &args.task.section, &id, ctx.json)
}

fn cmd_mv(args: MvArgs, ctx: &Context) -> CmdResult {
    let doc = ctx.load()?;
    let section = doc
        .section(&args.section)
        .ok_or_else(|| format!("section not found: {}", args.section))?;
    let len = section.tasks.len();
    if args.from >= len || args.to >= len {
        return Err(format!(
            "position out of range: section '{}' has {} tasks",
            args.section, len
        )
        .into());
    }

    let store = ctx.store()?;
    let doc = runtime()?.block_on(store.mutate(Mutation::ReorderTask {
        section: args.section.clone(),
        from: args.from,
        to: args.to,
    }))?;
    let section = doc
        .section(&args.section)
        .ok_or_else(|| format!("section not found: {}", args.section))?;
    let today = today();
    let tasks: Vec<&Task> = section.tasks.iter().collect();
    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&section_to_json(section, &tasks, today))?);
    } else {
        println!("{}", format_section(section, &tasks, today));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Watch
// ---------------------------------------------------------------------------

fn cmd_watch(ctx: &Context) -> CmdResult {
    let store = ctx.store()?;
    let json = ctx.json;

    runtime()?.block_on(async move {
        let mut events = store.subscribe();
        store.ensure_file().await?;
        let armed = store.reschedule().await?;
        store.start_watching().await;
        let path = store.path().await;
        tracing::info!(path = %path.display(), armed, "watching; Ctrl-C to stop");

        loop {
            tokio::select! {
                event = events.recv() => {
                    match event {
                        Ok(event) => print_event(&event, json)?,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            tracing::warn!(skipped = n, "event listener fell behind");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
                _ = tokio::signal::ctrl_c() => break,
            }
        }

        store.shutdown().await;
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

fn print_event(event: &StoreEvent, json: bool) -> CmdResult {
    if json {
        let value = match event {
            StoreEvent::Changed => serde_json::json!({ "event": "changed" }),
            StoreEvent::TaskDue { title, section } => {
                serde_json::json!({ "event": "due", "title": title, "section": section })
            }
        };
        println!("{}", serde_json::to_string(&value)?);
    } else {
        match event {
            StoreEvent::Changed => println!("changed"),
            StoreEvent::TaskDue { title, section } => println!("due: {} ({})", title, section),
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn cmd_config_show(ctx: &Context) -> CmdResult {
    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&ctx.settings)?);
    } else {
        println!("# {}", ctx.settings_path.display());
        println!("{}", format_settings(&ctx.settings));
    }
    Ok(())
}

fn cmd_config_set(args: ConfigSetArgs, ctx: &Context) -> CmdResult {
    let settings = config_io::set_setting(&ctx.settings_path, &args.key, &args.value)?;
    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&settings)?);
    } else {
        println!("{}", format_settings(&settings));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_task_id() {
        assert_eq!(resolve_task_id("Work", "2"), "Work::2");
        assert_eq!(resolve_task_id("Work", "Work::2"), "Work::2");
    }

    #[test]
    fn test_parse_patch() {
        assert_eq!(
            parse_patch(Some("P1"), "priority", from_str_opt::<Priority>),
            Ok(Patch::Set(Priority::P1))
        );
        assert_eq!(
            parse_patch(Some("none"), "priority", from_str_opt::<Priority>),
            Ok(Patch::Clear)
        );
        assert_eq!(parse_patch(None, "due date", parse_date), Ok(Patch::Keep));
        assert!(parse_patch(Some("2025-13-01"), "due date", parse_date).is_err());
    }
}
