mod init;
pub use init::cmd_init;

use std::path::PathBuf;
use std::time::Duration;

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::io::config_io;
use crate::io::file_store::FileStore;
use crate::io::storage::{DurableStore, MemoryStore};
use crate::model::config::{Backend, Config};
use crate::model::filter::Filter;
use crate::model::task::{Task, TaskId};
use crate::ops::reorder::DragResult;
use crate::ops::task_ops::TaskStore;

type HandlerResult = Result<(), Box<dyn std::error::Error>>;

/// A hydrated task store plus the config it was opened with
struct Session {
    tasks: TaskStore<Box<dyn DurableStore>>,
    config: Config,
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> HandlerResult {
    let json = cli.json;
    let data_dir = cli.data_dir;

    match cli.command {
        Commands::Init(args) => cmd_init(args, data_dir.as_deref()),
        Commands::Add(args) => cmd_add(args, open_session(data_dir.as_deref())?, json),
        Commands::Toggle(args) => cmd_toggle(args, open_session(data_dir.as_deref())?, json),
        Commands::Rm(args) => cmd_rm(args, open_session(data_dir.as_deref())?, json),
        Commands::List(args) => cmd_list(args, open_session(data_dir.as_deref())?, json),
        Commands::Mv(args) => cmd_mv(args, open_session(data_dir.as_deref())?, json),
        Commands::Watch(args) => cmd_watch(args, open_session(data_dir.as_deref())?, json),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn resolve_data_dir(explicit: Option<&str>) -> Result<PathBuf, Box<dyn std::error::Error>> {
    match explicit {
        Some(dir) => {
            let dir = PathBuf::from(dir);
            if !dir.is_dir() {
                return Err(format!("data directory '{}' does not exist", dir.display()).into());
            }
            Ok(dir)
        }
        None => Ok(config_io::discover_data_dir(&std::env::current_dir()?)?),
    }
}

/// Find the data directory, read its config, open the configured store
/// and hydrate the task list.
fn open_session(explicit: Option<&str>) -> Result<Session, Box<dyn std::error::Error>> {
    let data_dir = resolve_data_dir(explicit)?;
    let config = config_io::read_config(&data_dir)?;

    let store: Box<dyn DurableStore> = match config.storage.backend {
        Backend::File => Box::new(FileStore::with_lock_timeout(
            &data_dir,
            Duration::from_millis(config.storage.lock_timeout_ms),
        )?),
        Backend::Memory => Box::new(MemoryStore::new()),
    };
    tracing::debug!(dir = %data_dir.display(), backend = ?config.storage.backend, "opened task list");

    let mut tasks = TaskStore::new(store);
    tasks.hydrate();
    Ok(Session { tasks, config })
}

fn resolve_task_id(tasks: &TaskStore<Box<dyn DurableStore>>, id: &str) -> Result<TaskId, String> {
    tasks
        .resolve_id(id)
        .ok_or_else(|| format!("no task with a unique id matching '{}'", id))
}

fn find_task<'a>(tasks: &'a TaskStore<Box<dyn DurableStore>>, id: &TaskId) -> Option<&'a Task> {
    tasks.tasks().iter().find(|t| &t.id == id)
}

fn print_view(tasks: &TaskStore<Box<dyn DurableStore>>, json: bool) -> HandlerResult {
    let view = tasks.filtered_tasks();
    if json {
        let out = ListJson {
            tasks: tasks.tasks(),
            filter: tasks.filter(),
            filtered_tasks: view,
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("{}", format_task_list(&view, tasks.filter()));
    }
    Ok(())
}

fn print_task(verb: &str, task: &Task, json: bool) -> HandlerResult {
    if json {
        println!("{}", serde_json::to_string_pretty(task)?);
    } else {
        println!("{}", format_task_line(verb, task));
    }
    Ok(())
}

fn view_filter(explicit: Option<Filter>, config: &Config) -> Filter {
    explicit.unwrap_or(config.list.default_filter)
}

// ---------------------------------------------------------------------------
// Write command handlers
// ---------------------------------------------------------------------------

fn cmd_add(args: AddArgs, mut session: Session, json: bool) -> HandlerResult {
    let text = args.text.join(" ");
    let Some(id) = session.tasks.add_task(&text) else {
        return Ok(());
    };
    match find_task(&session.tasks, &id) {
        Some(task) => print_task("added", task, json),
        None => Ok(()),
    }
}

fn cmd_toggle(args: IdArgs, mut session: Session, json: bool) -> HandlerResult {
    let id = resolve_task_id(&session.tasks, &args.id)?;
    session.tasks.toggle_task(&id);
    match find_task(&session.tasks, &id) {
        Some(task) => {
            let verb = if task.completed { "completed" } else { "reopened" };
            print_task(verb, task, json)
        }
        None => Ok(()),
    }
}

fn cmd_rm(args: IdArgs, mut session: Session, json: bool) -> HandlerResult {
    let id = resolve_task_id(&session.tasks, &args.id)?;
    let removed = find_task(&session.tasks, &id).cloned();
    session.tasks.delete_task(&id);
    match removed {
        Some(task) => print_task("deleted", &task, json),
        None => Ok(()),
    }
}

fn cmd_mv(args: MvArgs, mut session: Session, json: bool) -> HandlerResult {
    let filter = view_filter(args.filter, &session.config);
    session.tasks.set_filter(filter);

    if args.from == 0 || args.to == 0 {
        return Err("positions start at 1".into());
    }
    let drag = DragResult::new(args.from - 1, args.to - 1);
    if !session.tasks.reorder(drag) {
        return Err(format!("no task at position {} in the {} view", args.from, filter).into());
    }
    print_view(&session.tasks, json)
}

// ---------------------------------------------------------------------------
// Read command handlers
// ---------------------------------------------------------------------------

fn cmd_list(args: ViewArgs, mut session: Session, json: bool) -> HandlerResult {
    let filter = view_filter(args.filter, &session.config);
    session.tasks.set_filter(filter);
    print_view(&session.tasks, json)
}

/// Print the view, then re-print it every time another process changes the
/// task list. Runs until interrupted.
fn cmd_watch(args: ViewArgs, mut session: Session, json: bool) -> HandlerResult {
    let filter = view_filter(args.filter, &session.config);
    session.tasks.set_filter(filter);
    let interval = Duration::from_millis(session.config.watch.poll_interval_ms.max(1));

    print_view(&session.tasks, json)?;
    loop {
        if session.tasks.wait_external(interval) {
            if !json {
                println!();
            }
            print_view(&session.tasks, json)?;
        }
    }
}
