use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "zuri", about = concat!("zuri v", env!("CARGO_PKG_VERSION"), " - tasks in one markdown file"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Task file to use (overrides markdown_path in settings)
    #[arg(long, global = true)]
    pub file: Option<String>,

    /// Settings file to use
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List tasks with their ids and metadata
    List(ListArgs),
    /// List sections with open/total counts
    Sections,
    /// Add a section
    AddSection(AddSectionArgs),
    /// Add a task
    Add(AddArgs),
    /// Check or uncheck a task (recurring tasks roll over)
    Toggle(TaskRef),
    /// Change fields of a task
    Edit(EditArgs),
    /// Move a task within its section
    Mv(MvArgs),
    /// Show the reminders that would be armed now
    Reminders,
    /// Follow the task file: print changes and due reminders until Ctrl-C
    Watch,
    /// Show or change settings
    Config(ConfigCmd),
    /// Print the recovery log for the task file
    Recovery,
}

#[derive(Args)]
pub struct ListArgs {
    /// Only this section
    #[arg(long)]
    pub section: Option<String>,
    /// Which tasks to show (open, done, all)
    #[arg(long, default_value = "open")]
    pub filter: String,
}

#[derive(Args)]
pub struct AddSectionArgs {
    /// Section name
    pub name: String,
}

#[derive(Args)]
pub struct AddArgs {
    /// Section to add to (default: first section, or Inbox)
    #[arg(long)]
    pub section: Option<String>,
    /// Task title
    #[arg(required = true, num_args = 1..)]
    pub title: Vec<String>,
}

#[derive(Args)]
pub struct TaskRef {
    /// Section name
    pub section: String,
    /// Task id (`Section::N`) or index N
    pub id: String,
}

#[derive(Args)]
pub struct EditArgs {
    #[command(flatten)]
    pub task: TaskRef,
    /// New title
    #[arg(long)]
    pub title: Option<String>,
    /// Mark done
    #[arg(long, conflicts_with = "undone")]
    pub done: bool,
    /// Mark not done
    #[arg(long)]
    pub undone: bool,
    /// Priority (P0-P3, or none)
    #[arg(long)]
    pub priority: Option<String>,
    /// Effort (XS, S, M, L, XL, or none)
    #[arg(long)]
    pub effort: Option<String>,
    /// Due date (YYYY-MM-DD, or none)
    #[arg(long)]
    pub due: Option<String>,
    /// Recurrence (daily, weekdays, weekly, monthly, every N days, or none)
    #[arg(long)]
    pub recur: Option<String>,
}

#[derive(Args)]
pub struct MvArgs {
    /// Section name
    pub section: String,
    /// Current position (0-indexed)
    pub from: usize,
    /// New position (0-indexed)
    pub to: usize,
}

#[derive(Args)]
pub struct ConfigCmd {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective settings
    Show,
    /// Set one setting
    Set(ConfigSetArgs),
}

#[derive(Args)]
pub struct ConfigSetArgs {
    /// markdown_path, notification_time, features.notifications or features.recurring
    pub key: String,
    pub value: String,
}
