//! SchruteBot: the productivity enforcer
//!
//! Tasks live in SQLite. A task is identified by the SHA-256 of its
//! description, so adding the same task twice is refused and completing a task
//! means naming it exactly.

use super::{Agent, AgentDescriptor, AgentError, AgentRequest};
use async_trait::async_trait;
use rand::seq::IndexedRandom;
use regex::Regex;
use rusqlite::{Connection, params};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};
use tokio::sync::Mutex;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS tasks (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    description TEXT NOT NULL,
    status      TEXT DEFAULT 'pending',
    timestamp   DATETIME DEFAULT CURRENT_TIMESTAMP,
    hash        TEXT UNIQUE
);

CREATE TABLE IF NOT EXISTS dwight_quotes (
    line_text TEXT NOT NULL
);
"#;

/// Used when the `dwight_quotes` table has not been seeded
const FALLBACK_QUOTES: &[&str] = &[
    "Whenever I'm about to do something, I think, 'Would an idiot do that?' And if they would, I do not do that thing.",
    "Identity theft is not a joke, Jim! Millions of families suffer every year.",
    "Through concentration, I can raise and lower my cholesterol at will.",
    "I am faster than 80% of all snakes.",
    "Before I do anything I ask myself, 'Would an idiot do that?'",
];

/// Seconds of reported idleness before SchruteBot stops being polite
const IDLE_THRESHOLD_SECONDS: u64 = 10;

/// Hex SHA-256 of a task description
pub fn task_hash(description: &str) -> String {
    format!("{:x}", Sha256::digest(description.as_bytes()))
}

/// A stored task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: i64,
    pub description: String,
    pub status: String,
    pub timestamp: String,
    pub hash: String,
}

/// SQLite task store with async-safe locking
///
/// Cloning shares the same connection.
#[derive(Clone)]
pub struct TaskStore {
    conn: Arc<Mutex<Connection>>,
}

impl TaskStore {
    /// Open (or create) the database at `path` and apply the schema
    pub fn open(path: &Path) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA busy_timeout=5000;")?;
        conn.execute_batch(SCHEMA)?;
        tracing::debug!(path = %path.display(), "Opened task store");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_memory() -> Result<Self, rusqlite::Error> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Insert a task; returns false when a task with the same description exists
    pub async fn add(&self, description: &str) -> Result<bool, rusqlite::Error> {
        let conn = self.conn.lock().await;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO tasks (description, hash) VALUES (?1, ?2)",
            params![description, task_hash(description)],
        )?;
        Ok(inserted > 0)
    }

    /// All tasks in insertion order
    pub async fn list(&self) -> Result<Vec<Task>, rusqlite::Error> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, description, COALESCE(status, 'pending'), COALESCE(timestamp, ''), \
             COALESCE(hash, '') FROM tasks ORDER BY id",
        )?;
        let tasks = stmt
            .query_map([], |row| {
                Ok(Task {
                    id: row.get(0)?,
                    description: row.get(1)?,
                    status: row.get(2)?,
                    timestamp: row.get(3)?,
                    hash: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    /// Mark the task with this exact description completed; false if unknown
    pub async fn complete(&self, description: &str) -> Result<bool, rusqlite::Error> {
        let conn = self.conn.lock().await;
        let updated = conn.execute(
            "UPDATE tasks SET status = 'completed' WHERE hash = ?1",
            params![task_hash(description)],
        )?;
        Ok(updated > 0)
    }

    pub async fn completed_count(&self) -> Result<i64, rusqlite::Error> {
        let conn = self.conn.lock().await;
        conn.query_row(
            "SELECT COUNT(*) FROM tasks WHERE status = 'completed'",
            [],
            |row| row.get(0),
        )
    }

    pub async fn quotes(&self) -> Result<Vec<String>, rusqlite::Error> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare("SELECT line_text FROM dwight_quotes")?;
        let quotes = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(quotes)
    }

    pub async fn add_quote(&self, line: &str) -> Result<(), rusqlite::Error> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO dwight_quotes (line_text) VALUES (?1)",
            params![line],
        )?;
        Ok(())
    }
}

/// A command parsed from free text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskCommand {
    Add(String),
    View,
    Complete(String),
    Report,
    Quote,
    Idle(u64),
    Help,
}

static MARK_COMPLETE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^mark\s+(.+?)\s+(?:as\s+)?(?:complete|completed|done)\.?$")
        .expect("mark-complete pattern is valid")
});

static IDLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^idle\s+(?:for\s+)?(\d+)").expect("idle pattern is valid")
});

impl TaskCommand {
    pub fn parse(input: &str) -> Self {
        let text = input.trim();

        if let Some(rest) = strip_command(text, &["add task", "add"]) {
            return TaskCommand::Add(clean_argument(rest));
        }
        if let Some(rest) =
            strip_command(text, &["complete task", "complete", "finish", "done with"])
        {
            return TaskCommand::Complete(clean_argument(rest));
        }
        if let Some(captures) = MARK_COMPLETE.captures(text) {
            return TaskCommand::Complete(clean_argument(&captures[1]));
        }
        if let Some(captures) = IDLE.captures(text) {
            return captures[1]
                .parse()
                .map(TaskCommand::Idle)
                .unwrap_or(TaskCommand::Help);
        }

        let lowered = text.to_lowercase();
        if lowered.contains("report") {
            TaskCommand::Report
        } else if lowered.contains("quote") || lowered.contains("dwightism") {
            TaskCommand::Quote
        } else if (lowered.contains("task")
            && ["view", "list", "show", "see", "what"]
                .iter()
                .any(|verb| lowered.contains(verb)))
            || lowered == "view"
            || lowered == "tasks"
        {
            TaskCommand::View
        } else {
            TaskCommand::Help
        }
    }
}

/// Case-insensitive command prefix followed by a word boundary
fn strip_command<'a>(text: &'a str, commands: &[&str]) -> Option<&'a str> {
    commands.iter().find_map(|command| {
        let head = text.get(..command.len())?;
        if !head.eq_ignore_ascii_case(command) {
            return None;
        }
        let rest = &text[command.len()..];
        match rest.chars().next() {
            None => Some(rest),
            Some(c) if c.is_whitespace() || c == ':' => Some(rest),
            Some(_) => None,
        }
    })
}

fn clean_argument(raw: &str) -> String {
    raw.trim()
        .trim_start_matches(':')
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim()
        .to_string()
}

const HELP: &str = "I don't understand. Commands: 'add task <description>', 'view tasks', \
                    'complete task <description>', 'daily report', 'dwight quote'. \
                    Speak clearly. Mumbling is for the weak.";

pub struct SchruteBot {
    descriptor: AgentDescriptor,
    store: TaskStore,
    idle_seconds: AtomicU64,
}

impl SchruteBot {
    pub fn new(descriptor: AgentDescriptor, store: TaskStore) -> Self {
        Self {
            descriptor,
            store,
            idle_seconds: AtomicU64::new(0),
        }
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    async fn add(&self, description: &str) -> Result<String, AgentError> {
        if description.is_empty() {
            return Ok("Add what? A task needs a description. Be specific.".to_string());
        }
        if self.store.add(description).await? {
            tracing::info!(task_hash = %task_hash(description), "Task added");
            Ok(format!("Task added: {}. Don't disappoint me.", description))
        } else {
            Ok(format!(
                "Task '{}' is already on the list. Duplicating tasks is how Stamford fell.",
                description
            ))
        }
    }

    async fn view(&self) -> Result<String, AgentError> {
        let tasks = self.store.list().await?;
        if tasks.is_empty() {
            return Ok("No tasks? Unacceptable. You must always have something to do.".to_string());
        }
        let listing: Vec<String> = tasks
            .iter()
            .map(|t| format!("{} ({})", t.description, t.status))
            .collect();
        Ok(format!("Your tasks: {}", listing.join(", ")))
    }

    async fn complete(&self, description: &str) -> Result<String, AgentError> {
        if description.is_empty() {
            return Ok("Complete what? Name the task exactly.".to_string());
        }
        if self.store.complete(description).await? {
            Ok(format!("Task '{}' completed. Adequate.", description))
        } else {
            Ok(format!(
                "Task '{}' not found. This inefficiency disgusts me.",
                description
            ))
        }
    }

    async fn report(&self) -> Result<String, AgentError> {
        let completed = self.store.completed_count().await?;
        Ok(format!(
            "You completed {} tasks today. This is acceptable. Barely.",
            completed
        ))
    }

    async fn quote(&self) -> Result<String, AgentError> {
        let stored = self.store.quotes().await?;
        let mut rng = rand::rng();
        let quote = if stored.is_empty() {
            FALLBACK_QUOTES.choose(&mut rng).map(|q| q.to_string())
        } else {
            stored.choose(&mut rng).cloned()
        };
        Ok(quote.unwrap_or_else(|| FALLBACK_QUOTES[0].to_string()))
    }

    async fn idle(&self, seconds: u64) -> Result<String, AgentError> {
        let previous = self
            .idle_seconds
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |idle| {
                Some(idle.saturating_add(seconds))
            })
            .unwrap_or_else(|idle| idle);
        let total = previous.saturating_add(seconds);
        if total > IDLE_THRESHOLD_SECONDS {
            self.quote().await
        } else {
            Ok("Good. Keep working.".to_string())
        }
    }
}

#[async_trait]
impl Agent for SchruteBot {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn handle(&self, request: &AgentRequest) -> Result<String, AgentError> {
        let command = TaskCommand::parse(&request.input);
        tracing::debug!(command = ?command, session_id = %request.session_id, "SchruteBot command");

        match command {
            TaskCommand::Add(description) => self.add(&description).await,
            TaskCommand::View => self.view().await,
            TaskCommand::Complete(description) => self.complete(&description).await,
            TaskCommand::Report => self.report().await,
            TaskCommand::Quote => self.quote().await,
            TaskCommand::Idle(seconds) => self.idle(seconds).await,
            TaskCommand::Help => Ok(HELP.to_string()),
        }
    }
}
