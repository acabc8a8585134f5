//! PamAgent: reception desk
//!
//! Keyword intents over a local appointment book, reminders and an agent
//! directory, persisted together in one JSON state file. Dates and times are
//! pulled out of free text with regexes and resolved against local time.
//! Any reminders that have come due are delivered ahead of Pam's reply.

use super::{Agent, AgentDescriptor, AgentError, AgentRequest};
use async_trait::async_trait;
use chrono::{Datelike, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use rand::seq::IndexedRandom;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tokio::sync::Mutex;

const GREETINGS: &[&str] = &["Hello!", "Hi there!", "Dunder Mifflin, this is Pam."];
const WAITING: &[&str] = &[
    "One moment please.",
    "Let me check that for you.",
    "I'll see what I can do.",
];
const FAREWELLS: &[&str] = &[
    "Is there anything else I can help with?",
    "Let me know if you need anything else.",
    "Anything else?",
];

const SCHEDULE_HELP: &str = "I couldn't understand the date and time. Could you provide them in a \
     clearer format? For example: 'Schedule a meeting with Michael tomorrow at 2pm.'";
const REMINDER_HELP: &str = "I couldn't understand what you want to be reminded about or when. \
     Could you please be more specific? For example: 'Remind me to call the client tomorrow at 10am.'";

const WEEKDAYS: &str = "monday|tuesday|wednesday|thursday|friday|saturday|sunday";

static REGISTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*register\s+(.+?)\s+as\s+(.+?)\s*\.?$").expect("register pattern is valid")
});

static SCHEDULE_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"\b(today|tomorrow|{WEEKDAYS}|\d{{1,2}}[-/]\d{{1,2}}(?:[-/]\d{{2,4}})?)\b"
    ))
    .expect("schedule date pattern is valid")
});

// A clock time needs am/pm or minutes; a bare hour only counts after "at"
static SCHEDULE_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2}(?::\d{2})?\s*(?:am|pm)|\d{1,2}:\d{2})\b|\bat\s+(\d{1,2})\b")
        .expect("schedule time pattern is valid")
});

static SCHEDULE_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:for|about|with|regarding)\s+(.*?)\s*(?:\b(?:at|on|from|today|tomorrow|{WEEKDAYS})\b|\d|\.?$)"
    ))
    .expect("schedule title pattern is valid")
});

static REMINDER_ABOUT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:remind\s+(?:me\s+)?|don't forget\s+)(?:to\s+|about\s+)?(.*?)\s*(?:\b(?:today|tomorrow|in|at)\b|\.?$)",
    )
    .expect("reminder pattern is valid")
});

static RELATIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bin\s+(\d+)\s+(minute|hour|day)s?\b").expect("relative time pattern is valid")
});

static CLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bat\s+(\d{1,2})(?::(\d{2}))?\s*(am|pm)?\b").expect("clock pattern is valid")
});

static CALENDAR_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\b(today|tomorrow|this week|next week|{WEEKDAYS})\b"))
        .expect("calendar date pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Appointment {
    pub title: String,
    /// Date as the user said it ("tomorrow", "friday", "3/14")
    pub date: String,
    pub time: String,
    pub created: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Reminder {
    pub about: String,
    pub time: NaiveDateTime,
    pub created: NaiveDateTime,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DirectoryEntry {
    pub role: String,
    pub registered: NaiveDateTime,
}

/// Everything Pam keeps on file
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ReceptionBook {
    #[serde(default)]
    pub appointments: Vec<Appointment>,
    #[serde(default)]
    pub reminders: Vec<Reminder>,
    #[serde(default)]
    pub agents: BTreeMap<String, DirectoryEntry>,
}

impl ReceptionBook {
    /// Read the book from `path`; a missing file is an empty book
    pub fn load(path: &Path) -> Result<Self, AgentError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(AgentError::Io {
                    path: path.display().to_string(),
                    source,
                });
            }
        };
        serde_json::from_str(&content).map_err(|source| AgentError::State {
            path: path.display().to_string(),
            source,
        })
    }

    async fn save(&self, path: &Path) -> Result<(), AgentError> {
        let json = serde_json::to_string_pretty(self).map_err(|source| AgentError::State {
            path: path.display().to_string(),
            source,
        })?;
        tokio::fs::write(path, json)
            .await
            .map_err(|source| AgentError::Io {
                path: path.display().to_string(),
                source,
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Intent {
    Register { name: String, role: String },
    Directory,
    Reminder,
    Scheduling,
    CalendarQuery,
    SmallTalk,
}

impl Intent {
    fn detect(input: &str) -> Self {
        if let Some(caps) = REGISTER.captures(input) {
            return Intent::Register {
                name: caps[1].trim().to_string(),
                role: caps[2].trim().to_string(),
            };
        }

        let lowered = input.to_lowercase();
        let has = |words: &[&str]| words.iter().any(|w| lowered.contains(w));
        if has(&["directory", "who's registered", "who is registered"]) {
            Intent::Directory
        } else if has(&["remind", "reminder", "don't forget"]) {
            Intent::Reminder
        } else if has(&["schedule", "appointment", "meeting", "book"])
            && !has(&["what's on", "what is on", "my schedule"])
        {
            Intent::Scheduling
        } else if has(&["calendar", "schedule", "free", "available"]) {
            Intent::CalendarQuery
        } else {
            Intent::SmallTalk
        }
    }
}

/// Resolve a reminder time from free text, relative to `now`
///
/// "in N minutes|hours|days" wins; otherwise "today"/"tomorrow" pick the day
/// and "at H[:MM] [am|pm]" the clock. A day without a clock means 17:00 today
/// or 09:00 tomorrow. Returns `None` when no time expression is present.
pub fn parse_reminder_time(text: &str, now: NaiveDateTime) -> Option<NaiveDateTime> {
    let lowered = text.to_lowercase();

    if let Some(caps) = RELATIVE.captures(&lowered) {
        let amount: i64 = caps[1].parse().ok()?;
        let offset = match &caps[2] {
            "minute" => Duration::try_minutes(amount)?,
            "hour" => Duration::try_hours(amount)?,
            _ => Duration::try_days(amount)?,
        };
        return now.checked_add_signed(offset);
    }

    let tomorrow = lowered.contains("tomorrow");
    let today = lowered.contains("today");
    let clock = parse_clock(&lowered);

    let day = if tomorrow {
        now.date().succ_opt()?
    } else {
        now.date()
    };

    match clock {
        Some(time) => Some(day.and_time(time)),
        None if tomorrow => day.and_hms_opt(9, 0, 0),
        None if today => day.and_hms_opt(17, 0, 0),
        None => None,
    }
}

fn parse_clock(lowered: &str) -> Option<NaiveTime> {
    let caps = CLOCK.captures(lowered)?;
    let mut hour: u32 = caps[1].parse().ok()?;
    let minute: u32 = caps.get(2).map_or(Ok(0), |m| m.as_str().parse()).ok()?;
    match caps.get(3).map(|m| m.as_str()) {
        Some("pm") if hour < 12 => hour += 12,
        Some("am") if hour == 12 => hour = 0,
        _ => {}
    }
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// Resolve a spoken date ("today", "friday", "3/14", "3-14-25") relative to `reference`
pub fn resolve_date(spoken: &str, reference: NaiveDate) -> Option<NaiveDate> {
    let spoken = spoken.trim().to_lowercase();
    match spoken.as_str() {
        "today" => return Some(reference),
        "tomorrow" => return reference.succ_opt(),
        _ => {}
    }

    if let Ok(weekday) = spoken.parse::<Weekday>() {
        let ahead = (7 + weekday.num_days_from_monday() as i64
            - reference.weekday().num_days_from_monday() as i64)
            % 7;
        return reference.checked_add_signed(Duration::days(ahead));
    }

    let parts: Vec<&str> = spoken.split(['/', '-']).collect();
    let (month, day, year) = match parts.as_slice() {
        [month, day] => (month.parse().ok()?, day.parse().ok()?, reference.year()),
        [month, day, year] => {
            let year: i32 = year.parse().ok()?;
            let year = if year < 100 { 2000 + year } else { year };
            (month.parse().ok()?, day.parse().ok()?, year)
        }
        _ => return None,
    };
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Inclusive date range a calendar query covers
fn query_range(query: &str, today: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
    let monday = today.checked_sub_signed(Duration::days(
        today.weekday().num_days_from_monday() as i64,
    ))?;
    match query {
        "this week" => Some((monday, monday.checked_add_signed(Duration::days(6))?)),
        "next week" => {
            let next = monday.checked_add_signed(Duration::days(7))?;
            Some((next, next.checked_add_signed(Duration::days(6))?))
        }
        other => resolve_date(other, today).map(|day| (day, day)),
    }
}

fn format_time(time: NaiveDateTime) -> String {
    time.format("%a %b %-d at %-I:%M %p").to_string()
}

pub struct PamAgent {
    descriptor: AgentDescriptor,
    state_path: PathBuf,
    book: Mutex<ReceptionBook>,
}

impl PamAgent {
    /// Create the agent, reading the reception book from `state_path`
    pub fn load(descriptor: AgentDescriptor, state_path: PathBuf) -> Result<Self, AgentError> {
        let book = ReceptionBook::load(&state_path)?;
        tracing::debug!(
            appointments = book.appointments.len(),
            reminders = book.reminders.len(),
            directory = book.agents.len(),
            "Loaded reception book"
        );
        Ok(Self {
            descriptor,
            state_path,
            book: Mutex::new(book),
        })
    }

    pub async fn book(&self) -> ReceptionBook {
        self.book.lock().await.clone()
    }

    /// Mark reminders due by now as delivered and return them
    ///
    /// Nothing is marked unless the updated book is saved.
    pub async fn check_due_reminders(&self) -> Result<Vec<Reminder>, AgentError> {
        self.check_due_reminders_at(Local::now().naive_local()).await
    }

    pub async fn check_due_reminders_at(
        &self,
        now: NaiveDateTime,
    ) -> Result<Vec<Reminder>, AgentError> {
        let mut book = self.book.lock().await;
        let mut updated = book.clone();
        let mut due = Vec::new();
        for reminder in updated.reminders.iter_mut() {
            if !reminder.completed && reminder.time <= now {
                reminder.completed = true;
                due.push(reminder.clone());
            }
        }
        if !due.is_empty() {
            updated.save(&self.state_path).await?;
            *book = updated;
            tracing::info!(due = due.len(), "Delivered reminders");
        }
        Ok(due)
    }

    async fn respond_at(&self, input: &str, now: NaiveDateTime) -> Result<String, AgentError> {
        let intent = Intent::detect(input);
        tracing::debug!(intent = ?intent, "Pam handling request");

        match intent {
            Intent::Register { name, role } => self.register(name, role, now).await,
            Intent::Directory => Ok(self.directory().await),
            Intent::Reminder => self.add_reminder(input, now).await,
            Intent::Scheduling => self.schedule(input, now).await,
            Intent::CalendarQuery => Ok(self.calendar(input, now).await),
            Intent::SmallTalk => Ok(small_talk()),
        }
    }

    async fn register(
        &self,
        name: String,
        role: String,
        now: NaiveDateTime,
    ) -> Result<String, AgentError> {
        let mut book = self.book.lock().await;
        if book.agents.contains_key(&name) {
            return Ok(format!("{} is already registered.", name));
        }
        let mut updated = book.clone();
        updated.agents.insert(
            name.clone(),
            DirectoryEntry {
                role,
                registered: now,
            },
        );
        updated.save(&self.state_path).await?;
        *book = updated;
        Ok(format!(
            "Welcome to Dunder Mifflin, {}! I've added you to the directory.",
            name
        ))
    }

    async fn directory(&self) -> String {
        let book = self.book.lock().await;
        if book.agents.is_empty() {
            return "Nobody's in the directory yet.".to_string();
        }
        let lines: Vec<String> = book
            .agents
            .iter()
            .map(|(name, entry)| format!("- {} ({})", name, entry.role))
            .collect();
        format!("Here's the directory:\n{}", lines.join("\n"))
    }

    async fn add_reminder(&self, input: &str, now: NaiveDateTime) -> Result<String, AgentError> {
        let lowered = input.to_lowercase();
        let about = REMINDER_ABOUT
            .captures(&lowered)
            .map(|caps| caps[1].trim().to_string())
            .filter(|about| !about.is_empty());
        let (Some(about), Some(time)) = (about, parse_reminder_time(&lowered, now)) else {
            return Ok(REMINDER_HELP.to_string());
        };

        let mut book = self.book.lock().await;
        let mut updated = book.clone();
        updated.reminders.push(Reminder {
            about: about.clone(),
            time,
            created: now,
            completed: false,
        });
        updated.save(&self.state_path).await?;
        *book = updated;
        Ok(format!(
            "I'll remind you to {} on {}.",
            about,
            format_time(time)
        ))
    }

    async fn schedule(&self, input: &str, now: NaiveDateTime) -> Result<String, AgentError> {
        let lowered = input.to_lowercase();
        let date = SCHEDULE_DATE
            .captures(&lowered)
            .map(|caps| caps[1].to_string());
        let time = SCHEDULE_TIME.captures(&lowered).and_then(|caps| {
            caps.get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str().to_string())
        });
        let (Some(date), Some(time)) = (date, time) else {
            return Ok(SCHEDULE_HELP.to_string());
        };

        let title = SCHEDULE_TITLE
            .captures(input)
            .map(|caps| caps[1].trim().to_string())
            .filter(|title| !title.is_empty())
            .unwrap_or_else(|| "Untitled Meeting".to_string());

        let mut book = self.book.lock().await;
        let mut updated = book.clone();
        updated.appointments.push(Appointment {
            title: title.clone(),
            date: date.clone(),
            time: time.clone(),
            created: now,
        });
        updated.save(&self.state_path).await?;
        *book = updated;
        Ok(format!(
            "I've scheduled '{}' for {} at {}. It's on the calendar!",
            title, date, time
        ))
    }

    async fn calendar(&self, input: &str, now: NaiveDateTime) -> String {
        let lowered = input.to_lowercase();
        let query = CALENDAR_DATE
            .captures(&lowered)
            .map(|caps| caps[1].to_string())
            .unwrap_or_else(|| "today".to_string());
        let range = query_range(&query, now.date());

        let book = self.book.lock().await;
        let matching: Vec<&Appointment> = book
            .appointments
            .iter()
            .filter(|appointment| {
                let on = resolve_date(&appointment.date, appointment.created.date());
                match (on, range) {
                    (Some(day), Some((start, end))) => start <= day && day <= end,
                    _ => appointment.date == query,
                }
            })
            .collect();

        if matching.is_empty() {
            return format!("You don't have any appointments scheduled for {}.", query);
        }
        let lines: Vec<String> = matching
            .iter()
            .map(|a| format!("- {} at {}", a.title, a.time))
            .collect();
        format!("Here's your schedule for {}:\n{}", query, lines.join("\n"))
    }
}

fn small_talk() -> String {
    let mut rng = rand::rng();
    format!(
        "{} {} {}",
        GREETINGS.choose(&mut rng).copied().unwrap_or_default(),
        WAITING.choose(&mut rng).copied().unwrap_or_default(),
        FAREWELLS.choose(&mut rng).copied().unwrap_or_default()
    )
}

#[async_trait]
impl Agent for PamAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    /// Answers the request, then prepends reminders that came due
    ///
    /// Reminders are only marked delivered once the reply exists. If marking
    /// them fails they stay pending and show up with a later reply.
    async fn handle(&self, request: &AgentRequest) -> Result<String, AgentError> {
        let now = Local::now().naive_local();
        let reply = self.respond_at(&request.input, now).await?;
        let due = match self.check_due_reminders_at(now).await {
            Ok(due) => due,
            Err(e) => {
                tracing::warn!(error = %e, "Could not mark due reminders, delivering them later");
                Vec::new()
            }
        };

        if due.is_empty() {
            return Ok(reply);
        }
        let notices: Vec<String> = due
            .iter()
            .map(|r| format!("Reminder: {}", r.about))
            .collect();
        Ok(format!("{}\n\n{}", notices.join("\n"), reply))
    }
}
