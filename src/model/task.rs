use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Date format used for every date stored in the document.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Task priority, `P0` being the most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    P0,
    P1,
    P2,
    P3,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::P0 => "P0",
            Priority::P1 => "P1",
            Priority::P2 => "P2",
            Priority::P3 => "P3",
        }
    }
}

impl FromStr for Priority {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "P0" => Ok(Priority::P0),
            "P1" => Ok(Priority::P1),
            "P2" => Ok(Priority::P2),
            "P3" => Ok(Priority::P3),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// T-shirt sized effort estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Effort {
    XS,
    S,
    M,
    L,
    XL,
}

impl Effort {
    pub fn as_str(self) -> &'static str {
        match self {
            Effort::XS => "XS",
            Effort::S => "S",
            Effort::M => "M",
            Effort::L => "L",
            Effort::XL => "XL",
        }
    }
}

impl FromStr for Effort {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "XS" => Ok(Effort::XS),
            "S" => Ok(Effort::S),
            "M" => Ok(Effort::M),
            "L" => Ok(Effort::L),
            "XL" => Ok(Effort::XL),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Effort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a recurring task advances its due date once completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Recur {
    Daily,
    /// Daily, skipping Saturday and Sunday
    Weekdays,
    Weekly,
    Monthly,
    /// `every N days`, N >= 1
    EveryDays(u32),
}

impl FromStr for Recur {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(Recur::Daily),
            "weekdays" => Ok(Recur::Weekdays),
            "weekly" => Ok(Recur::Weekly),
            "monthly" => Ok(Recur::Monthly),
            _ => {
                let n = s
                    .strip_prefix("every ")
                    .and_then(|rest| rest.strip_suffix(" days"))
                    .filter(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
                    .and_then(|n| n.parse::<u32>().ok())
                    .ok_or(())?;
                if n == 0 {
                    return Err(());
                }
                Ok(Recur::EveryDays(n))
            }
        }
    }
}

impl fmt::Display for Recur {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recur::Daily => f.write_str("daily"),
            Recur::Weekdays => f.write_str("weekdays"),
            Recur::Weekly => f.write_str("weekly"),
            Recur::Monthly => f.write_str("monthly"),
            Recur::EveryDays(n) => write!(f, "every {} days", n),
        }
    }
}

impl From<Recur> for String {
    fn from(recur: Recur) -> String {
        recur.to_string()
    }
}

impl TryFrom<String> for Recur {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value
            .parse()
            .map_err(|_| format!("invalid recurrence pattern: {}", value))
    }
}

/// Parse a strict `YYYY-MM-DD` calendar date.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let b = s.as_bytes();
    let shape_ok = b.len() == 10
        && b[4] == b'-'
        && b[7] == b'-'
        && b.iter()
            .enumerate()
            .all(|(i, c)| i == 4 || i == 7 || c.is_ascii_digit());
    if !shape_ok {
        return None;
    }
    NaiveDate::parse_from_str(s, DATE_FORMAT).ok()
}

/// One metadata line beneath a task, classified by key.
///
/// A reserved key whose value fails validation becomes `Extra` under the key
/// exactly as written, so nothing is lost on rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetaField {
    Priority(Priority),
    Effort(Effort),
    Due(NaiveDate),
    Recur(Recur),
    LastDone(NaiveDate),
    Extra { key: String, value: String },
}

impl MetaField {
    /// Classify a trimmed key/value pair. Reserved keys match case-insensitively.
    pub fn classify(key: &str, value: &str) -> MetaField {
        let typed = match key.to_lowercase().as_str() {
            "priority" => value.parse().ok().map(MetaField::Priority),
            "effort" => value.parse().ok().map(MetaField::Effort),
            "due" => parse_date(value).map(MetaField::Due),
            "recur" => value.parse().ok().map(MetaField::Recur),
            "lastdone" => parse_date(value).map(MetaField::LastDone),
            _ => None,
        };
        typed.unwrap_or_else(|| MetaField::Extra {
            key: key.to_string(),
            value: value.to_string(),
        })
    }

    /// Attach this field to a task, replacing any earlier value for the same key.
    pub fn apply(self, task: &mut Task) {
        match self {
            MetaField::Priority(p) => task.priority = Some(p),
            MetaField::Effort(e) => task.effort = Some(e),
            MetaField::Due(d) => task.due = Some(d),
            MetaField::Recur(r) => task.recur = Some(r),
            MetaField::LastDone(d) => task.last_done = Some(d),
            MetaField::Extra { key, value } => {
                task.extra.insert(key, value);
            }
        }
    }
}

/// A single checklist entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// `<section>::<index>`, recomputed on every parse and after every mutation
    pub id: String,
    pub done: bool,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effort: Option<Effort>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recur: Option<Recur>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_done: Option<NaiveDate>,
    /// Unrecognized or invalid metadata, in file order.
    #[serde(default)]
    pub extra: IndexMap<String, String>,
}

impl Task {
    /// Create an open task with no metadata. The id is assigned by the owning section.
    pub fn new(title: impl Into<String>) -> Self {
        Task {
            id: String::new(),
            done: false,
            title: title.into(),
            priority: None,
            effort: None,
            due: None,
            recur: None,
            last_done: None,
            extra: IndexMap::new(),
        }
    }

    pub fn is_recurring(&self) -> bool {
        self.recur.is_some()
    }

    /// Whether the task reads as complete on `today`.
    ///
    /// Recurring tasks are complete only for the cycle they were last done in;
    /// everything else uses the raw checkbox.
    pub fn is_complete_on(&self, today: NaiveDate) -> bool {
        if self.is_recurring() {
            self.last_done == Some(today)
        } else {
            self.done
        }
    }

    /// Whether the scheduler arms a reminder for this task: the raw checkbox
    /// is clear and a due date is set. Recurring tasks follow the same rule.
    pub fn awaits_reminder(&self) -> bool {
        !self.done && self.due.is_some()
    }
}
