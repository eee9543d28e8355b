//! Schedule items shown in the agenda panel and where they come from.
//!
//! Fetching from a calendar or task provider is not done here: a
//! [`ScheduleSource`] hands over today's items already filtered by date.

use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{NaiveDate, NaiveTime, Timelike};

/// Label used for items spanning the whole day.
pub const ALL_DAY_LABEL: &str = "Dia todo";

/// When an item starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeLabel {
    AllDay,
    At(NaiveTime),
}

impl TimeLabel {
    /// Sort key; all-day items sort as midnight.
    pub fn sort_key(&self) -> NaiveTime {
        match self {
            TimeLabel::AllDay => NaiveTime::MIN,
            TimeLabel::At(time) => *time,
        }
    }
}

impl fmt::Display for TimeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeLabel::AllDay => write!(f, "{}", ALL_DAY_LABEL),
            TimeLabel::At(time) => write!(f, "{:02}:{:02}", time.hour(), time.minute()),
        }
    }
}

impl FromStr for TimeLabel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case(ALL_DAY_LABEL) {
            return Ok(TimeLabel::AllDay);
        }

        NaiveTime::parse_from_str(s, "%H:%M")
            .map(TimeLabel::At)
            .with_context(|| format!("invalid time label {:?}", s))
    }
}

/// Where an item was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Calendar,
    Task,
}

impl FromStr for Source {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "calendar" | "event" => Ok(Source::Calendar),
            "task" => Ok(Source::Task),
            other => Err(anyhow!("unknown item source {:?}", other)),
        }
    }
}

/// One agenda entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleItem {
    pub time: TimeLabel,
    pub title: String,
    pub source: Source,
    /// Empty when the item has no location.
    pub location: String,
}

impl ScheduleItem {
    pub fn new(time: TimeLabel, title: impl Into<String>, source: Source) -> Self {
        Self {
            time,
            title: title.into(),
            source,
            location: String::new(),
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    /// First agenda line: `"{time} {title}"`.
    pub fn headline(&self) -> String {
        format!("{} {}", self.time, self.title)
    }
}

/// Today's items in display order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Agenda {
    items: Vec<ScheduleItem>,
}

impl Agenda {
    /// Sorts by start time (all-day first), then title. Stable for equal keys.
    pub fn from_items(mut items: Vec<ScheduleItem>) -> Self {
        items.sort_by(|a, b| {
            a.time
                .sort_key()
                .cmp(&b.time.sort_key())
                .then_with(|| a.title.cmp(&b.title))
        });
        Self { items }
    }

    /// Keeps at most `max` items.
    pub fn limited(mut self, max: usize) -> Self {
        self.items.truncate(max);
        self
    }

    pub fn items(&self) -> &[ScheduleItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Provider of today's items.
pub trait ScheduleSource {
    fn today(&mut self, date: NaiveDate) -> Result<Vec<ScheduleItem>>;
}

impl<S: ScheduleSource + ?Sized> ScheduleSource for Box<S> {
    fn today(&mut self, date: NaiveDate) -> Result<Vec<ScheduleItem>> {
        (**self).today(date)
    }
}

/// Source that never has anything scheduled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSchedule;

impl ScheduleSource for NoSchedule {
    fn today(&mut self, _date: NaiveDate) -> Result<Vec<ScheduleItem>> {
        Ok(Vec::new())
    }
}

/// Items in memory, returned every cycle.
#[derive(Debug, Default, Clone)]
pub struct FixedSchedule(pub Vec<ScheduleItem>);

impl ScheduleSource for FixedSchedule {
    fn today(&mut self, _date: NaiveDate) -> Result<Vec<ScheduleItem>> {
        Ok(self.0.clone())
    }
}

/// Plain text agenda, re-read every cycle.
///
/// One item per line: `time|title|source|location`, where `time` is `HH:MM`
/// or `Dia todo`, `source` is `calendar` or `task` and the last two fields
/// are optional. Blank lines and lines starting with `#` are skipped.
#[derive(Debug, Clone)]
pub struct AgendaFile {
    path: PathBuf,
}

impl AgendaFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ScheduleSource for AgendaFile {
    fn today(&mut self, _date: NaiveDate) -> Result<Vec<ScheduleItem>> {
        let text = fs::read_to_string(&self.path)
            .with_context(|| format!("reading agenda file {}", self.path.display()))?;
        parse_agenda(&text)
    }
}

/// Parses the [`AgendaFile`] format.
pub fn parse_agenda(text: &str) -> Result<Vec<ScheduleItem>> {
    let mut items = Vec::new();

    for (number, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut fields = line.splitn(4, '|');
        let time = fields.next().unwrap_or_default();
        let Some(title) = fields.next().map(str::trim) else {
            bail!("line {}: expected `time|title`", number + 1);
        };

        let time: TimeLabel = time
            .parse()
            .with_context(|| format!("line {}", number + 1))?;
        let source: Source = fields
            .next()
            .unwrap_or_default()
            .parse()
            .with_context(|| format!("line {}", number + 1))?;
        let location = fields.next().unwrap_or_default().trim();

        items.push(ScheduleItem::new(time, title, source).with_location(location));
    }

    log::debug!("Parsed {} agenda items", items.len());
    Ok(items)
}
