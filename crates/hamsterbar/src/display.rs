//! The surface hamsterbar renders to.
//!
//! The refresh logic only ever talks to a [`DisplaySink`]. The daemon uses [`JsonSink`], which
//! prints one JSON object per update in a format understood by waybar's `custom` module and by
//! eww's `deflisten`.

use std::io::Write;

use hamster_client::{format_duration, Activity, Fact};
use itertools::Itertools;
use serde::Serialize;

use crate::config::{PanelAppearance, PanelPlacement};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Icon {
    #[serde(rename = "hamster-tracking-symbolic")]
    Tracking,
    #[serde(rename = "hamster-idle-symbolic")]
    Idle,
}

/// Whether the week-to-date total keeps up with the weekly target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pace {
    Ahead,
    Behind,
}

/// Completion of the configured targets, as of the last refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    pub day_total: i64,
    pub week_total: i64,
    pub day_done: bool,
    pub week_done: bool,
    /// Only known once the day is done.
    pub pace: Option<Pace>,
}

/// What the panel itself shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelStatus {
    pub label: Option<String>,
    pub icon: Option<Icon>,
    pub classes: Vec<&'static str>,
    pub progress: Progress,
}

/// One fact as `09:00-09:10 mail 0:10`. The end is left out while the fact is ongoing.
pub fn fact_line(fact: &Fact) -> String {
    let end = fact.end_time.map(|end| end.format("%H:%M").to_string()).unwrap_or_default();
    format!("{}-{} {} {}", fact.start_time.format("%H:%M"), end, fact.name, format_duration(fact.delta))
}

pub fn label_for(ongoing: Option<&Fact>) -> String {
    match ongoing {
        Some(fact) => format!("{} {}", fact.name, format_duration(fact.delta)),
        None => "No activity".to_string(),
    }
}

impl PanelStatus {
    pub fn new(ongoing: Option<&Fact>, appearance: PanelAppearance, progress: Progress) -> Self {
        let icon = if ongoing.is_some() { Icon::Tracking } else { Icon::Idle };
        let mut classes = vec![if ongoing.is_some() { "tracking" } else { "idle" }];
        if progress.day_done {
            classes.push("day-done");
        }
        if progress.week_done {
            classes.push("week-done");
        }
        if progress.pace == Some(Pace::Behind) {
            classes.push("behind-pace");
        }
        PanelStatus {
            label: appearance.shows_label().then(|| label_for(ongoing)),
            icon: appearance.shows_icon().then_some(icon),
            classes,
            progress,
        }
    }
}

/// Anything that can show the state computed by the refresh coordinator.
///
/// Updates arrive in batches, each batch is closed by a call to [`DisplaySink::commit`].
pub trait DisplaySink {
    fn update_status(&mut self, status: &PanelStatus);
    fn update_list(&mut self, facts: &[Fact], ongoing: Option<&Fact>);
    fn update_activities(&mut self, activities: &[Activity]);
    /// Hide or show the panel. An unavailable panel must not show stale data.
    fn set_available(&mut self, available: bool);
    fn set_placement(&mut self, _placement: PanelPlacement) {}
    fn commit(&mut self) {}
}

#[derive(Debug, Serialize)]
struct JsonLine<'a> {
    text: &'a str,
    alt: Option<Icon>,
    tooltip: String,
    class: Vec<&'static str>,
    available: bool,
    placement: &'a str,
    ongoing: Option<&'a Fact>,
    facts: &'a [Fact],
    activities: &'a [Activity],
}

/// Prints the panel state as one JSON object per line.
pub struct JsonSink<W: Write> {
    out: W,
    placement: PanelPlacement,
    available: bool,
    status: Option<PanelStatus>,
    facts: Vec<Fact>,
    ongoing: Option<Fact>,
    activities: Vec<Activity>,
}

impl JsonSink<std::io::Stdout> {
    pub fn stdout(placement: PanelPlacement) -> Self {
        Self::new(std::io::stdout(), placement)
    }
}

impl<W: Write> JsonSink<W> {
    pub fn new(out: W, placement: PanelPlacement) -> Self {
        JsonSink { out, placement, available: false, status: None, facts: Vec::new(), ongoing: None, activities: Vec::new() }
    }

    fn tooltip(&self) -> String {
        let mut lines = self.facts.iter().map(fact_line).collect::<Vec<_>>();
        if let Some(status) = &self.status {
            lines.push(format!(
                "Today: {}, week: {}",
                format_duration(status.progress.day_total),
                format_duration(status.progress.week_total)
            ));
        }
        lines.into_iter().join("\n")
    }

    fn write_line(&mut self) -> std::io::Result<()> {
        let line = if self.available {
            let status = self.status.as_ref();
            JsonLine {
                text: status.and_then(|s| s.label.as_deref()).unwrap_or_default(),
                alt: status.and_then(|s| s.icon),
                tooltip: self.tooltip(),
                class: status.map(|s| s.classes.clone()).unwrap_or_default(),
                available: true,
                placement: self.placement.as_ref(),
                ongoing: self.ongoing.as_ref(),
                facts: &self.facts,
                activities: &self.activities,
            }
        } else {
            JsonLine {
                text: "",
                alt: None,
                tooltip: String::new(),
                class: vec!["unavailable"],
                available: false,
                placement: self.placement.as_ref(),
                ongoing: None,
                facts: &[],
                activities: &[],
            }
        };
        let json = serde_json::to_string(&line)?;
        writeln!(self.out, "{}", json)?;
        self.out.flush()
    }
}

impl<W: Write> DisplaySink for JsonSink<W> {
    fn set_placement(&mut self, placement: PanelPlacement) {
        self.placement = placement;
    }

    fn update_status(&mut self, status: &PanelStatus) {
        self.status = Some(status.clone());
    }

    fn update_list(&mut self, facts: &[Fact], ongoing: Option<&Fact>) {
        self.facts = facts.to_vec();
        self.ongoing = ongoing.cloned();
    }

    fn update_activities(&mut self, activities: &[Activity]) {
        self.activities = activities.to_vec();
    }

    fn set_available(&mut self, available: bool) {
        if !available {
            self.status = None;
            self.facts.clear();
            self.ongoing = None;
        }
        self.available = available;
    }

    fn commit(&mut self) {
        crate::print_result_err!("while writing panel state", self.write_line());
    }
}
