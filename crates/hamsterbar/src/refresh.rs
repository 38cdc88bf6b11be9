//! Fetches facts and activities from the tracker and turns them into panel state.
//!
//! Queries run concurrently as local tasks. Their results come back as [`Completion`]s over a
//! channel and are applied one at a time through [`RefreshCoordinator::apply`]. Every query is
//! stamped with a per-kind sequence number. A completion is only applied while the coordinator
//! is enabled, and only if no newer result of the same kind has been applied before it.
//!
//! Today's facts are pushed to the sink as soon as they arrive. The week total and the pace
//! only update the progress shown next to them, so a slow week query never holds back the
//! ongoing fact.

use std::future::Future;

use chrono::NaiveDateTime;
use hamster_client::{ongoing_fact, total_delta, Activity, Fact, TimeTracker};
use tokio::sync::mpsc::UnboundedSender;

use crate::{
    config::{is_time_done, PanelAppearance, Targets},
    display::{DisplaySink, Pace, PanelStatus, Progress},
    week::{hamster_now, WeekBounds},
};

/// The result of a single query.
#[derive(Debug)]
pub enum Completion {
    TodaysFacts { seq: u64, bounds: WeekBounds, facts: Vec<Fact> },
    WeekFacts { seq: u64, facts: Vec<Fact> },
    /// Facts from the start of the week up to the end of today.
    PaceFacts { seq: u64, weekday_index: u32, facts: Vec<Fact> },
    Activities { seq: u64, activities: Vec<Activity> },
}

#[derive(Debug, Default)]
struct Sequence {
    issued: u64,
    applied: u64,
}

impl Sequence {
    fn advance(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    /// Mark `seq` as applied, unless a newer result has been applied already.
    fn take(&mut self, seq: u64) -> bool {
        if seq <= self.applied || seq > self.issued {
            return false;
        }
        self.applied = seq;
        true
    }

    /// Make every query that is currently in flight stale.
    fn invalidate(&mut self) {
        self.applied = self.issued;
    }
}

#[derive(Debug, Default)]
struct Sequences {
    today: Sequence,
    week: Sequence,
    pace: Sequence,
    activities: Sequence,
}

impl Sequences {
    fn invalidate_all(&mut self) {
        self.today.invalidate();
        self.week.invalidate();
        self.pace.invalidate();
        self.activities.invalidate();
    }
}

pub struct RefreshCoordinator<C, S> {
    client: Option<C>,
    sink: S,
    completions: UnboundedSender<Completion>,
    targets: Targets,
    appearance: PanelAppearance,
    clock: fn() -> NaiveDateTime,
    sequences: Sequences,
    facts: Vec<Fact>,
    progress: Progress,
    /// Whether today's facts have reached the sink since the panel was enabled.
    published: bool,
    activities: Vec<Activity>,
    activities_in_flight: bool,
}

impl<C: TimeTracker + Clone + 'static, S: DisplaySink> RefreshCoordinator<C, S> {
    pub fn new(sink: S, completions: UnboundedSender<Completion>, targets: Targets, appearance: PanelAppearance) -> Self {
        RefreshCoordinator {
            client: None,
            sink,
            completions,
            targets,
            appearance,
            clock: hamster_now,
            sequences: Sequences::default(),
            facts: Vec::new(),
            progress: Progress::default(),
            published: false,
            activities: Vec::new(),
            activities_in_flight: false,
        }
    }

    #[cfg(test)]
    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    #[cfg(test)]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn set_targets(&mut self, targets: Targets) {
        self.targets = targets;
    }

    pub fn set_appearance(&mut self, appearance: PanelAppearance) {
        self.appearance = appearance;
    }

    /// Start issuing queries through `client` and show the panel.
    pub fn enable(&mut self, client: C) {
        self.client = Some(client);
        self.sink.set_available(true);
    }

    /// Stop issuing queries, drop the client and hide the panel.
    /// Anything still in flight is discarded when it completes.
    pub fn disable(&mut self) {
        if self.client.take().is_none() {
            return;
        }
        self.sequences.invalidate_all();
        self.activities_in_flight = false;
        self.facts.clear();
        self.progress = Progress::default();
        self.published = false;
        self.sink.set_available(false);
        self.sink.commit();
    }

    fn spawn_query<F>(&self, query: F)
    where
        F: Future<Output = Completion> + 'static,
    {
        let completions = self.completions.clone();
        tokio::task::spawn_local(async move {
            // the receiver is gone once the daemon shuts down, nothing left to update then
            let _ = completions.send(query.await);
        });
    }

    /// Query today's facts and the week total again.
    pub fn refresh(&mut self) {
        let Some(client) = self.client.clone() else {
            log::debug!("Not refreshing, tracker is not available");
            return;
        };
        let bounds = WeekBounds::at((self.clock)());
        let today_seq = self.sequences.today.advance();
        let week_seq = self.sequences.week.advance();
        log::debug!("Starting refresh cycle (today #{}, week #{})", today_seq, week_seq);

        self.spawn_query({
            let client = client.clone();
            async move { Completion::TodaysFacts { seq: today_seq, bounds, facts: client.todays_facts().await } }
        });
        self.spawn_query(async move {
            let facts = client.facts(bounds.start_of_week, bounds.end_of_week, "").await;
            Completion::WeekFacts { seq: week_seq, facts }
        });
    }

    /// Reload the activity list, unless a reload is already running.
    /// Returns the cached snapshot either way.
    pub fn refresh_activities(&mut self) -> &[Activity] {
        if self.activities_in_flight {
            log::debug!("Activities are already being fetched");
            return &self.activities;
        }
        if let Some(client) = self.client.clone() {
            self.activities_in_flight = true;
            let seq = self.sequences.activities.advance();
            self.spawn_query(async move { Completion::Activities { seq, activities: client.activities("").await } });
        }
        &self.activities
    }

    /// Apply the result of a query, unless it has been superseded.
    pub fn apply(&mut self, completion: Completion) {
        match completion {
            Completion::TodaysFacts { seq, bounds, facts } => {
                if self.accepts(seq, |s| &mut s.today, "today's facts") {
                    self.apply_todays_facts(bounds, facts);
                }
            }
            Completion::WeekFacts { seq, facts } => {
                if self.accepts(seq, |s| &mut s.week, "week facts") {
                    self.progress.week_total = total_delta(&facts);
                    self.progress.week_done = is_time_done(self.progress.week_total, self.targets.week_seconds());
                    self.publish_progress();
                }
            }
            Completion::PaceFacts { seq, weekday_index, facts } => {
                if self.accepts(seq, |s| &mut s.pace, "pace facts") {
                    let on_pace = is_time_done(total_delta(&facts), self.targets.pace_seconds(weekday_index));
                    self.progress.pace = Some(if on_pace { Pace::Ahead } else { Pace::Behind });
                    self.publish_progress();
                }
            }
            Completion::Activities { seq, activities } => {
                if self.accepts(seq, |s| &mut s.activities, "activities") {
                    self.activities_in_flight = false;
                    self.activities = activities;
                    self.sink.update_activities(&self.activities);
                    // before the first status the activities go out together with it
                    if self.published {
                        self.sink.commit();
                    }
                }
            }
        }
    }

    fn accepts(&mut self, seq: u64, sequence: impl Fn(&mut Sequences) -> &mut Sequence, what: &str) -> bool {
        if !self.is_enabled() {
            log::debug!("Discarding {} #{}, tracker is disabled", what, seq);
            false
        } else if !sequence(&mut self.sequences).take(seq) {
            log::debug!("Discarding stale {} #{}", what, seq);
            false
        } else {
            true
        }
    }

    fn apply_todays_facts(&mut self, bounds: WeekBounds, facts: Vec<Fact>) {
        self.facts = facts;
        self.progress.day_total = total_delta(&self.facts);
        self.progress.day_done = is_time_done(self.progress.day_total, self.targets.day_seconds());

        if self.progress.day_done {
            let seq = self.sequences.pace.advance();
            if let Some(client) = self.client.clone() {
                self.spawn_query(async move {
                    let facts = client.facts(bounds.start_of_week, bounds.end_of_today, "").await;
                    Completion::PaceFacts { seq, weekday_index: bounds.weekday_index, facts }
                });
            }
        } else {
            self.sequences.pace.invalidate();
            self.progress.pace = None;
        }

        let ongoing = ongoing_fact(&self.facts);
        self.sink.update_status(&PanelStatus::new(ongoing, self.appearance, self.progress));
        self.sink.update_list(&self.facts, ongoing);
        self.sink.commit();
        self.published = true;
    }

    /// Show changed progress next to the facts that are already on the panel.
    fn publish_progress(&mut self) {
        if !self.published {
            return;
        }
        let status = PanelStatus::new(ongoing_fact(&self.facts), self.appearance, self.progress);
        self.sink.update_status(&status);
        self.sink.commit();
    }
}
