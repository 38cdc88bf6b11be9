//! In-memory stand-ins for the tracker and the panel.

use std::{cell::RefCell, collections::HashMap, rc::Rc};

use chrono::{NaiveDate, NaiveDateTime};
use hamster_client::{Activity, Change, Fact, TimeTracker};
use tokio::{sync::mpsc::UnboundedSender, task::JoinHandle};

use crate::{
    config::{PanelAppearance, PanelPlacement, Targets},
    controller::Controller,
    display::{DisplaySink, PanelStatus},
    notifications::Notifier,
    refresh::RefreshCoordinator,
};

/// Wednesday, 2024-05-15 14:30.
pub fn fixed_now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 5, 15).unwrap().and_hms_opt(14, 30, 0).unwrap()
}

/// Sunday 2024-05-19 23:59:59, wire encoded.
pub const END_OF_WEEK: i64 = 1_716_163_199;
/// Wednesday 2024-05-15 23:59:59, wire encoded.
pub const END_OF_TODAY: i64 = 1_715_817_599;

pub fn fact(id: i32, name: &str, delta: i64, ongoing: bool) -> Fact {
    let start = fixed_now() - chrono::Duration::seconds(delta);
    Fact {
        id,
        name: name.to_string(),
        activity_id: id,
        start_time: start,
        end_time: if ongoing { None } else { Some(fixed_now()) },
        date: start.date(),
        delta,
        tags: Vec::new(),
        category: None,
        description: None,
    }
}

#[derive(Debug, Default)]
struct FakeState {
    todays_facts: Vec<Fact>,
    ranges: HashMap<i64, Vec<Fact>>,
    activities: Vec<Activity>,
    ranged_calls: Vec<i64>,
    activity_calls: usize,
    stopped_at: Vec<i64>,
    change_watchers: usize,
}

#[derive(Debug, Clone, Default)]
pub struct FakeTracker {
    state: Rc<RefCell<FakeState>>,
}

impl FakeTracker {
    pub fn set_todays_facts(&self, facts: Vec<Fact>) {
        self.state.borrow_mut().todays_facts = facts;
    }

    /// Facts returned by ranged queries ending at `end`.
    pub fn set_range(&self, end: i64, facts: Vec<Fact>) {
        self.state.borrow_mut().ranges.insert(end, facts);
    }

    pub fn set_activities(&self, activities: Vec<Activity>) {
        self.state.borrow_mut().activities = activities;
    }

    /// End times of all ranged queries, in call order.
    pub fn ranged_calls(&self) -> Vec<i64> {
        self.state.borrow().ranged_calls.clone()
    }

    pub fn activity_calls(&self) -> usize {
        self.state.borrow().activity_calls
    }

    pub fn stopped_at(&self) -> Vec<i64> {
        self.state.borrow().stopped_at.clone()
    }

    pub fn change_watchers(&self) -> usize {
        self.state.borrow().change_watchers
    }
}

impl TimeTracker for FakeTracker {
    async fn todays_facts(&self) -> Vec<Fact> {
        self.state.borrow().todays_facts.clone()
    }

    async fn facts(&self, _start: i64, end: i64, _search: &str) -> Vec<Fact> {
        let mut state = self.state.borrow_mut();
        state.ranged_calls.push(end);
        state.ranges.get(&end).cloned().unwrap_or_default()
    }

    async fn add_fact(&self, _fact: &str, _start: i64, _end: i64, _temporary: bool) -> hamster_client::Result<i32> {
        Ok(1)
    }

    async fn stop_tracking(&self, end: i64) {
        self.state.borrow_mut().stopped_at.push(end);
    }

    async fn activities(&self, _search: &str) -> Vec<Activity> {
        let mut state = self.state.borrow_mut();
        state.activity_calls += 1;
        state.activities.clone()
    }

    fn watch_changes(&self, _changes: UnboundedSender<Change>) -> JoinHandle<()> {
        self.state.borrow_mut().change_watchers += 1;
        tokio::task::spawn_local(std::future::pending())
    }
}

#[derive(Debug, Default)]
pub struct RecordingSink {
    pub statuses: Vec<PanelStatus>,
    pub lists: Vec<Vec<Fact>>,
    pub activities: Vec<Activity>,
    pub available: bool,
    pub placement: Option<PanelPlacement>,
    pub commits: usize,
}

impl DisplaySink for RecordingSink {
    fn update_status(&mut self, status: &PanelStatus) {
        self.statuses.push(status.clone());
    }

    fn update_list(&mut self, facts: &[Fact], _ongoing: Option<&Fact>) {
        self.lists.push(facts.to_vec());
    }

    fn update_activities(&mut self, activities: &[Activity]) {
        self.activities = activities.to_vec();
    }

    fn set_available(&mut self, available: bool) {
        self.available = available;
    }

    fn set_placement(&mut self, placement: PanelPlacement) {
        self.placement = Some(placement);
    }

    fn commit(&mut self) {
        self.commits += 1;
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    pub messages: Rc<RefCell<Vec<String>>>,
}

impl Notifier for RecordingNotifier {
    fn notify(&self, summary: &str) {
        self.messages.borrow_mut().push(summary.to_string());
    }
}

/// A started-from-scratch controller showing its panel in a [`RecordingSink`].
pub fn recording_controller(notifier: &RecordingNotifier) -> Controller<FakeTracker, RecordingSink> {
    let (completions, _) = tokio::sync::mpsc::unbounded_channel();
    let (changes, _) = tokio::sync::mpsc::unbounded_channel();
    let targets = Targets { hours_per_day: 8.0, days_per_week: 5.0 };
    let coordinator =
        RefreshCoordinator::new(RecordingSink::default(), completions, targets, PanelAppearance::Label).with_clock(fixed_now);
    Controller::new(coordinator, changes, Box::new(notifier.clone()))
}
