use crate::*;

use futures::{stream::LocalBoxStream, StreamExt};
use tokio::{sync::mpsc::UnboundedSender, task::JoinHandle};
use zbus::zvariant::Value;

/// Change notifications emitted by the tracker. Carry no payload, the receiver has to re-query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Facts,
    Activities,
    Tags,
}

/// Everything hamsterbar needs from a time tracker.
///
/// Query errors never reach the caller: implementations log them and return the neutral value.
#[allow(async_fn_in_trait)]
pub trait TimeTracker {
    /// Today's facts. The ongoing fact, if any, is the last one.
    async fn todays_facts(&self) -> Vec<Fact>;

    /// Facts between `start` and `end` (inclusive, wire encoded). An empty `search` matches everything.
    async fn facts(&self, start: i64, end: i64, search: &str) -> Vec<Fact>;

    /// Add a new fact, returning its id. A `start` of 0 means now.
    async fn add_fact(&self, fact: &str, start: i64, end: i64, temporary: bool) -> Result<i32>;

    /// End the ongoing fact at `end`.
    async fn stop_tracking(&self, end: i64);

    async fn activities(&self, search: &str) -> Vec<Activity>;

    /// Forward the change notifications of the tracker until the returned task is aborted.
    fn watch_changes(&self, changes: UnboundedSender<Change>) -> JoinHandle<()>;
}

/// [`TimeTracker`] backed by a running `hamster-service`.
#[derive(Debug, Clone)]
pub struct HamsterClient {
    api: proxy::HamsterProxy<'static>,
}

impl HamsterClient {
    pub async fn new(con: &zbus::Connection) -> Result<Self> {
        let api = proxy::HamsterProxy::new(con).await?;
        Ok(Self { api })
    }

    pub fn proxy(&self) -> &proxy::HamsterProxy<'static> {
        &self.api
    }
}

fn or_neutral<T: Default>(what: &str, result: zbus::Result<T>) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            log::error!("Error while {}: {}", what, e);
            T::default()
        }
    }
}

fn wire_u32(time: i64) -> u32 {
    u32::try_from(time.max(0)).unwrap_or(u32::MAX)
}

fn wire_i32(time: i64) -> i32 {
    i32::try_from(time).unwrap_or(i32::MAX)
}

impl TimeTracker for HamsterClient {
    async fn todays_facts(&self) -> Vec<Fact> {
        facts_from_wire(or_neutral("fetching today's facts", self.api.get_todays_facts().await))
    }

    async fn facts(&self, start: i64, end: i64, search: &str) -> Vec<Fact> {
        let records = self.api.get_facts(wire_u32(start), wire_u32(end), search).await;
        facts_from_wire(or_neutral("fetching facts", records))
    }

    async fn add_fact(&self, fact: &str, start: i64, end: i64, temporary: bool) -> Result<i32> {
        Ok(self.api.add_fact(fact, wire_i32(start), wire_i32(end), temporary).await?)
    }

    async fn stop_tracking(&self, end: i64) {
        or_neutral("stopping tracking", self.api.stop_tracking(&Value::I32(wire_i32(end))).await)
    }

    async fn activities(&self, search: &str) -> Vec<Activity> {
        let activities = or_neutral("fetching activities", self.api.get_activities(search).await);
        activities.into_iter().map(Activity::from).collect()
    }

    fn watch_changes(&self, changes: UnboundedSender<Change>) -> JoinHandle<()> {
        let api = self.api.clone();
        tokio::task::spawn_local(async move {
            if let Err(e) = forward_changes(&api, changes).await {
                log::error!("Stopped listening to hamster signals: {}", e);
            }
        })
    }
}

async fn forward_changes(api: &proxy::HamsterProxy<'static>, changes: UnboundedSender<Change>) -> Result<()> {
    let streams: [LocalBoxStream<'static, Change>; 3] = [
        api.receive_facts_changed().await?.map(|_| Change::Facts).boxed_local(),
        api.receive_activities_changed().await?.map(|_| Change::Activities).boxed_local(),
        api.receive_tags_changed().await?.map(|_| Change::Tags).boxed_local(),
    ];
    let mut all_changes = futures::stream::select_all(streams);
    while let Some(change) = all_changes.next().await {
        log::debug!("hamster reported change: {:?}", change);
        if changes.send(change).is_err() {
            break;
        }
    }
    Ok(())
}

/// The dialogs of `hamster-windows-service`.
#[derive(Debug, Clone)]
pub struct WindowServer {
    proxy: proxy::WindowServerProxy<'static>,
}

impl WindowServer {
    pub async fn new(con: &zbus::Connection) -> Result<Self> {
        let proxy = proxy::WindowServerProxy::new(con).await?;
        Ok(Self { proxy })
    }

    /// Open the edit dialog for the fact with the given id, or for a new fact if `id` is 0.
    pub async fn edit(&self, id: i32) -> Result<()> {
        Ok(self.proxy.edit(&Value::I32(id)).await?)
    }

    pub async fn overview(&self) -> Result<()> {
        Ok(self.proxy.overview().await?)
    }

    pub async fn preferences(&self) -> Result<()> {
        Ok(self.proxy.preferences().await?)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_wire_time_conversion_saturates() {
        assert_eq!(wire_u32(-5), 0);
        assert_eq!(wire_u32(1_715_731_200), 1_715_731_200);
        assert_eq!(wire_u32(i64::MAX), u32::MAX);
        assert_eq!(wire_i32(0), 0);
        assert_eq!(wire_i32(i64::MAX), i32::MAX);
    }

    #[test]
    fn test_errors_become_neutral_values() {
        let facts: Vec<FactRecord> = or_neutral("testing", Err(zbus::Error::Failure("gone".to_string())));
        assert!(facts.is_empty());
        assert_eq!(or_neutral("testing", Ok(vec![1, 2])), vec![1, 2]);
    }
}
