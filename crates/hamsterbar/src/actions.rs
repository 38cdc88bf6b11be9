use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use hamster_client::{format_duration, naive_to_wire, total_delta, ConnectionManager, HamsterClient, TimeTracker, WindowServer};
use itertools::Itertools;

use crate::{config, display::fact_line, opts::ActionWithHamster, paths::HamsterbarPaths, week::hamster_now};

/// Run a single command against hamster and print its result.
pub fn handle_action(paths: &HamsterbarPaths, action: ActionWithHamster) -> Result<()> {
    let settings = config::read_from_file(&paths.get_settings_file())?;
    let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().context("Failed to initialize tokio runtime")?;
    let local = tokio::task::LocalSet::new();

    local.block_on(&rt, async move {
        let mut connection =
            ConnectionManager::new(settings.endpoint(), settings.connection_retries, settings.connection_retry_delay());
        let con = connection.connect().await.with_context(|| format!("Failed to connect to the {}", connection.endpoint()))?;
        log::debug!("Connected to the {}", connection.endpoint());

        match action {
            ActionWithHamster::Stop => stop(&HamsterClient::new(&con).await?, hamster_now()).await,
            ActionWithHamster::Start { activity } => {
                let id = start(&HamsterClient::new(&con).await?, &activity).await?;
                log::debug!("Started fact {}", id);
            }
            ActionWithHamster::Today => println!("{}", today(&HamsterClient::new(&con).await?).await),
            ActionWithHamster::Activities { search } => {
                println!("{}", activities(&HamsterClient::new(&con).await?, &search).await)
            }
            ActionWithHamster::Add => WindowServer::new(&con).await?.edit(0).await?,
            ActionWithHamster::Edit { id } => WindowServer::new(&con).await?.edit(id).await?,
            ActionWithHamster::Overview => WindowServer::new(&con).await?.overview().await?,
            ActionWithHamster::Preferences => WindowServer::new(&con).await?.preferences().await?,
        }
        Ok::<_, anyhow::Error>(())
    })
}

/// End the ongoing fact at `now`.
pub async fn stop<C: TimeTracker>(client: &C, now: NaiveDateTime) {
    client.stop_tracking(naive_to_wire(now)).await;
}

/// Start tracking `activity` right now. Accepts everything hamster parses, e.g. `coding@work #rust`.
pub async fn start<C: TimeTracker>(client: &C, activity: &str) -> Result<i32> {
    client.add_fact(activity, 0, 0, false).await.with_context(|| format!("Failed to start tracking '{}'", activity))
}

/// Today's facts, one per line, followed by the total.
pub async fn today<C: TimeTracker>(client: &C) -> String {
    let facts = client.todays_facts().await;
    let total = format!("Total: {}", format_duration(total_delta(&facts)));
    facts.iter().map(fact_line).chain(std::iter::once(total)).join("\n")
}

pub async fn activities<C: TimeTracker>(client: &C, search: &str) -> String {
    client.activities(search).await.iter().join("\n")
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_util::{fact, fixed_now, FakeTracker};
    use hamster_client::Activity;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_stop_ends_at_wire_encoded_now() {
        let tracker = FakeTracker::default();
        stop(&tracker, fixed_now()).await;
        // Wednesday 2024-05-15 14:30
        assert_eq!(tracker.stopped_at(), vec![1_715_783_400]);
    }

    #[tokio::test]
    async fn test_start_returns_new_fact_id() {
        let tracker = FakeTracker::default();
        assert_eq!(start(&tracker, "coding@work").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_today_lists_facts_and_total() {
        let tracker = FakeTracker::default();
        tracker.set_todays_facts(vec![fact(1, "mail", 600, false), fact(2, "coding", 3900, true)]);
        insta::assert_snapshot!(today(&tracker).await, @r###"
        14:20-14:30 mail 0:10
        13:25- coding 1:05
        Total: 1:15
        "###);
    }

    #[tokio::test]
    async fn test_today_without_facts() {
        let tracker = FakeTracker::default();
        assert_eq!(today(&tracker).await, "Total: 0:00");
    }

    #[tokio::test]
    async fn test_activities_show_category_if_known() {
        let tracker = FakeTracker::default();
        tracker.set_activities(vec![
            Activity { name: "coding".to_string(), category: Some("work".to_string()) },
            Activity { name: "reading".to_string(), category: None },
        ]);
        assert_eq!(activities(&tracker, "").await, "coding@work\nreading");
    }
}
