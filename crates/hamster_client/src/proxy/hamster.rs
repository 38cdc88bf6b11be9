use crate::FactRecord;

#[zbus::proxy(interface = "org.gnome.Hamster", default_service = "org.gnome.Hamster", default_path = "/org/gnome/Hamster")]
trait Hamster {
    /// GetTodaysFacts method. The ongoing fact, if any, is the last element.
    fn get_todays_facts(&self) -> zbus::Result<Vec<FactRecord>>;

    /// GetFacts method
    fn get_facts(&self, start_time: u32, end_time: u32, search_terms: &str) -> zbus::Result<Vec<FactRecord>>;

    /// StopTracking method
    fn stop_tracking(&self, end_time: &zbus::zvariant::Value<'_>) -> zbus::Result<()>;

    /// AddFact method
    fn add_fact(&self, fact: &str, start_time: i32, end_time: i32, temporary: bool) -> zbus::Result<i32>;

    /// GetActivities method
    fn get_activities(&self, search: &str) -> zbus::Result<Vec<(String, String)>>;

    /// FactsChanged signal
    #[zbus(signal)]
    fn facts_changed(&self) -> zbus::Result<()>;

    /// ActivitiesChanged signal
    #[zbus(signal)]
    fn activities_changed(&self) -> zbus::Result<()>;

    /// TagsChanged signal
    #[zbus(signal)]
    fn tags_changed(&self) -> zbus::Result<()>;
}
