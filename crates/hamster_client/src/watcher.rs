use crate::*;

use futures::StreamExt;

/// Whether a watched bus name currently has an owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Present,
    Absent,
}

/// Last known state of a watched service. Only changed by watcher callbacks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ServiceState {
    #[default]
    Unknown,
    Present,
    Absent,
}

impl From<Presence> for ServiceState {
    fn from(presence: Presence) -> Self {
        match presence {
            Presence::Present => ServiceState::Present,
            Presence::Absent => ServiceState::Absent,
        }
    }
}

/// The services hamsterbar depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    /// `hamster-service`, which owns the facts.
    Api,
    /// `hamster-windows-service`, which opens the hamster dialogs.
    WindowServer,
}

impl Service {
    pub fn bus_name(self) -> &'static str {
        match self {
            Service::Api => names::HAMSTER_BUS,
            Service::WindowServer => names::WINDOW_SERVER_BUS,
        }
    }

    pub fn process_name(self) -> &'static str {
        match self {
            Service::Api => "hamster-service",
            Service::WindowServer => "hamster-windows-service",
        }
    }
}

/// A running name watch. Dropping the handle stops the watch.
#[derive(Debug)]
pub struct WatcherHandle {
    name: String,
    task: tokio::task::JoinHandle<()>,
}

impl WatcherHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stop watching. Consumes the handle, so a watch can't be removed twice.
    pub fn unwatch(self) {
        log::debug!("no longer watching {}", self.name);
    }
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Watch a bus name for appearing and vanishing owners.
///
/// `on_change` is called once with the initial presence of the name, and then for every change.
/// If the watch fails or the bus goes away, the name is reported absent one last time.
/// Must be called from within a [`tokio::task::LocalSet`].
pub fn watch<F>(con: &zbus::Connection, name: &str, mut on_change: F) -> WatcherHandle
where
    F: FnMut(Presence) + 'static,
{
    let task = tokio::task::spawn_local({
        let con = con.clone();
        let name = name.to_owned();
        async move {
            let result = watch_name_owner(&con, &name, &mut on_change).await;
            report_watch_end(&name, result, &mut on_change);
        }
    });
    WatcherHandle { name: name.to_owned(), task }
}

async fn watch_name_owner<F: FnMut(Presence)>(con: &zbus::Connection, name: &str, on_change: &mut F) -> Result<()> {
    let bus_name = zbus::names::BusName::try_from(name)?;
    let dbus = zbus::fdo::DBusProxy::new(con).await?;
    // subscribe before asking for the current owner, so no change can slip through in between
    let mut owner_changes = dbus.receive_name_owner_changed_with_args(&[(0, name)]).await?;

    let mut owner = OwnerTracker::default();
    if let Some(presence) = owner.update(dbus.name_has_owner(bus_name).await?) {
        on_change(presence);
    }

    while let Some(sig) = owner_changes.next().await {
        let args = sig.args()?;
        if let Some(presence) = owner.update(args.new_owner().is_some()) {
            on_change(presence);
        }
    }

    Ok(())
}

/// Nothing reports on the name anymore, so treat it as gone.
fn report_watch_end<F: FnMut(Presence)>(name: &str, result: Result<()>, on_change: &mut F) {
    match result {
        Ok(()) => log::warn!("lost the bus connection while watching {}", name),
        Err(e) => log::error!("failed to watch {}: {}", name, e),
    }
    on_change(Presence::Absent);
}

/// Turns owner changes of a name into presence transitions.
#[derive(Debug, Default)]
struct OwnerTracker {
    has_owner: Option<bool>,
}

impl OwnerTracker {
    /// Returns the new presence, or `None` if it didn't change. The first update always reports.
    fn update(&mut self, has_owner: bool) -> Option<Presence> {
        if self.has_owner == Some(has_owner) {
            return None;
        }
        self.has_owner = Some(has_owner);
        Some(if has_owner { Presence::Present } else { Presence::Absent })
    }
}

/// The watchers of both required services. Each one is installed at most once.
#[derive(Debug, Default)]
pub struct ServiceWatchers {
    api: Option<WatcherHandle>,
    window_server: Option<WatcherHandle>,
}

impl ServiceWatchers {
    fn slot(&mut self, service: Service) -> &mut Option<WatcherHandle> {
        match service {
            Service::Api => &mut self.api,
            Service::WindowServer => &mut self.window_server,
        }
    }

    pub fn is_installed(&self, service: Service) -> bool {
        match service {
            Service::Api => self.api.is_some(),
            Service::WindowServer => self.window_server.is_some(),
        }
    }

    /// Install a watcher for `service` unless one is already running.
    /// Returns whether a new watcher was installed.
    pub fn install_with<F>(&mut self, service: Service, start: F) -> bool
    where
        F: FnOnce() -> WatcherHandle,
    {
        let slot = self.slot(service);
        if slot.is_some() {
            return false;
        }
        *slot = Some(start());
        true
    }

    /// Install watchers for both services on `con`, reporting every presence change to `on_change`.
    pub fn install<F>(&mut self, con: &zbus::Connection, on_change: F)
    where
        F: Fn(Service, Presence) + Clone + 'static,
    {
        for service in [Service::Api, Service::WindowServer] {
            let on_change = on_change.clone();
            self.install_with(service, || watch(con, service.bus_name(), move |presence| on_change(service, presence)));
        }
    }

    /// Remove all installed watchers.
    pub fn uninstall(&mut self) {
        for handle in [self.api.take(), self.window_server.take()].into_iter().flatten() {
            handle.unwatch();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn dummy_handle(name: &str) -> WatcherHandle {
        WatcherHandle { name: name.to_string(), task: tokio::spawn(std::future::pending()) }
    }

    #[tokio::test]
    async fn test_install_is_guarded_by_stored_handle() {
        let mut watchers = ServiceWatchers::default();
        let mut started = 0;
        assert!(watchers.install_with(Service::Api, || {
            started += 1;
            dummy_handle(Service::Api.bus_name())
        }));
        assert!(!watchers.install_with(Service::Api, || {
            started += 1;
            dummy_handle(Service::Api.bus_name())
        }));
        assert_eq!(started, 1);
        assert!(watchers.is_installed(Service::Api));
        assert!(!watchers.is_installed(Service::WindowServer));
    }

    #[tokio::test]
    async fn test_uninstall_clears_handles() {
        let mut watchers = ServiceWatchers::default();
        watchers.install_with(Service::Api, || dummy_handle("a"));
        watchers.install_with(Service::WindowServer, || dummy_handle("b"));
        watchers.uninstall();
        assert!(!watchers.is_installed(Service::Api));
        assert!(!watchers.is_installed(Service::WindowServer));
        // a second uninstall has nothing left to remove
        watchers.uninstall();
        assert!(watchers.install_with(Service::Api, || dummy_handle("a")));
    }

    #[test]
    fn test_presence_maps_to_service_state() {
        assert_eq!(ServiceState::from(Presence::Present), ServiceState::Present);
        assert_eq!(ServiceState::from(Presence::Absent), ServiceState::Absent);
        assert_eq!(ServiceState::default(), ServiceState::Unknown);
    }

    #[test]
    fn test_owner_changes_report_transitions_only() {
        let mut owner = OwnerTracker::default();
        assert_eq!(owner.update(false), Some(Presence::Absent));
        assert_eq!(owner.update(false), None);
        assert_eq!(owner.update(true), Some(Presence::Present));
        // an owner handing the name over to another connection is no change
        assert_eq!(owner.update(true), None);
        assert_eq!(owner.update(false), Some(Presence::Absent));
    }

    #[test]
    fn test_ended_watch_reports_absence() {
        let mut reported = Vec::new();
        let failed = Err(Error::ConnectionNotReady("session bus".to_string()));
        report_watch_end("org.gnome.Hamster", failed, &mut |p: Presence| reported.push(p));
        report_watch_end("org.gnome.Hamster", Ok(()), &mut |p: Presence| reported.push(p));
        assert_eq!(reported, vec![Presence::Absent, Presence::Absent]);
    }
}
