use hamster_client::{Change, Presence, Service, ServiceState, TimeTracker};
use tokio::{sync::mpsc::UnboundedSender, task::JoinHandle};

use crate::{
    config::Settings,
    display::DisplaySink,
    notifications::Notifier,
    refresh::{Completion, RefreshCoordinator},
};

/// Decides when the panel is set up and torn down.
///
/// The panel only exists while the controller is started, a client is connected, and both
/// `hamster-service` and `hamster-windows-service` are present on the bus.
pub struct Controller<C, S> {
    started: bool,
    client: Option<C>,
    api: ServiceState,
    window_server: ServiceState,
    coordinator: RefreshCoordinator<C, S>,
    change_subscription: Option<JoinHandle<()>>,
    changes: UnboundedSender<Change>,
    notifier: Box<dyn Notifier>,
}

impl<C: TimeTracker + Clone + 'static, S: DisplaySink> Controller<C, S> {
    pub fn new(coordinator: RefreshCoordinator<C, S>, changes: UnboundedSender<Change>, notifier: Box<dyn Notifier>) -> Self {
        Controller {
            started: false,
            client: None,
            api: ServiceState::Unknown,
            window_server: ServiceState::Unknown,
            coordinator,
            change_subscription: None,
            changes,
            notifier,
        }
    }

    pub fn start(&mut self) {
        self.started = true;
        self.deferred_enable();
    }

    /// Tear everything down and forget the client. Presence is unknown until watchers report again.
    pub fn stop(&mut self) {
        log::info!("Shutting down hamsterbar");
        self.started = false;
        self.run_disable();
        self.client = None;
        self.api = ServiceState::Unknown;
        self.window_server = ServiceState::Unknown;
    }

    pub fn is_enabled(&self) -> bool {
        self.coordinator.is_enabled()
    }

    pub fn service_state(&self, service: Service) -> ServiceState {
        match service {
            Service::Api => self.api,
            Service::WindowServer => self.window_server,
        }
    }

    pub fn coordinator_mut(&mut self) -> &mut RefreshCoordinator<C, S> {
        &mut self.coordinator
    }

    pub fn on_connected(&mut self, client: C) {
        self.client = Some(client);
        self.deferred_enable();
    }

    pub fn on_presence(&mut self, service: Service, presence: Presence) {
        let previous = self.service_state(service);
        match service {
            Service::Api => self.api = presence.into(),
            Service::WindowServer => self.window_server = presence.into(),
        }

        match presence {
            Presence::Present => {
                log::info!("'{}' is running.", service.process_name());
                self.deferred_enable();
            }
            Presence::Absent => {
                let message = format!("hamsterbar: '{}' not running. Shutting down.", service.process_name());
                log::warn!("{}", message);
                if previous != ServiceState::Absent {
                    self.notifier.notify(&message);
                }
                self.run_disable();
            }
        }
    }

    /// Set up the panel if everything it needs is there. Does nothing if it is already set up.
    /// Returns whether the panel is set up afterwards.
    pub fn deferred_enable(&mut self) -> bool {
        if !self.started || self.api != ServiceState::Present || self.window_server != ServiceState::Present {
            return false;
        }
        let Some(client) = self.client.clone() else {
            return false;
        };
        if self.is_enabled() {
            return true;
        }

        log::info!("Hamster is available, setting up the panel");
        self.change_subscription = Some(client.watch_changes(self.changes.clone()));
        self.coordinator.enable(client);
        self.coordinator.refresh();
        self.coordinator.refresh_activities();
        true
    }

    /// Tear down the panel. Signal subscriptions go first, so no late notification reaches a
    /// disabled coordinator.
    pub fn run_disable(&mut self) {
        if let Some(subscription) = self.change_subscription.take() {
            subscription.abort();
        }
        self.coordinator.disable();
    }

    pub fn on_change(&mut self, change: Change) {
        match change {
            Change::Facts | Change::Tags => self.coordinator.refresh(),
            Change::Activities => {
                self.coordinator.refresh_activities();
            }
        }
    }

    pub fn on_tick(&mut self) {
        self.coordinator.refresh();
    }

    pub fn on_completion(&mut self, completion: Completion) {
        self.coordinator.apply(completion);
    }

    pub fn apply_settings(&mut self, settings: &Settings) {
        self.coordinator.set_targets(settings.targets());
        self.coordinator.set_appearance(settings.panel_appearance);
        self.coordinator.sink_mut().set_placement(settings.panel_placement);
        self.coordinator.refresh();
    }
}
