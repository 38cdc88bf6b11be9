use crate::{
    application_lifecycle,
    config::{self, Settings},
    controller::Controller,
    display::{DisplaySink, JsonSink},
    notifications,
    paths::HamsterbarPaths,
    refresh::{Completion, RefreshCoordinator},
};
use anyhow::{Context, Result};
use hamster_client::{Change, ConnectionManager, HamsterClient, Presence, Service, ServiceWatchers, TimeTracker};

use std::{
    future::Future,
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use tokio::{
    sync::mpsc::{UnboundedReceiver, UnboundedSender},
    time::{Instant, Interval},
};

type PanelController = Controller<HamsterClient, JsonSink<std::io::Stdout>>;

/// Receiving ends of everything the daemon reacts to, besides the exit request.
struct Events {
    reloads: UnboundedReceiver<()>,
    changes: UnboundedReceiver<Change>,
    completions: UnboundedReceiver<Completion>,
}

/// Why a session ended.
enum SessionEnd {
    Exit,
    /// The bus endpoint changed, connect again using these settings.
    Reconnect(Settings),
}

pub fn initialize_daemon(paths: HamsterbarPaths) -> Result<()> {
    log::info!("Loading paths: {}", &paths);

    simple_signal::set_handler(&[simple_signal::Signal::Int, simple_signal::Signal::Term], move |_| {
        log::info!("Shutting down hamsterbar daemon...");
        application_lifecycle::request_exit();
    });

    let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().context("Failed to initialize tokio runtime")?;
    // zbus proxies and the panel state are not Send, everything lives on this one thread
    let local = tokio::task::LocalSet::new();
    local.block_on(&rt, run_daemon(paths))
}

async fn run_daemon(paths: HamsterbarPaths) -> Result<()> {
    let mut settings = load_settings(&paths.get_settings_file());

    let (reload_send, reloads) = tokio::sync::mpsc::unbounded_channel();
    let (completion_send, completions) = tokio::sync::mpsc::unbounded_channel();
    let (change_send, changes) = tokio::sync::mpsc::unbounded_channel();
    let mut events = Events { reloads, changes, completions };

    let filewatch_handle = {
        let config_dir = paths.get_config_dir().to_path_buf();
        tokio::task::spawn_local(async move {
            crate::print_result_err!("while watching the settings file", run_filewatch(config_dir, reload_send).await);
        })
    };

    let notifier = notifications::connect().await;
    let sink = JsonSink::stdout(settings.panel_placement);
    let coordinator = RefreshCoordinator::new(sink, completion_send, settings.targets(), settings.panel_appearance);
    let mut controller = Controller::new(coordinator, change_send, notifier);
    // tell the bar right away that there's nothing to show yet
    controller.coordinator_mut().sink_mut().commit();

    loop {
        match run_session(&paths, &mut settings, &mut controller, &mut events).await? {
            SessionEnd::Exit => break,
            SessionEnd::Reconnect(new_settings) => settings = new_settings,
        }
    }

    filewatch_handle.abort();
    log::info!("hamsterbar daemon finished");
    Ok(())
}

/// Connect to the configured bus and keep the panel up to date until exit is requested or the
/// bus endpoint changes.
async fn run_session(
    paths: &HamsterbarPaths,
    settings: &mut Settings,
    controller: &mut PanelController,
    events: &mut Events,
) -> Result<SessionEnd> {
    let mut connection = ConnectionManager::new(settings.endpoint(), settings.connection_retries, settings.connection_retry_delay());
    controller.apply_settings(settings);
    controller.start();

    log::info!("Connecting to hamster on the {}", connection.endpoint());
    let connecting =
        connect_applying_reloads(connection.connect(), settings, controller, &mut events.reloads, || reload_settings(paths));
    let connected = match connecting.await {
        Connecting::Done(result) => result,
        Connecting::Ended(end) => {
            controller.stop();
            return Ok(end);
        }
    };
    let con = match connected {
        Ok(con) => con,
        Err(err) => {
            log::error!("Failed to connect to hamster on the {}: {}", connection.endpoint(), err);
            controller.stop();
            return Ok(wait_for_new_endpoint(settings, controller, &mut events.reloads, || reload_settings(paths)).await);
        }
    };
    let client = HamsterClient::new(&con).await.context("Failed to create the hamster proxy")?;

    let (presence_send, mut presences) = tokio::sync::mpsc::unbounded_channel::<(Service, Presence)>();
    let mut watchers = ServiceWatchers::default();
    watchers.install(&con, move |service, presence| {
        // the receiver only goes away while the session is being torn down
        let _ = presence_send.send((service, presence));
    });
    controller.on_connected(client);

    let mut ticks = refresh_ticks(settings);
    let mut end = SessionEnd::Exit;

    crate::loop_select_exiting! {
        Some((service, presence)) = presences.recv() => controller.on_presence(service, presence),
        Some(change) = events.changes.recv() => controller.on_change(change),
        Some(completion) = events.completions.recv() => controller.on_completion(completion),
        _ = ticks.tick() => controller.on_tick(),
        Some(()) = events.reloads.recv() => {
            let Some(new_settings) = reload_settings(paths) else { continue };
            match apply_reload(settings, controller, new_settings) {
                Reload::Applied => ticks = refresh_ticks(settings),
                Reload::Reconnect(new_settings) => {
                    end = SessionEnd::Reconnect(new_settings);
                    break;
                }
            }
        }
    }

    watchers.uninstall();
    controller.stop();
    connection.reset();
    Ok(end)
}

/// What reloaded settings ask of the running session.
enum Reload {
    Applied,
    Reconnect(Settings),
}

/// Apply reloaded settings to the panel, unless they point at another bus.
fn apply_reload<C, S>(settings: &mut Settings, controller: &mut Controller<C, S>, new_settings: Settings) -> Reload
where
    C: TimeTracker + Clone + 'static,
    S: DisplaySink,
{
    if new_settings.endpoint() != settings.endpoint() {
        log::info!("Bus endpoint changed to the {}, reconnecting", new_settings.endpoint());
        return Reload::Reconnect(new_settings);
    }
    controller.apply_settings(&new_settings);
    *settings = new_settings;
    Reload::Applied
}

/// How waiting for the bus connection ended.
enum Connecting<R> {
    Done(R),
    Ended(SessionEnd),
}

/// Wait for `connect` to finish, handling settings reloads in the meantime.
async fn connect_applying_reloads<R, C, S>(
    connect: impl Future<Output = R>,
    settings: &mut Settings,
    controller: &mut Controller<C, S>,
    reloads: &mut UnboundedReceiver<()>,
    mut reload: impl FnMut() -> Option<Settings>,
) -> Connecting<R>
where
    C: TimeTracker + Clone + 'static,
    S: DisplaySink,
{
    tokio::pin!(connect);
    loop {
        tokio::select! {
            () = application_lifecycle::wait_for_exit() => return Connecting::Ended(SessionEnd::Exit),
            result = &mut connect => return Connecting::Done(result),
            Some(()) = reloads.recv() => {
                let Some(new_settings) = reload() else { continue };
                if let Reload::Reconnect(new_settings) = apply_reload(settings, controller, new_settings) {
                    return Connecting::Ended(SessionEnd::Reconnect(new_settings));
                }
            }
        }
    }
}

/// Stay idle after a failed connection, until the settings point at another bus.
async fn wait_for_new_endpoint<C, S>(
    settings: &mut Settings,
    controller: &mut Controller<C, S>,
    reloads: &mut UnboundedReceiver<()>,
    mut reload: impl FnMut() -> Option<Settings>,
) -> SessionEnd
where
    C: TimeTracker + Clone + 'static,
    S: DisplaySink,
{
    let mut end = SessionEnd::Exit;
    crate::loop_select_exiting! {
        Some(()) = reloads.recv() => {
            let Some(new_settings) = reload() else { continue };
            if let Reload::Reconnect(new_settings) = apply_reload(settings, controller, new_settings) {
                end = SessionEnd::Reconnect(new_settings);
                break;
            }
        }
    }
    end
}

fn refresh_ticks(settings: &Settings) -> Interval {
    let period = settings.refresh_interval();
    let mut ticks = tokio::time::interval_at(Instant::now() + period, period);
    ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticks
}

fn load_settings(path: &Path) -> Settings {
    match config::read_from_file(path) {
        Ok(settings) => settings,
        Err(err) => {
            log::error!("{:?}", err);
            Settings::default()
        }
    }
}

/// Read the settings again, keeping the current ones if the file is broken.
fn reload_settings(paths: &HamsterbarPaths) -> Option<Settings> {
    match config::read_from_file(&paths.get_settings_file()) {
        Ok(settings) => {
            log::info!("Reloaded settings successfully");
            Some(settings)
        }
        Err(err) => {
            log::error!("Keeping the current settings: {:?}", err);
            None
        }
    }
}

fn is_settings_file(path: &Path) -> bool {
    path.file_name().is_some_and(|name| name == "hamsterbar.json")
}

/// Watch the configuration directory, sending a reload event whenever the settings file changes.
async fn run_filewatch<P: AsRef<Path>>(config_dir: P, reload_send: UnboundedSender<()>) -> Result<()> {
    use notify::{RecommendedWatcher, RecursiveMode, Watcher};

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let mut watcher: RecommendedWatcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| match res {
        Ok(notify::Event { kind: notify::EventKind::Modify(_) | notify::EventKind::Create(_), paths, .. }) => {
            if paths.iter().any(|path| is_settings_file(path)) {
                if let Err(err) = tx.send(()) {
                    log::warn!("Error forwarding file update event: {:?}", err);
                }
            }
        }
        Ok(_) => {}
        Err(e) => log::error!("Encountered error while watching the settings file: {}", e),
    })?;
    watcher
        .watch(config_dir.as_ref(), RecursiveMode::NonRecursive)
        .with_context(|| format!("Failed to watch {}, settings won't be reloaded", config_dir.as_ref().display()))?;

    // editors tend to write a file several times in a row, only reload once every 500ms
    let debounce_done = Arc::new(AtomicBool::new(true));

    crate::loop_select_exiting! {
        Some(()) = rx.recv() => {
            let debounce_done = debounce_done.clone();
            if debounce_done.swap(false, Ordering::SeqCst) {
                tokio::spawn(async move {
                    tokio::time::sleep(std::time::Duration::from_millis(500)).await;
                    debounce_done.store(true, Ordering::SeqCst);
                });

                // reading right away sometimes gives an empty file
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                reload_send.send(())?;
            }
        },
        else => break
    };
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        config::PanelPlacement,
        test_util::{recording_controller, RecordingNotifier},
    };
    use hamster_client::Endpoint;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn custom_bus() -> Settings {
        Settings { enable_custom_dbus: true, custom_dbus: "unix:path=/tmp/hamster".to_string(), ..Settings::default() }
    }

    fn calendar_placement() -> Settings {
        Settings { panel_placement: PanelPlacement::ReplaceCalendar, refresh_interval: 30, ..Settings::default() }
    }

    #[test]
    fn test_reload_on_same_bus_is_applied_live() {
        let notifier = RecordingNotifier::default();
        let mut controller = recording_controller(&notifier);
        let mut settings = Settings::default();

        assert!(matches!(apply_reload(&mut settings, &mut controller, calendar_placement()), Reload::Applied));
        assert_eq!(settings, calendar_placement());
        assert_eq!(controller.coordinator_mut().sink().placement, Some(PanelPlacement::ReplaceCalendar));

        match apply_reload(&mut settings, &mut controller, custom_bus()) {
            Reload::Reconnect(new_settings) => assert_eq!(new_settings.endpoint(), custom_bus().endpoint()),
            Reload::Applied => panic!("a new bus address must reconnect"),
        }
        // the running session keeps its settings until it reconnects
        assert_eq!(settings, calendar_placement());
    }

    #[tokio::test]
    async fn test_failed_connection_idles_until_endpoint_changes() {
        let notifier = RecordingNotifier::default();
        let mut controller = recording_controller(&notifier);
        let mut settings = Settings::default();
        let (reload_send, mut reloads) = tokio::sync::mpsc::unbounded_channel();
        // a broken file, a change on the same bus, then a new bus
        let mut files = vec![None, Some(calendar_placement()), Some(custom_bus())].into_iter();
        for _ in 0..3 {
            reload_send.send(()).unwrap();
        }

        let end = wait_for_new_endpoint(&mut settings, &mut controller, &mut reloads, || files.next().flatten()).await;
        assert!(matches!(end, SessionEnd::Reconnect(s) if s.endpoint() == Endpoint::Address("unix:path=/tmp/hamster".to_string())));
        assert_eq!(settings, calendar_placement());
        assert!(!controller.is_enabled());
    }

    #[tokio::test]
    async fn test_reload_while_connecting_switches_endpoint() {
        let notifier = RecordingNotifier::default();
        let mut controller = recording_controller(&notifier);
        let mut settings = Settings::default();
        let (reload_send, mut reloads) = tokio::sync::mpsc::unbounded_channel();
        reload_send.send(()).unwrap();

        let connecting = connect_applying_reloads(
            std::future::pending::<()>(),
            &mut settings,
            &mut controller,
            &mut reloads,
            || Some(custom_bus()),
        );
        let outcome = tokio::time::timeout(Duration::from_secs(1), connecting).await.unwrap();
        assert!(matches!(outcome, Connecting::Ended(SessionEnd::Reconnect(s)) if s == custom_bus()));
    }

    #[tokio::test]
    async fn test_reload_while_connecting_keeps_connecting() {
        let notifier = RecordingNotifier::default();
        let mut controller = recording_controller(&notifier);
        let mut settings = Settings::default();
        let (reload_send, mut reloads) = tokio::sync::mpsc::unbounded_channel();
        reload_send.send(()).unwrap();

        let connect = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            "connection"
        };
        let outcome =
            connect_applying_reloads(connect, &mut settings, &mut controller, &mut reloads, || Some(calendar_placement())).await;
        assert!(matches!(outcome, Connecting::Done("connection")));
        assert_eq!(settings, calendar_placement());
        assert_eq!(controller.coordinator_mut().sink().placement, Some(PanelPlacement::ReplaceCalendar));
    }

    #[test]
    fn test_only_settings_file_triggers_reload() {
        assert!(is_settings_file(Path::new("/home/user/.config/hamsterbar/hamsterbar.json")));
        assert!(!is_settings_file(Path::new("/home/user/.config/hamsterbar/hamsterbar.json.swp")));
        assert!(!is_settings_file(Path::new("/home/user/.config/hamsterbar")));
    }

    #[tokio::test]
    async fn test_refresh_ticks_wait_a_full_period() {
        let settings = Settings { refresh_interval: 60, ..Settings::default() };
        let mut ticks = refresh_ticks(&settings);
        assert_eq!(ticks.period(), std::time::Duration::from_secs(60));
        assert!(tokio::time::timeout(std::time::Duration::from_millis(10), ticks.tick()).await.is_err());
    }
}
