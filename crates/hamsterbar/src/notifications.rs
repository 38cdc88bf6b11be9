//! User-visible notifications, sent through the freedesktop notification service.

use std::collections::HashMap;

use zbus::zvariant::Value;

#[zbus::proxy(
    interface = "org.freedesktop.Notifications",
    default_service = "org.freedesktop.Notifications",
    default_path = "/org/freedesktop/Notifications"
)]
trait Notifications {
    fn notify(
        &self,
        app_name: &str,
        replaces_id: u32,
        app_icon: &str,
        summary: &str,
        body: &str,
        actions: &[&str],
        hints: HashMap<&str, Value<'_>>,
        expire_timeout: i32,
    ) -> zbus::Result<u32>;
}

pub trait Notifier {
    fn notify(&self, summary: &str);
}

/// Shows notifications as desktop notification popups.
pub struct DesktopNotifier {
    proxy: NotificationsProxy<'static>,
}

impl DesktopNotifier {
    pub async fn new() -> zbus::Result<Self> {
        // notifications always go to the session bus, even if hamster lives on a custom one
        let con = zbus::Connection::session().await?;
        let proxy = NotificationsProxy::new(&con).await?;
        Ok(Self { proxy })
    }
}

impl Notifier for DesktopNotifier {
    fn notify(&self, summary: &str) {
        let proxy = self.proxy.clone();
        let summary = summary.to_owned();
        tokio::task::spawn_local(async move {
            let result = proxy.notify("hamsterbar", 0, "hamster-idle-symbolic", &summary, "", &[], HashMap::new(), -1).await;
            crate::print_result_err!("while sending desktop notification", result);
        });
    }
}

/// Fallback when there is no notification service, only logs.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, summary: &str) {
        log::warn!("{}", summary);
    }
}

/// The desktop notifier if the session bus is reachable, otherwise the log.
pub async fn connect() -> Box<dyn Notifier> {
    match DesktopNotifier::new().await {
        Ok(notifier) => Box::new(notifier),
        Err(err) => {
            log::warn!("Desktop notifications are unavailable: {}", err);
            Box::new(LogNotifier)
        }
    }
}
