//! Global shutdown of the hamsterbar process.
//! Long-running tasks await [`wait_for_exit`] (usually through `loop_select_exiting!`) and clean up
//! once the process is asked to terminate.

use once_cell::sync::Lazy;
use tokio::sync::watch;

static EXIT_REQUESTED: Lazy<watch::Sender<bool>> = Lazy::new(|| watch::channel(false).0);

/// Ask all listening tasks to shut down. Safe to call from signal handler threads.
pub fn request_exit() {
    EXIT_REQUESTED.send_replace(true);
}

/// Resolves once [`request_exit`] has been called, including calls made before this was awaited.
pub async fn wait_for_exit() {
    let mut recv = EXIT_REQUESTED.subscribe();
    // the sender lives in a static, so this can't fail with a closed channel
    let _ = recv.wait_for(|exit| *exit).await;
}

/// Select in a loop, breaking once application exit was requested.
#[macro_export]
macro_rules! loop_select_exiting {
    ($($content:tt)*) => {
        loop {
            tokio::select! {
                () = $crate::application_lifecycle::wait_for_exit() => {
                    break;
                }
                $($content)*
            }
        }
    };
}
