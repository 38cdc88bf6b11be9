//! Proxies for the Hamster DBus services, so we can call them.
//!
//! Written by hand from the introspection data of `hamster-service` and `hamster-windows-service`:
//!
//! ```sh
//! dbus-send --session --type=method_call --print-reply --dest=org.gnome.Hamster \
//!     /org/gnome/Hamster org.freedesktop.DBus.Introspectable.Introspect
//! ```
//!
//! For more information, see ["Writing a client proxy" in the zbus
//! tutorial](https://dbus2.github.io/zbus/).

mod hamster;
pub use hamster::*;

mod window_server;
pub use window_server::*;
