//! Well-known bus names of the Hamster services.

pub const HAMSTER_BUS: &str = "org.gnome.Hamster";

pub const WINDOW_SERVER_BUS: &str = "org.gnome.Hamster.WindowServer";
