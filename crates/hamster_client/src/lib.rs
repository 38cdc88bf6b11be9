pub mod proxy;

mod client;
pub use client::*;

mod connection;
pub use connection::*;

mod error;
pub use error::*;

mod fact;
pub use fact::*;

pub mod names;

mod watcher;
pub use watcher::*;
