use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Dbus connection error")]
    DbusError(#[from] zbus::Error),
    #[error("Dbus call failed")]
    DbusCallError(#[from] zbus::fdo::Error),
    #[error("Bus name {0} was not understood")]
    DbusNameError(#[from] zbus::names::Error),
    #[error("Connection to {0} has no unique name yet")]
    ConnectionNotReady(String),
    #[error("Gave up connecting to {endpoint} after {attempts} attempts")]
    RetriesExhausted { endpoint: String, attempts: u32 },
    #[error("A connection attempt is already in progress")]
    AlreadyConnecting,
}

pub type Result<T> = std::result::Result<T, Error>;
