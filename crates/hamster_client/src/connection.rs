use crate::*;

use std::{future::Future, time::Duration};

/// Which bus the tracker lives on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// The default session bus of the current user.
    Session,
    /// A bus reachable under a custom address, e.g. `unix:path=/run/user/1000/hamster-bus`.
    Address(String),
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Endpoint::Session => write!(f, "session bus"),
            Endpoint::Address(address) => write!(f, "{}", address),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting { retries_remaining: u32 },
    Connected,
}

/// Establishes the bus connection, retrying custom endpoints that are not usable yet.
#[derive(Debug)]
pub struct ConnectionManager {
    endpoint: Endpoint,
    max_retries: u32,
    retry_delay: Duration,
    retries_remaining: u32,
    state: ConnectionState,
}

impl ConnectionManager {
    pub fn new(endpoint: Endpoint, max_retries: u32, retry_delay: Duration) -> Self {
        Self { endpoint, max_retries, retry_delay, retries_remaining: max_retries, state: ConnectionState::Disconnected }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Forget the current connection state and restore the full retry budget.
    pub fn reset(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.retries_remaining = self.max_retries;
    }

    /// Connect to the configured endpoint.
    ///
    /// The session bus is tried exactly once. Custom endpoints are retried every `retry_delay`
    /// until the retry budget is used up, after which the manager stays disconnected.
    pub async fn connect(&mut self) -> Result<zbus::Connection> {
        self.connect_with(dial).await
    }

    pub(crate) async fn connect_with<T, F, Fut>(&mut self, dial: F) -> Result<T>
    where
        F: FnMut(Endpoint) -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        if matches!(self.state, ConnectionState::Connecting { .. }) {
            return Err(Error::AlreadyConnecting);
        }
        Attempt { manager: self }.run(dial).await
    }
}

/// One run of [`ConnectionManager::connect`].
/// Dropping it halfway, e.g. when the caller stops waiting, leaves the manager disconnected.
struct Attempt<'a> {
    manager: &'a mut ConnectionManager,
}

impl Attempt<'_> {
    async fn run<T, F, Fut>(self, mut dial: F) -> Result<T>
    where
        F: FnMut(Endpoint) -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        let manager = &mut *self.manager;
        loop {
            manager.state = ConnectionState::Connecting { retries_remaining: manager.retries_remaining };
            let failure = match dial(manager.endpoint.clone()).await {
                Ok(Some(connection)) => {
                    manager.state = ConnectionState::Connected;
                    return Ok(connection);
                }
                Ok(None) => Error::ConnectionNotReady(manager.endpoint.to_string()),
                Err(err) => err,
            };

            if manager.endpoint == Endpoint::Session {
                manager.state = ConnectionState::Disconnected;
                return Err(failure);
            }

            manager.retries_remaining = manager.retries_remaining.saturating_sub(1);
            if manager.retries_remaining == 0 {
                log::error!("Could not connect to {}: {}. Giving up.", manager.endpoint, failure);
                manager.state = ConnectionState::Disconnected;
                return Err(Error::RetriesExhausted { endpoint: manager.endpoint.to_string(), attempts: manager.max_retries });
            }
            log::warn!("{}; retrying in {} seconds", failure, manager.retry_delay.as_secs());
            tokio::time::sleep(manager.retry_delay).await;
        }
    }
}

impl Drop for Attempt<'_> {
    fn drop(&mut self) {
        if matches!(self.manager.state, ConnectionState::Connecting { .. }) {
            log::debug!("Connection attempt to {} was cancelled", self.manager.endpoint);
            self.manager.state = ConnectionState::Disconnected;
        }
    }
}

async fn dial(endpoint: Endpoint) -> Result<Option<zbus::Connection>> {
    let connection = match endpoint {
        Endpoint::Session => zbus::Connection::session().await?,
        Endpoint::Address(address) => zbus::connection::Builder::address(address.as_str())?.build().await?,
    };
    if connection.unique_name().is_none() {
        return Ok(None);
    }
    Ok(Some(connection))
}
