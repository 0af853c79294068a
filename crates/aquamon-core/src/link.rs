//! WiFi association state machine
//!
//! ```text
//! Disconnected -> Connecting -> Connected
//!                     |              |
//!                     v              v
//!                  Failed       Disconnected (link lost, reconnect allowed)
//! ```
//!
//! `Failed` is terminal. Once the radio reports an explicit connect failure
//! the link never touches it again; what halting means (idle forever,
//! watchdog reset, alarm) is up to the caller.

use core::future::Future;

use embedded_hal_async::delay::DelayNs;
use log::{debug, error, info, warn};
use thiserror_no_std::Error;

use crate::config::InternetConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

/// What the radio reports when polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationStatus {
    /// Not associated and not trying
    Idle,
    /// Association in progress
    Connecting,
    Connected,
    /// The access point rejected us or could not be joined
    ConnectFailed,
}

/// The WiFi radio, seen from the link.
pub trait Association {
    /// Start associating with the given network.
    fn begin(&mut self, ssid: &str, password: &str) -> impl Future<Output = ()>;

    /// Current association status. Must not block.
    fn status(&mut self) -> AssociationStatus;
}

/// Lifecycle hooks for [`NetworkLink::connect`].
///
/// Every hook defaults to doing nothing, so an observer only implements the
/// ones it cares about and `()` is the "no hooks" observer.
pub trait LinkObserver {
    /// Called once per poll while association is still in progress.
    fn on_connecting(&mut self) {}

    fn on_success(&mut self) {}

    /// Called once when association fails, right before the link halts.
    fn on_fail(&mut self) {}
}

impl LinkObserver for () {}

impl<O: LinkObserver> LinkObserver for &mut O {
    fn on_connecting(&mut self) {
        (**self).on_connecting();
    }

    fn on_success(&mut self) {
        (**self).on_success();
    }

    fn on_fail(&mut self) {
        (**self).on_fail();
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    #[error("WiFi association failed")]
    AssociationFailed,
    #[error("Network link is halted after an association failure")]
    Halted,
}

pub struct NetworkLink<A, D> {
    association: A,
    delay: D,
    poll_interval_ms: u32,
    state: LinkState,
}

impl<A: Association, D: DelayNs> NetworkLink<A, D> {
    pub fn new(association: A, delay: D, poll_interval_ms: u32) -> Self {
        Self {
            association,
            delay,
            poll_interval_ms,
            state: LinkState::Disconnected,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn association(&self) -> &A {
        &self.association
    }

    /// Associate with the configured network.
    ///
    /// Polls the radio every `poll_interval_ms`, calling
    /// [`LinkObserver::on_connecting`] after each wait, until it reports
    /// either success or an explicit failure. This wait is the only place the
    /// agent suspends on purpose.
    ///
    /// On failure the link moves to [`LinkState::Failed`] and every later call
    /// returns [`LinkError::Halted`] without touching the radio.
    pub async fn connect<O: LinkObserver>(
        &mut self,
        credentials: &InternetConfig<'_>,
        mut observer: O,
    ) -> Result<(), LinkError> {
        if self.state == LinkState::Failed {
            return Err(LinkError::Halted);
        }

        info!("Connecting to WiFi \"{}\"", credentials.ssid);
        self.state = LinkState::Connecting;
        self.association
            .begin(credentials.ssid, credentials.password)
            .await;

        let mut polls: u32 = 0;
        loop {
            match self.association.status() {
                AssociationStatus::Connected => {
                    info!("WiFi connected after {} polls", polls);
                    self.state = LinkState::Connected;
                    observer.on_success();
                    return Ok(());
                }
                AssociationStatus::ConnectFailed => {
                    error!("WiFi connection failed after {} polls, halting link", polls);
                    self.state = LinkState::Failed;
                    observer.on_fail();
                    return Err(LinkError::AssociationFailed);
                }
                AssociationStatus::Idle | AssociationStatus::Connecting => {
                    self.delay.delay_ms(self.poll_interval_ms).await;
                    polls = polls.saturating_add(1);
                    debug!("WiFi still connecting (poll {})", polls);
                    observer.on_connecting();
                }
            }
        }
    }

    /// Re-read the radio status and notice a lost association.
    ///
    /// `Connected` drops back to `Disconnected` when the radio no longer
    /// reports an association, so the caller can reconnect.
    pub fn refresh(&mut self) -> LinkState {
        if self.state == LinkState::Connected
            && self.association.status() != AssociationStatus::Connected
        {
            warn!("WiFi association lost");
            self.state = LinkState::Disconnected;
        }
        self.state
    }

    pub fn is_connected(&mut self) -> bool {
        self.refresh() == LinkState::Connected
    }
}
