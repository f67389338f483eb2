//! Unix signal handling for the gateway lifecycle.
//!
//! SIGTERM stops the gateway, SIGHUP tears the current epoch down and starts
//! a fresh one, SIGUSR1 is accepted and ignored. SIGINT is deliberately not
//! installed, so Ctrl-C keeps its default process behavior.

use crate::error::{GatewayError, GatewayResult};
use tokio::signal::unix::{signal, Signal, SignalKind};
use tracing::{debug, info};

/// What the event loop should do about a delivered signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    /// Tear down and exit cleanly.
    Quit,
    /// Tear down, reload configuration, bring everything back up.
    Reload,
    /// Acknowledged but has no effect.
    Ignore,
}

/// Signals handled by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandledSignal {
    Hangup,
    Terminate,
    UserDefined1,
}

/// Map a delivered signal to its lifecycle action.
pub fn classify(signal: HandledSignal) -> SignalAction {
    match signal {
        HandledSignal::Hangup => SignalAction::Reload,
        HandledSignal::Terminate => SignalAction::Quit,
        HandledSignal::UserDefined1 => SignalAction::Ignore,
    }
}

/// Owns the installed signal listeners for one epoch. Dropping it releases
/// the registrations.
pub struct SignalMonitor {
    hangup: Signal,
    terminate: Signal,
    user_defined1: Signal,
}

impl SignalMonitor {
    pub fn new() -> GatewayResult<Self> {
        Ok(Self {
            hangup: signal(SignalKind::hangup()).map_err(GatewayError::SignalOpen)?,
            terminate: signal(SignalKind::terminate()).map_err(GatewayError::SignalOpen)?,
            user_defined1: signal(SignalKind::user_defined1()).map_err(GatewayError::SignalOpen)?,
        })
    }

    /// Wait for the next handled signal and return its action. A closed
    /// signal stream means the runtime is shutting down underneath us, which
    /// is reported as an error.
    pub async fn recv(&mut self) -> GatewayResult<SignalAction> {
        let signal = tokio::select! {
            received = self.hangup.recv() => received.map(|_| HandledSignal::Hangup),
            received = self.terminate.recv() => received.map(|_| HandledSignal::Terminate),
            received = self.user_defined1.recv() => received.map(|_| HandledSignal::UserDefined1),
        };

        match signal {
            Some(signal) => {
                let action = classify(signal);
                match action {
                    SignalAction::Ignore => debug!(?signal, "ignoring signal"),
                    _ => info!(?signal, ?action, "signal received"),
                }
                Ok(action)
            }
            None => Err(GatewayError::SignalRead),
        }
    }
}
