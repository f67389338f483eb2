//! Gateway lifecycle: configuration loading, epochs, and the reload loop.

pub mod epoch;
pub mod signals;

pub use epoch::Epoch;
pub use signals::{classify, HandledSignal, SignalAction, SignalMonitor};

use crate::config::{ConfigOverrides, GatewayConfig};
use crate::error::GatewayResult;
use tracing::info;

/// Run the gateway until it is told to quit. Configuration is read from
/// scratch for every epoch, so a SIGHUP picks up edited config files.
pub async fn run(overrides: &ConfigOverrides) -> GatewayResult<()> {
    // Installed once for the process: a signal delivered during a reload
    // stays pending until the next epoch's event loop picks it up.
    let mut signals = SignalMonitor::new()?;

    loop {
        let config = GatewayConfig::load(overrides)?;
        info!(device = %config.device, host = %config.host, "starting gateway epoch");

        let mut epoch = Epoch::bring_up(config).await?;
        let reload = epoch.run(&mut signals).await?;
        epoch.tear_down().await;

        if !reload {
            return Ok(());
        }
        info!("reloading configuration");
    }
}
