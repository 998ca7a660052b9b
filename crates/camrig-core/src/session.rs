// Session scoping: every session is closed on the way out, success or not.

use std::net::Ipv4Addr;
use std::time::Duration;

use camrig_api::{Error, SessionOptions, SwitchDriver, SwitchSession};
use tracing::debug;

use crate::error::CoreError;

/// Close `session` and hand back `result` untouched. A failed logout is
/// only logged; the operation's own outcome is what matters.
pub(crate) async fn close_after<T>(
    session: Box<dyn SwitchSession>,
    address: Ipv4Addr,
    result: Result<T, Error>,
) -> Result<T, Error> {
    if let Err(e) = session.close().await {
        debug!(%address, error = %e, "session close failed");
    }
    result
}

/// Open a session on `address`, pulse PoE on `ports` and close it.
pub(crate) async fn power_cycle(
    driver: &dyn SwitchDriver,
    interface: &str,
    address: Ipv4Addr,
    ports: &[u16],
    options: SessionOptions,
    pulse: Duration,
) -> Result<(), CoreError> {
    let wrap = |source| CoreError::Switch {
        interface: interface.to_owned(),
        address,
        source,
    };
    debug!(interface, %address, ?ports, "power cycle");
    let mut session = driver.open(address, options).await.map_err(wrap)?;
    let result = session.power_cycle(ports, pulse).await;
    close_after(session, address, result).await.map_err(wrap)
}
