//! Network time client adapter.
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::sntp::EspSntp` polling the
//!   default `pool.ntp.org` servers.  Dropping the handle stops the client.
//! - **`not(target_os = "espidf")`**: the host clock is already set;
//!   start/stop only log.

use log::info;

use crate::app::ports::SntpPort;
use crate::error::SntpError;

#[derive(Default)]
pub struct SntpClient {
    #[cfg(target_os = "espidf")]
    handle: Option<esp_idf_svc::sntp::EspSntp<'static>>,
}

impl SntpClient {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(target_os = "espidf")]
impl SntpPort for SntpClient {
    fn start(&mut self) -> Result<(), SntpError> {
        if self.handle.is_none() {
            let sntp = esp_idf_svc::sntp::EspSntp::new_default().map_err(|e| {
                log::error!("SNTP: init failed: {}", e);
                SntpError::StartFailed
            })?;
            self.handle = Some(sntp);
        }
        info!("SNTP: client running");
        Ok(())
    }

    fn stop(&mut self) {
        if self.handle.take().is_some() {
            info!("SNTP: client stopped");
        }
    }
}

#[cfg(not(target_os = "espidf"))]
impl SntpPort for SntpClient {
    fn start(&mut self) -> Result<(), SntpError> {
        info!("SNTP(sim): using host clock");
        Ok(())
    }

    fn stop(&mut self) {
        info!("SNTP(sim): stopped");
    }
}
