//! GSM PPPoS link adapter.
//!
//! Implements [`LinkPort`] over the libGSM component, which owns the UART,
//! the AT command dialogue with the modem and the lwIP PPP interface.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: calls into libGSM (`ppposInit`,
//!   `ppposStatus`, `ppposDisconnect`, `gsm_RFOn`, `gsm_RFOff`).
//! - **all other targets**: an in-memory modem for host-side runs.  Bring-up
//!   succeeds unless the radio has been marked unreachable.

use log::info;

use crate::app::ports::{LinkPort, LinkStatus};

// ───────────────────────────────────────────────────────────────
// libGSM bindings
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
mod ffi {
    use core::ffi::c_int;

    /// `GSM_STATE_DISCONNECTED`
    pub const GSM_STATE_DISCONNECTED: c_int = 0;
    /// `GSM_STATE_CONNECTED`
    pub const GSM_STATE_CONNECTED: c_int = 1;

    unsafe extern "C" {
        /// Starts the PPPoS task if needed and waits for the session.
        /// Returns 1 when connected.
        pub fn ppposInit() -> c_int;
        pub fn ppposStatus() -> c_int;
        pub fn ppposDisconnect(end_task: u8, rfoff: u8);
        pub fn gsm_RFOn() -> c_int;
        pub fn gsm_RFOff() -> c_int;
    }
}

// ───────────────────────────────────────────────────────────────
// GsmLink
// ───────────────────────────────────────────────────────────────

pub struct GsmLink {
    #[cfg(not(target_os = "espidf"))]
    connected: bool,
    #[cfg(not(target_os = "espidf"))]
    radio_on: bool,
    #[cfg(not(target_os = "espidf"))]
    reachable: bool,
}

impl Default for GsmLink {
    fn default() -> Self {
        Self::new()
    }
}

impl GsmLink {
    #[cfg(target_os = "espidf")]
    pub fn new() -> Self {
        Self {}
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Self {
        Self { connected: false, radio_on: true, reachable: true }
    }

    /// Make every later bring-up fail (simulation only).
    #[cfg(not(target_os = "espidf"))]
    pub fn set_reachable(&mut self, reachable: bool) {
        self.reachable = reachable;
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn is_radio_on(&self) -> bool {
        self.radio_on
    }
}

#[cfg(target_os = "espidf")]
impl LinkPort for GsmLink {
    fn bring_up(&mut self) -> bool {
        // SAFETY: libGSM serialises its own state; the link token keeps
        // callers from overlapping.
        let up = unsafe { ffi::ppposInit() } != 0;
        if up {
            info!("Link: PPPoS connected");
        } else {
            log::error!("Link: PPPoS bring-up failed");
        }
        up
    }

    fn status(&self) -> LinkStatus {
        // SAFETY: read-only status query.
        match unsafe { ffi::ppposStatus() } {
            ffi::GSM_STATE_CONNECTED => LinkStatus::Connected,
            ffi::GSM_STATE_DISCONNECTED => LinkStatus::Disconnected,
            _ => LinkStatus::Connecting,
        }
    }

    fn disconnect(&mut self, close_session: bool, radio_off: bool) {
        // SAFETY: see `bring_up`.
        unsafe { ffi::ppposDisconnect(u8::from(close_session), u8::from(radio_off)) };
        info!("Link: disconnected (end_task={}, rf_off={})", close_session, radio_off);
    }

    fn radio_on(&mut self) {
        // SAFETY: see `bring_up`.
        unsafe { ffi::gsm_RFOn() };
    }

    fn radio_off(&mut self) {
        // SAFETY: see `bring_up`.
        unsafe { ffi::gsm_RFOff() };
        info!("Link: RF off");
    }
}

#[cfg(not(target_os = "espidf"))]
impl LinkPort for GsmLink {
    fn bring_up(&mut self) -> bool {
        if self.connected {
            return true;
        }
        if !self.reachable {
            info!("Link(sim): bring-up failed, modem unreachable");
            return false;
        }
        self.radio_on = true;
        self.connected = true;
        info!("Link(sim): PPPoS connected");
        true
    }

    fn status(&self) -> LinkStatus {
        if self.connected { LinkStatus::Connected } else { LinkStatus::Disconnected }
    }

    fn disconnect(&mut self, close_session: bool, radio_off: bool) {
        self.connected = false;
        if radio_off {
            self.radio_on = false;
        }
        info!("Link(sim): disconnected (end_task={}, rf_off={})", close_session, radio_off);
    }

    fn radio_on(&mut self) {
        self.radio_on = true;
    }

    fn radio_off(&mut self) {
        self.radio_on = false;
        info!("Link(sim): RF off");
    }
}
