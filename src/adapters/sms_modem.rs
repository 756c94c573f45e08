//! Modem text-message adapter.
//!
//! Implements [`SmsPort`] over libGSM's `smsSend` / `smsRead` /
//! `smsDelete`.  The modem must already be in command mode (the SMS engine
//! arranges that through the link guard).
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: libGSM FFI.  Each message body is a C
//!   allocation owned by a [`ModemText`] that frees it on drop.
//! - **all other targets**: an in-memory SIM store for host-side runs.

use log::info;

use crate::app::ports::{SmsInbox, SmsMessage, SmsPort};
use crate::config::bounded;
use crate::error::SmsError;

// ───────────────────────────────────────────────────────────────
// libGSM bindings
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
mod ffi {
    use core::ffi::{c_char, c_int};

    #[repr(C)]
    pub struct SmsMsg {
        pub idx: c_int,
        pub msg: *mut c_char,
        pub stat: [c_char; 32],
        pub from: [c_char; 32],
        pub time: [c_char; 32],
        pub time_value: esp_idf_svc::sys::time_t,
        pub tz: c_int,
    }

    #[repr(C)]
    pub struct SmsMessages {
        pub messages: *mut SmsMsg,
        pub nmsg: u8,
    }

    unsafe extern "C" {
        /// Returns 1 on success.
        pub fn smsSend(smsnum: *const c_char, msg: *const c_char) -> c_int;
        /// `sort`: -1 descending by time, 0 unsorted, 1 ascending.
        pub fn smsRead(messages: *mut SmsMessages, sort: c_int);
        /// Returns 1 on success.
        pub fn smsDelete(idx: c_int) -> c_int;
    }
}

// ───────────────────────────────────────────────────────────────
// Message body
// ───────────────────────────────────────────────────────────────

/// Body text allocated by libGSM, released exactly once on drop.
#[cfg(target_os = "espidf")]
pub struct ModemText {
    ptr: *mut core::ffi::c_char,
}

#[cfg(target_os = "espidf")]
unsafe impl Send for ModemText {}

#[cfg(target_os = "espidf")]
impl AsRef<str> for ModemText {
    fn as_ref(&self) -> &str {
        if self.ptr.is_null() {
            return "";
        }
        // SAFETY: libGSM hands out NUL-terminated heap strings that live
        // until we free them in `drop`.
        unsafe { core::ffi::CStr::from_ptr(self.ptr) }.to_str().unwrap_or("")
    }
}

#[cfg(target_os = "espidf")]
impl Drop for ModemText {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            // SAFETY: allocated with malloc by libGSM, freed only here.
            unsafe { esp_idf_svc::sys::free(self.ptr.cast()) };
        }
    }
}

#[cfg(target_os = "espidf")]
impl core::fmt::Debug for ModemText {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("ModemText").field(&self.as_ref()).finish()
    }
}

#[cfg(target_os = "espidf")]
fn c_field<const N: usize>(raw: &[core::ffi::c_char]) -> heapless::String<N> {
    let bytes: Vec<u8> = raw.iter().take_while(|&&c| c != 0).map(|&c| c as u8).collect();
    bounded(&String::from_utf8_lossy(&bytes))
}

// ───────────────────────────────────────────────────────────────
// SmsModem
// ───────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct SmsModem {
    #[cfg(not(target_os = "espidf"))]
    stored: Vec<SmsMessage<String>>,
    #[cfg(not(target_os = "espidf"))]
    sent: Vec<(String, String)>,
}

impl SmsModem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a message on the simulated SIM.
    #[cfg(not(target_os = "espidf"))]
    pub fn receive(&mut self, index: u32, sender: &str, body: &str, raw_time: i64) {
        self.stored.push(SmsMessage {
            index,
            sender: bounded(sender),
            status: bounded("REC UNREAD"),
            display_time: bounded("sim"),
            tz_offset: 0,
            raw_time,
            body: body.to_string(),
        });
    }

    /// Messages sent so far as `(destination, body)`.
    #[cfg(not(target_os = "espidf"))]
    pub fn sent(&self) -> &[(String, String)] {
        &self.sent
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn stored_indices(&self) -> Vec<u32> {
        self.stored.iter().map(|m| m.index).collect()
    }
}

#[cfg(target_os = "espidf")]
impl SmsPort for SmsModem {
    type Body = ModemText;

    fn send(&mut self, destination: &str, body: &str) -> Result<(), SmsError> {
        let number = std::ffi::CString::new(destination).map_err(|_| SmsError::SendFailed)?;
        let text = std::ffi::CString::new(body).map_err(|_| SmsError::SendFailed)?;
        // SAFETY: both strings are NUL-terminated and outlive the call.
        if unsafe { ffi::smsSend(number.as_ptr(), text.as_ptr()) } == 1 {
            Ok(())
        } else {
            Err(SmsError::SendFailed)
        }
    }

    fn read_all(&mut self) -> Result<SmsInbox<ModemText>, SmsError> {
        let mut raw = ffi::SmsMessages { messages: core::ptr::null_mut(), nmsg: 0 };
        // SAFETY: libGSM fills `raw`; a non-null array holds `nmsg` entries.
        unsafe { ffi::smsRead(&mut raw, -1) };
        if raw.messages.is_null() {
            return Ok(SmsInbox::empty());
        }

        let mut out = Vec::with_capacity(usize::from(raw.nmsg));
        for i in 0..usize::from(raw.nmsg) {
            // SAFETY: i < nmsg; each entry is read once and its body pointer
            // moves into a `ModemText`.
            let m = unsafe { &*raw.messages.add(i) };
            out.push(SmsMessage {
                index: m.idx as u32,
                sender: c_field(&m.from),
                status: c_field(&m.stat),
                display_time: c_field(&m.time),
                tz_offset: m.tz as i8,
                raw_time: m.time_value as i64,
                body: ModemText { ptr: m.msg },
            });
        }
        // SAFETY: the array was malloc'd by libGSM; bodies are owned above.
        unsafe { esp_idf_svc::sys::free(raw.messages.cast()) };
        info!("SMS: read {} message(s) from SIM", out.len());
        Ok(SmsInbox::new(out))
    }

    fn delete(&mut self, index: u32) -> Result<(), SmsError> {
        // SAFETY: plain integer argument.
        if unsafe { ffi::smsDelete(index as core::ffi::c_int) } == 1 {
            Ok(())
        } else {
            Err(SmsError::DeleteFailed)
        }
    }
}

#[cfg(not(target_os = "espidf"))]
impl SmsPort for SmsModem {
    type Body = String;

    fn send(&mut self, destination: &str, body: &str) -> Result<(), SmsError> {
        if destination.is_empty() {
            return Err(SmsError::SendFailed);
        }
        info!("SMS(sim): to {}: {:?}", destination, body);
        self.sent.push((destination.to_string(), body.to_string()));
        Ok(())
    }

    fn read_all(&mut self) -> Result<SmsInbox<String>, SmsError> {
        let copy = self
            .stored
            .iter()
            .map(|m| SmsMessage {
                index: m.index,
                sender: m.sender.clone(),
                status: m.status.clone(),
                display_time: m.display_time.clone(),
                tz_offset: m.tz_offset,
                raw_time: m.raw_time,
                body: m.body.clone(),
            })
            .collect();
        for m in &mut self.stored {
            m.status = bounded("REC READ");
        }
        Ok(SmsInbox::new(copy))
    }

    fn delete(&mut self, index: u32) -> Result<(), SmsError> {
        let before = self.stored.len();
        self.stored.retain(|m| m.index != index);
        if self.stored.len() < before { Ok(()) } else { Err(SmsError::DeleteFailed) }
    }
}
