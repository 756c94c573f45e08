//! Application core: pure client logic, zero I/O.
//!
//! The link arbiter, the engine task runner and the three client engines
//! (plain HTTP, HTTPS, SMS).  All interaction with the modem, sockets, TLS
//! library and clock happens through **port traits** defined in [`ports`],
//! keeping this layer fully testable on the host.

pub mod arbiter;
pub mod buffer;
pub mod events;
pub mod health;
pub mod http_engine;
pub mod https_engine;
pub mod ports;
pub mod response;
pub mod runner;
pub mod sms_engine;
pub mod time_sync;
pub mod timefmt;
