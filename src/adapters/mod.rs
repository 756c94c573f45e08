//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter      | Implements          | Connects to                  |
//! |--------------|---------------------|------------------------------|
//! | `gsm_link`   | LinkPort            | libGSM PPPoS / RF control    |
//! | `net`        | NetPort, NetStream  | lwIP sockets via `std::net`  |
//! | `tls_client` | TlsClient           | mbedTLS client session       |
//! | `sms_modem`  | SmsPort             | libGSM SMS commands          |
//! | `sntp`       | SntpPort            | ESP-IDF SNTP client          |
//! | `time`       | ClockPort           | ESP32 system timer           |
//! | `log_sink`   | EventSink           | Serial log output            |

pub mod gsm_link;
pub mod log_sink;
pub mod net;
pub mod sms_modem;
pub mod sntp;
pub mod time;
pub mod tls_client;
