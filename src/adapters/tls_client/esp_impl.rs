//! ESP-IDF platform helpers for `TlsClientAdapter`.
//!
//! Compiled only for `target_os = "espidf"`: a long-lived mbedTLS client
//! session over an lwIP TCP socket.  Everything is `pub(super)`.

use core::ffi::{CStr, c_char, c_int, c_void};
use std::ffi::CString;
use std::net::{TcpStream, ToSocketAddrs};
use std::os::fd::IntoRawFd;

use log::{info, warn};

use esp_idf_svc::sys::{
    EAGAIN, MBEDTLS_ERR_SSL_PEER_CLOSE_NOTIFY, MBEDTLS_ERR_SSL_WANT_READ,
    MBEDTLS_ERR_SSL_WANT_WRITE, MBEDTLS_SSL_IS_CLIENT, MBEDTLS_SSL_PRESET_DEFAULT,
    MBEDTLS_SSL_TRANSPORT_STREAM, MBEDTLS_SSL_VERIFY_OPTIONAL, lwip_close, lwip_recv, lwip_send,
    mbedtls_ctr_drbg_context, mbedtls_ctr_drbg_free, mbedtls_ctr_drbg_init,
    mbedtls_ctr_drbg_random, mbedtls_ctr_drbg_seed, mbedtls_entropy_context, mbedtls_entropy_free,
    mbedtls_entropy_func, mbedtls_entropy_init, mbedtls_ssl_close_notify,
    mbedtls_ssl_conf_authmode, mbedtls_ssl_conf_ca_chain, mbedtls_ssl_conf_rng, mbedtls_ssl_config,
    mbedtls_ssl_config_defaults, mbedtls_ssl_config_free, mbedtls_ssl_config_init,
    mbedtls_ssl_context, mbedtls_ssl_free, mbedtls_ssl_get_verify_result, mbedtls_ssl_handshake,
    mbedtls_ssl_init, mbedtls_ssl_read, mbedtls_ssl_session_reset, mbedtls_ssl_set_bio,
    mbedtls_ssl_set_hostname, mbedtls_ssl_setup, mbedtls_ssl_write, mbedtls_strerror,
    mbedtls_x509_crt, mbedtls_x509_crt_free, mbedtls_x509_crt_init, mbedtls_x509_crt_parse,
    mbedtls_x509_crt_verify_info,
};

use crate::error::{TlsError, TlsSetupError};

/// `MBEDTLS_ERR_NET_CONNECT_FAILED`
const NET_CONNECT_FAILED: i32 = -0x0052;
/// `MBEDTLS_ERR_NET_UNKNOWN_HOST`
const NET_UNKNOWN_HOST: i32 = -0x0056;

// ── BIO callbacks ─────────────────────────────────────────────────────────────
//
// The socket fd travels as the `p_bio` context pointer.

/// mbedTLS send BIO callback.
///
/// # Safety
///
/// `ctx` must be a raw file descriptor cast to `*mut c_void`, valid until
/// `session_reset` closes it.
unsafe extern "C" fn bio_send(ctx: *mut c_void, buf: *const u8, len: usize) -> c_int {
    let fd = ctx as c_int;
    unsafe { lwip_send(fd, buf.cast(), len, 0) as c_int }
}

/// mbedTLS recv BIO callback.  EAGAIN maps to `WANT_READ`.
///
/// # Safety
///
/// Same invariants as `bio_send`.
unsafe extern "C" fn bio_recv(ctx: *mut c_void, buf: *mut u8, len: usize) -> c_int {
    let fd = ctx as c_int;
    let ret = unsafe { lwip_recv(fd, buf.cast(), len, 0) } as c_int;
    if ret < 0 {
        // SAFETY: __errno() points at the calling task's errno.
        let err = unsafe { *esp_idf_svc::sys::__errno() };
        if err == EAGAIN as i32 {
            return MBEDTLS_ERR_SSL_WANT_READ;
        }
    }
    ret
}

fn map_rc(rc: c_int) -> TlsError {
    match rc {
        MBEDTLS_ERR_SSL_WANT_READ => TlsError::WantRead,
        MBEDTLS_ERR_SSL_WANT_WRITE => TlsError::WantWrite,
        MBEDTLS_ERR_SSL_PEER_CLOSE_NOTIFY => TlsError::PeerCloseNotify,
        other => TlsError::Failed(other),
    }
}

// ── Session state ─────────────────────────────────────────────────────────────

/// Configuration, RNG, trust anchor and protocol state.  Every mbedTLS
/// struct is boxed: the config and the session hold raw pointers into each
/// other, so their addresses must not move.
pub(super) struct EspTlsSession {
    entropy: Box<mbedtls_entropy_context>,
    drbg: Box<mbedtls_ctr_drbg_context>,
    cacert: Box<mbedtls_x509_crt>,
    conf: Box<mbedtls_ssl_config>,
    ssl: Box<mbedtls_ssl_context>,
    /// Connected socket, `-1` between exchanges.
    pub(super) fd: c_int,
}

unsafe impl Send for EspTlsSession {}

impl Drop for EspTlsSession {
    fn drop(&mut self) {
        // SAFETY: every context was initialised in `esp_setup` and is freed
        // exactly once here.
        unsafe {
            if self.fd >= 0 {
                lwip_close(self.fd);
            }
            mbedtls_ssl_free(self.ssl.as_mut());
            mbedtls_ssl_config_free(self.conf.as_mut());
            mbedtls_x509_crt_free(self.cacert.as_mut());
            mbedtls_ctr_drbg_free(self.drbg.as_mut());
            mbedtls_entropy_free(self.entropy.as_mut());
        }
    }
}

// ── Public helpers ────────────────────────────────────────────────────────────

/// Seed the RNG, parse the trust anchor and build the client config.
pub(super) fn esp_setup(trust_anchor: &[u8], hostname: &str) -> Result<EspTlsSession, TlsSetupError> {
    // PEM parsing needs the terminating NUL inside the length.
    let mut pem = trust_anchor.to_vec();
    if pem.last() != Some(&0) {
        pem.push(0);
    }
    let host = CString::new(hostname).map_err(|_| TlsSetupError::Hostname(-1))?;

    let mut s = EspTlsSession {
        entropy: Box::new(mbedtls_entropy_context::default()),
        drbg: Box::new(mbedtls_ctr_drbg_context::default()),
        cacert: Box::new(mbedtls_x509_crt::default()),
        conf: Box::new(mbedtls_ssl_config::default()),
        ssl: Box::new(mbedtls_ssl_context::default()),
        fd: -1,
    };

    // SAFETY: all pointers come from the boxes above and stay valid for the
    // lifetime of `s`; calls follow the mbedTLS client setup sequence.
    unsafe {
        mbedtls_ssl_init(s.ssl.as_mut());
        mbedtls_x509_crt_init(s.cacert.as_mut());
        mbedtls_ctr_drbg_init(s.drbg.as_mut());
        mbedtls_ssl_config_init(s.conf.as_mut());
        mbedtls_entropy_init(s.entropy.as_mut());

        let rc = mbedtls_ctr_drbg_seed(
            s.drbg.as_mut(),
            Some(mbedtls_entropy_func),
            (s.entropy.as_mut() as *mut mbedtls_entropy_context).cast(),
            core::ptr::null(),
            0,
        );
        if rc != 0 {
            return Err(TlsSetupError::RngSeed(rc));
        }

        info!("TLS(espidf): loading the CA root certificate");
        let rc = mbedtls_x509_crt_parse(s.cacert.as_mut(), pem.as_ptr(), pem.len());
        if rc < 0 {
            return Err(TlsSetupError::TrustAnchor(rc));
        }

        let rc = mbedtls_ssl_config_defaults(
            s.conf.as_mut(),
            MBEDTLS_SSL_IS_CLIENT as _,
            MBEDTLS_SSL_TRANSPORT_STREAM as _,
            MBEDTLS_SSL_PRESET_DEFAULT as _,
        );
        if rc != 0 {
            return Err(TlsSetupError::Config(rc));
        }

        // Optional verification: a failed chain is reported, not enforced.
        mbedtls_ssl_conf_authmode(s.conf.as_mut(), MBEDTLS_SSL_VERIFY_OPTIONAL as _);
        mbedtls_ssl_conf_ca_chain(s.conf.as_mut(), s.cacert.as_mut(), core::ptr::null_mut());
        mbedtls_ssl_conf_rng(
            s.conf.as_mut(),
            Some(mbedtls_ctr_drbg_random),
            (s.drbg.as_mut() as *mut mbedtls_ctr_drbg_context).cast(),
        );

        let rc = mbedtls_ssl_setup(s.ssl.as_mut(), s.conf.as_ref());
        if rc != 0 {
            return Err(TlsSetupError::Config(rc));
        }

        // Must match the CN in the server certificate.
        let rc = mbedtls_ssl_set_hostname(s.ssl.as_mut(), host.as_ptr());
        if rc != 0 {
            return Err(TlsSetupError::Hostname(rc));
        }
    }

    info!("TLS(espidf): client session configured for {}", hostname);
    Ok(s)
}

/// Open the TCP connection and attach it to the session.
pub(super) fn esp_connect(s: &mut EspTlsSession, host: &str, port: u16) -> Result<(), TlsError> {
    let addr = (host, port)
        .to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.find(std::net::SocketAddr::is_ipv4))
        .ok_or(TlsError::Connect(NET_UNKNOWN_HOST))?;
    let stream = TcpStream::connect(addr).map_err(|e| {
        warn!("TLS(espidf): connect to {} failed: {}", addr, e);
        TlsError::Connect(NET_CONNECT_FAILED)
    })?;
    s.fd = stream.into_raw_fd();

    // SAFETY: fd stays open until `esp_session_reset` or drop.
    unsafe {
        mbedtls_ssl_set_bio(
            s.ssl.as_mut(),
            s.fd as usize as *mut c_void,
            Some(bio_send),
            Some(bio_recv),
            None,
        );
    }
    Ok(())
}

pub(super) fn esp_handshake(s: &mut EspTlsSession) -> Result<(), TlsError> {
    // SAFETY: session initialised, BIO attached.
    let rc = unsafe { mbedtls_ssl_handshake(s.ssl.as_mut()) };
    if rc == 0 { Ok(()) } else { Err(map_rc(rc)) }
}

pub(super) fn esp_verify_result(s: &EspTlsSession) -> u32 {
    // SAFETY: read-only query on an initialised session.
    unsafe { mbedtls_ssl_get_verify_result(s.ssl.as_ref()) }
}

pub(super) fn esp_verify_info(flags: u32) -> String {
    let mut buf = [0u8; 512];
    // SAFETY: buf is writable for its full length and NUL-terminated by
    // mbedTLS on return.
    unsafe {
        mbedtls_x509_crt_verify_info(buf.as_mut_ptr().cast::<c_char>(), buf.len(), c"  ! ".as_ptr(), flags);
    }
    CStr::from_bytes_until_nul(&buf)
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

pub(super) fn esp_write(s: &mut EspTlsSession, data: &[u8]) -> Result<usize, TlsError> {
    // SAFETY: data is a valid slice; session connected.
    let rc = unsafe { mbedtls_ssl_write(s.ssl.as_mut(), data.as_ptr(), data.len()) };
    if rc >= 0 { Ok(rc as usize) } else { Err(map_rc(rc)) }
}

pub(super) fn esp_read(s: &mut EspTlsSession, buf: &mut [u8]) -> Result<usize, TlsError> {
    // SAFETY: buf is a valid mutable slice; session connected.
    let rc = unsafe { mbedtls_ssl_read(s.ssl.as_mut(), buf.as_mut_ptr(), buf.len()) };
    if rc >= 0 { Ok(rc as usize) } else { Err(map_rc(rc)) }
}

pub(super) fn esp_close_notify(s: &mut EspTlsSession) {
    // SAFETY: harmless on a session without a live connection.
    unsafe {
        mbedtls_ssl_close_notify(s.ssl.as_mut());
    }
}

/// Drop negotiated state, keep config and trust anchor, free the socket.
pub(super) fn esp_session_reset(s: &mut EspTlsSession) {
    // SAFETY: session initialised; fd closed at most once.
    unsafe {
        mbedtls_ssl_session_reset(s.ssl.as_mut());
        if s.fd >= 0 {
            lwip_close(s.fd);
        }
    }
    s.fd = -1;
}

pub(super) fn esp_strerror(code: i32) -> String {
    let mut buf = [0u8; 100];
    // SAFETY: buf is writable for its full length.
    unsafe { mbedtls_strerror(code, buf.as_mut_ptr().cast::<c_char>(), buf.len()) };
    CStr::from_bytes_until_nul(&buf)
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
