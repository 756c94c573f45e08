use std::path::PathBuf;

const ROOT_CERT: &str = "certs/server_root_cert.pem";

fn main() {
    println!("cargo:rerun-if-changed={ROOT_CERT}");
    println!("cargo:rerun-if-env-changed=GSM_PPPOS_CONFIG");

    // Embed the HTTPS trust anchor. Without one the TLS task halts at
    // startup with a trust-anchor error, the other tasks keep running.
    let out_dir = PathBuf::from(std::env::var("OUT_DIR").unwrap_or_else(|_| ".".into()));
    let pem = match std::fs::read(ROOT_CERT) {
        Ok(pem) => pem,
        Err(_) => {
            println!("cargo:warning={ROOT_CERT} not found, embedding an empty trust anchor");
            Vec::new()
        }
    };
    if let Err(e) = std::fs::write(out_dir.join("server_root_cert.pem"), pem) {
        println!("cargo:warning=failed to stage trust anchor: {e}");
    }

    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
