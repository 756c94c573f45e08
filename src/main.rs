//! GSM PPPoS Client Firmware: Main Entry Point
//!
//! Hexagonal architecture: three client tasks share one modem link through
//! a token arbiter.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  GsmLink        StdNet        TlsClientAdapter   SmsModem      │
//! │  (LinkPort)     (NetPort)     (TlsClient)        (SmsPort)     │
//! │  SntpClient     SystemClock   LogEventSink                     │
//! │  (SntpPort)     (ClockPort)   (EventSink)                      │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │  LinkArbiter · EngineTask × 3 (pure logic)             │    │
//! │  │  HttpEngine · HttpsEngine · SmsEngine                  │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  Supervisor: bring-up · time sync · health reports             │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use embedded_hal::delay::DelayNs;
use esp_idf_hal::delay::FreeRtos;
use log::{error, info, warn};

use gsm_pppos::adapters::gsm_link::GsmLink;
use gsm_pppos::adapters::log_sink::LogEventSink;
use gsm_pppos::adapters::net::StdNet;
use gsm_pppos::adapters::sms_modem::SmsModem;
use gsm_pppos::adapters::sntp::SntpClient;
use gsm_pppos::adapters::time::SystemClock;
use gsm_pppos::adapters::tls_client::TlsClientAdapter;
use gsm_pppos::app::arbiter::LinkArbiter;
use gsm_pppos::app::events::{HaltReason, TaskId};
use gsm_pppos::app::health::{HealthBoard, TaskHealth};
use gsm_pppos::app::http_engine::HttpEngine;
use gsm_pppos::app::https_engine::HttpsEngine;
use gsm_pppos::app::runner::{EngineTask, TaskTiming};
use gsm_pppos::app::sms_engine::SmsEngine;
use gsm_pppos::app::time_sync::{self, SyncOutcome};
use gsm_pppos::config::ClientConfig;
use gsm_pppos::diagnostics::{self, HeapSnapshot};
use gsm_pppos::drivers::task_pin::{spawn_on_core, Core, TaskSpec};

/// PEM trust anchor staged by `build.rs`.
static SERVER_ROOT_CERT: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/server_root_cert.pem"));

/// Supervisor wakes once a second to drain health reports.
const SUPERVISOR_TICK_MS: u32 = 1_000;
/// Heap snapshot every minute.
const HEAP_LOG_EVERY_TICKS: u32 = 60;

const HTTP_TASK: TaskSpec = TaskSpec { name: "http\0", core: Core::App, priority: 5, stack_kb: 8 };
const HTTPS_TASK: TaskSpec = TaskSpec { name: "https\0", core: Core::App, priority: 4, stack_kb: 16 };
const SMS_TASK: TaskSpec = TaskSpec { name: "sms\0", core: Core::App, priority: 3, stack_kb: 8 };

fn load_config() -> ClientConfig {
    let Some(json) = option_env!("GSM_PPPOS_CONFIG") else {
        return ClientConfig::default();
    };
    match ClientConfig::from_json_overlay(json) {
        Ok(config) => {
            info!("Config: build-time overlay applied");
            config
        }
        Err(e) => {
            warn!("Config: overlay rejected ({}), using defaults", e);
            ClientConfig::default()
        }
    }
}

fn halt_forever(health: &HealthBoard, reason: HaltReason) -> ! {
    error!("{}: HALTED: {}", TaskId::Supervisor.tag(), reason);
    health.set(TaskId::Supervisor, TaskHealth::Halted(reason));
    loop {
        FreeRtos.delay_ms(SUPERVISOR_TICK_MS);
    }
}

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;
    diagnostics::install_panic_handler();

    info!("╔══════════════════════════════════════╗");
    info!("║  GSM PPPoS client v{}              ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let config = load_config();
    let timing = TaskTiming::from(&config);
    let arbiter = Arc::new(LinkArbiter::new(GsmLink::new()));
    let health = Arc::new(HealthBoard::new());

    // ── 2. Link bring-up + time sync (supervisor holds the token) ──
    {
        let timeout = Duration::from_millis(u64::from(config.acquire_timeout_ms));
        let mut link = match arbiter.acquire(TaskId::Supervisor, timeout) {
            Ok(link) => link,
            Err(e) => {
                error!("{}", e);
                halt_forever(&health, HaltReason::LinkInit);
            }
        };
        health.set(TaskId::Supervisor, TaskHealth::Running);

        if !link.ensure_data_mode() {
            error!("GSM not initialized, HALTED");
            drop(link);
            halt_forever(&health, HaltReason::LinkInit);
        }

        let mut sntp = SntpClient::new();
        let clock = SystemClock::new();
        let mut delay = FreeRtos;
        match time_sync::obtain_time(&mut link, &mut sntp, &clock, &mut delay, &config) {
            SyncOutcome::Synced(now) => info!("SNTP: TIME SET TO {}", now),
            SyncOutcome::TimedOut => warn!("SNTP: clock not set, continuing"),
            SyncOutcome::Failed => warn!("SNTP: client failed to start, continuing"),
        }
    }

    // ── 3. Client tasks ───────────────────────────────────────
    let http = EngineTask::new(
        HttpEngine::new(StdNet::new(), &config),
        Arc::clone(&arbiter),
        Arc::clone(&health),
        FreeRtos,
        LogEventSink::new(),
        timing,
    );
    spawn_on_core(HTTP_TASK, move || http.run_forever())?;

    let https = EngineTask::new(
        HttpsEngine::new(TlsClientAdapter::new(), SERVER_ROOT_CERT, &config),
        Arc::clone(&arbiter),
        Arc::clone(&health),
        FreeRtos,
        LogEventSink::new(),
        timing,
    );
    spawn_on_core(HTTPS_TASK, move || https.run_forever())?;

    if config.sms_send_enabled {
        info!("SMS: test messages every {} s to {}", config.sms_interval_secs, config.sms_number);
    }
    let sms = EngineTask::new(
        SmsEngine::new(SmsModem::new(), SystemClock::new(), FreeRtos, &config),
        Arc::clone(&arbiter),
        Arc::clone(&health),
        FreeRtos,
        LogEventSink::new(),
        timing,
    );
    spawn_on_core(SMS_TASK, move || sms.run_forever())?;

    info!("System ready. Supervising client tasks.");

    // ── 4. Supervisor loop ────────────────────────────────────
    let mut ticks: u32 = 0;
    loop {
        FreeRtos.delay_ms(SUPERVISOR_TICK_MS);
        ticks = ticks.wrapping_add(1);

        while let Some(report) = health.try_next_report() {
            match report.health {
                TaskHealth::Halted(reason) => {
                    error!("Health: {} halted ({})", report.task.name(), reason);
                }
                other => info!("Health: {} {:?}", report.task.name(), other),
            }
        }

        if ticks % HEAP_LOG_EVERY_TICKS == 0 {
            let halted = health.halted();
            info!(
                "{} | link holder={:?} grants={} | halted={}",
                HeapSnapshot::collect(),
                arbiter.holder(),
                arbiter.grants(),
                halted.len()
            );
        }
    }
}
