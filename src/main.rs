#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate prometheus;
#[macro_use]
extern crate rocket;

use config::Config;
use getfresh_rs::api::{self, Client};
use getfresh_rs::publisher::Entry;
use getfresh_rs::{
    Credentials, FileTokenStore, MemorySink, Poller, Scheduler, READINGS_TIMER,
    TARIFF_INTERVAL_SECS, TARIFF_TIMER,
};
use rocket::serde::json::Json;
use rocket::{Build, Rocket, State};
use std::sync::Arc;
use std::time::Duration;

mod metrics;

#[derive(Clone, serde::Deserialize)]
pub struct GetFreshConfig {
    api_url: String,
    email: String,
    password: String,
    /// Reading update cadence in seconds, 0 disables it.
    interval: u64,
    token_path: String,
    instance: String,
    timeout: u64,
}

impl GetFreshConfig {
    fn credentials(&self) -> Credentials {
        Credentials {
            email: self.email.to_owned(),
            password: self.password.to_owned(),
        }
    }
}

/// Structure containing state for API handlers.
pub struct StateData {
    poller: Arc<Poller>,
    sink: Arc<MemorySink>,
    _scheduler: Arc<Scheduler>,
}

#[derive(serde::Serialize)]
struct StatusResponse {
    instance: String,
    code: u16,
    name: &'static str,
}

pub fn read_settings() -> Result<GetFreshConfig, api::Error> {
    let mut settings = Config::default();
    settings
        .set_default("api_url", api::API_URL)
        .and_then(|s| s.set_default("email", ""))
        .and_then(|s| s.set_default("password", ""))
        .and_then(|s| s.set_default("interval", 60_i64))
        .and_then(|s| s.set_default("token_path", "getfresh.token"))
        .and_then(|s| s.set_default("instance", "getfresh"))
        .and_then(|s| s.set_default("timeout", 10_i64))
        .and_then(|s| s.merge(config::File::with_name("getfresh").required(false)))
        .and_then(|s| s.merge(config::Environment::with_prefix("GF")))
        .map_err(|e| api::Error::ConfigError(e.to_string()))?;

    settings
        .try_into()
        .map_err(|e| api::Error::ConfigError(e.to_string()))
}

fn arm_timers(scheduler: &Scheduler, poller: &Arc<Poller>, interval: u64) {
    let readings_poller = poller.clone();
    scheduler.register(READINGS_TIMER, Duration::from_secs(interval), move || {
        let poller = readings_poller.clone();
        async move {
            if let Err(e) = poller.update_readings().await {
                log::warn!("Reading update aborted: {:?}", e);
            }
        }
    });

    let tariff_poller = poller.clone();
    scheduler.register(
        TARIFF_TIMER,
        Duration::from_secs(TARIFF_INTERVAL_SECS),
        move || {
            let poller = tariff_poller.clone();
            async move {
                if let Err(e) = poller.update_tariff().await {
                    log::warn!("Tariff update aborted: {:?}", e);
                }
            }
        },
    );
}

/// Re-read configuration on SIGHUP and re-arm the reading timer.
#[cfg(unix)]
fn watch_reload(scheduler: Arc<Scheduler>, poller: Arc<Poller>) {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let mut hangup = match signal(SignalKind::hangup()) {
            Ok(hangup) => hangup,
            Err(e) => {
                log::warn!("Unable to listen for SIGHUP, reload disabled: {}", e);
                return;
            }
        };

        while hangup.recv().await.is_some() {
            match read_settings() {
                Ok(settings) => {
                    poller.reconfigure(settings.credentials());
                    scheduler.reschedule(READINGS_TIMER, Duration::from_secs(settings.interval));
                    log::info!("Configuration reloaded, interval {}s", settings.interval);
                }
                Err(e) => log::error!("Unable to reload configuration: {:?}", e),
            }
        }
    });
}

#[cfg(not(unix))]
fn watch_reload(_scheduler: Arc<Scheduler>, _poller: Arc<Poller>) {}

#[get("/fields")]
fn fields_route(state: &State<StateData>) -> Json<Vec<Entry>> {
    Json(state.sink.entries())
}

#[get("/status")]
fn status_route(state: &State<StateData>) -> Json<StatusResponse> {
    let status = state.poller.status();
    Json(StatusResponse {
        instance: state.poller.owner().to_owned(),
        code: status.code(),
        name: status.name(),
    })
}

#[get("/metrics")]
fn metrics_route(state: &State<StateData>) -> Result<String, api::Error> {
    metrics::read(&state.sink.entries(), state.poller.status())
}

#[launch]
async fn rocket() -> Rocket<Build> {
    env_logger::init();

    let settings = read_settings().expect("Configuration error");
    let client = Client::new(&settings.api_url, Duration::from_secs(settings.timeout))
        .expect("Unable to build HTTP client");
    let sink = Arc::new(MemorySink::new());
    let poller = Arc::new(Poller::new(
        client,
        &settings.instance,
        settings.credentials(),
        Arc::new(FileTokenStore::open(&settings.token_path)),
        sink.clone(),
    ));

    let scheduler = Arc::new(Scheduler::new());
    arm_timers(&scheduler, &poller, settings.interval);
    watch_reload(scheduler.clone(), poller.clone());

    let startup_poller = poller.clone();
    tokio::spawn(async move {
        if let Err(e) = startup_poller.update_tariff().await {
            log::warn!("Tariff update aborted: {:?}", e);
        }
        if let Err(e) = startup_poller.update_readings().await {
            log::warn!("Reading update aborted: {:?}", e);
        }
    });

    let state = StateData {
        poller,
        sink,
        _scheduler: scheduler,
    };

    rocket::build()
        .manage(state)
        .mount("/", routes![fields_route, status_route, metrics_route])
}
