use crate::api::response::consumption_current_month::ConsumptionCurrentMonth;
use crate::api::response::current_readings::CurrentReadings;
use crate::api::response::profile::Profile;
use crate::api::{self, Client, Error, Payload};
use crate::model::{
    field, FieldSet, InstanceStatus, Resource, READINGS_POSITION_OFFSET, TARIFF_POSITION_OFFSET,
};
use crate::publisher::{self, Sink};
use crate::session::{Session, TokenStore};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Skip-if-running guard of one update flow.
#[derive(Debug, Default)]
pub struct FlowGuard(tokio::sync::Mutex<()>);

impl FlowGuard {
    /// `None` while another run of the flow holds the guard.
    pub fn try_enter(&self) -> Option<tokio::sync::MutexGuard<'_, ()>> {
        self.0.try_lock().ok()
    }
}

/// Drives the tariff and reading update flows of one instance.
pub struct Poller {
    client: Client,
    owner: String,
    credentials: RwLock<Credentials>,
    tokens: Arc<dyn TokenStore>,
    sink: Arc<dyn Sink>,
    status: AtomicU16,
    tariff_guard: FlowGuard,
    readings_guard: FlowGuard,
}

impl Poller {
    pub fn new(
        client: Client,
        owner: &str,
        credentials: Credentials,
        tokens: Arc<dyn TokenStore>,
        sink: Arc<dyn Sink>,
    ) -> Self {
        Poller {
            client,
            owner: owner.to_owned(),
            credentials: RwLock::new(credentials),
            tokens,
            sink,
            status: AtomicU16::new(InstanceStatus::Inactive.code()),
            tariff_guard: FlowGuard::default(),
            readings_guard: FlowGuard::default(),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn status(&self) -> InstanceStatus {
        num::FromPrimitive::from_u16(self.status.load(Ordering::SeqCst))
            .unwrap_or(InstanceStatus::Inactive)
    }

    fn set_status(&self, status: InstanceStatus) {
        self.status.store(status.code(), Ordering::SeqCst);
    }

    /// Replace the account credentials; applies from the next cycle on.
    pub fn reconfigure(&self, credentials: Credentials) {
        if let Ok(mut c) = self.credentials.write() {
            *c = credentials;
        }
    }

    /// Build the cycle's session and make sure it carries a token.
    ///
    /// Returns `Ok(None)` while no credentials are configured. An unreachable
    /// service or a failed login ends the cycle with an error.
    pub async fn ensure_session(&self) -> Result<Option<Session>, Error> {
        let mut session = {
            let credentials = self.credentials.read().or(Err(Error::InternalError))?;
            Session::new(
                &credentials.email,
                &credentials.password,
                self.tokens.get(),
            )
        };

        if let Err(e) = api::check_reachable(&self.client).await {
            log::error!("GetFresh api or internet connection not available: {:?}", e);
            return Err(e);
        }

        if !session.is_configured() {
            log::debug!("No email or password configured, skipping cycle");
            return Ok(None);
        }

        if session.token.is_none() {
            log::info!("Logging in to account of {}...", session.email);
            match api::authenticate(&self.client, &session.email, &session.password).await {
                Ok(token) => {
                    self.tokens.set(&token);
                    session.token = Some(token);
                }
                Err(e) => {
                    self.set_status(InstanceStatus::AuthError);
                    log::error!(
                        "The email address or password of your account is invalid: {:?}",
                        e
                    );
                    return Err(e);
                }
            }
        }

        self.set_status(InstanceStatus::Active);
        Ok(Some(session))
    }

    /// `None` once `token` was rejected; the rest of the cycle is skipped.
    async fn resolve(&self, token: &str, resource: Resource) -> Option<Payload> {
        match api::resolve(&self.client, token, resource).await {
            Ok(payload) => Some(payload),
            Err(e) => {
                log::warn!("Token rejected while reading {}: {:?}", resource, e);
                /* Another flow may already have stored a new token */
                if self.tokens.clear_if(token) {
                    log::info!("Discarded rejected token");
                }
                None
            }
        }
    }

    /// Read provider and prices and publish them at the tariff offset.
    pub async fn update_tariff(&self) -> Result<(), Error> {
        let _guard = match self.tariff_guard.try_enter() {
            Some(guard) => guard,
            None => {
                log::warn!("Tariff update still running, skipping");
                return Ok(());
            }
        };

        let token = match self.ensure_session().await?.and_then(|s| s.token) {
            Some(token) => token,
            None => return Ok(()),
        };

        let profile = self.resolve(&token, Resource::Profile).await;
        let tariff = match profile {
            Some(_) => self.resolve(&token, Resource::ConsumptionCurrentMonth).await,
            None => None,
        };
        let fields = tariff_fields(profile.unwrap_or_default(), tariff.unwrap_or_default());

        log::info!(
            "GetFresh tariff data: {}",
            serde_json::to_string(&fields).or(Err(Error::FormatError))?
        );
        publisher::publish(self.sink.as_ref(), &self.owner, fields, TARIFF_POSITION_OFFSET);
        Ok(())
    }

    /// Read the most recent meter reading and publish it at the readings offset.
    pub async fn update_readings(&self) -> Result<(), Error> {
        let _guard = match self.readings_guard.try_enter() {
            Some(guard) => guard,
            None => {
                log::warn!("Reading update still running, skipping");
                return Ok(());
            }
        };

        let token = match self.ensure_session().await?.and_then(|s| s.token) {
            Some(token) => token,
            None => return Ok(()),
        };

        let readings = self.resolve(&token, Resource::CurrentReadings).await;
        let fields = reading_fields(readings.unwrap_or_default());

        log::info!(
            "GetFresh data: {}",
            serde_json::to_string(&fields).or(Err(Error::FormatError))?
        );
        publisher::publish(self.sink.as_ref(), &self.owner, fields, READINGS_POSITION_OFFSET);
        Ok(())
    }
}

fn parse<T: DeserializeOwned>(resource: Resource, payload: Payload) -> Option<T> {
    if payload.is_empty() {
        return None;
    }

    serde_json::from_value(Value::Object(payload))
        .map_err(|e| log::warn!("Unexpected {} payload: {}", resource, e))
        .ok()
}

/// Extract `Provider`, `Base Price` and `Price per kWh`. Absent keys are skipped.
pub fn tariff_fields(profile: Payload, tariff: Payload) -> FieldSet {
    let mut fields = FieldSet::new();

    if let Some(profile) = parse::<Profile>(Resource::Profile, profile) {
        fields.insert_opt(field::PROVIDER, profile.brand_name);
    }

    if let Some(tariff) = parse::<ConsumptionCurrentMonth>(Resource::ConsumptionCurrentMonth, tariff)
    {
        fields.insert_opt(
            field::BASE_PRICE,
            tariff.monthly_base_price.and_then(|p| p.value),
        );
        fields.insert_opt(field::PRICE_PER_KWH, tariff.unit_price.and_then(|p| p.value));
    }

    fields
}

/// Extract the fields of the last (most recent) reading.
pub fn reading_fields(readings: Payload) -> FieldSet {
    let mut fields = FieldSet::new();

    if let Some(current) = parse::<CurrentReadings>(Resource::CurrentReadings, readings) {
        match current.readings.last() {
            Some(reading) => {
                fields.insert_opt(field::METER_READING, reading.energy_reading);
                fields.insert_opt(field::POWER, reading.power);
                fields.insert_opt(field::POWER_L1, reading.power_phase1);
                fields.insert_opt(field::POWER_L2, reading.power_phase2);
                fields.insert_opt(field::POWER_L3, reading.power_phase3);
            }
            None => log::warn!("GetFresh returned an empty readings sequence"),
        }
    }

    fields
}
