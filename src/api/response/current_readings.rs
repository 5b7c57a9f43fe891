use serde::Deserialize;

/* Readings are ordered oldest first */
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    pub energy_reading: Option<f64>,
    pub power: Option<f64>,
    pub power_phase1: Option<f64>,
    pub power_phase2: Option<f64>,
    pub power_phase3: Option<f64>,
}

#[derive(Deserialize)]
pub struct CurrentReadings {
    #[serde(default)]
    pub readings: Vec<Reading>,
}
