use serde::Deserialize;

#[derive(Deserialize)]
pub struct Price {
    pub value: Option<f64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumptionCurrentMonth {
    pub monthly_base_price: Option<Price>,
    pub unit_price: Option<Price>,
}
