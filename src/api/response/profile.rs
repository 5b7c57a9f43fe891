use serde::Deserialize;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub brand_name: Option<String>,
}
