use serde::Deserialize;
use std::collections::HashMap;

#[derive(Deserialize)]
pub struct Link {
    pub href: String,
}

#[derive(Deserialize)]
pub struct Links {
    #[serde(rename = "_links", default)]
    pub links: HashMap<String, Link>,
}
