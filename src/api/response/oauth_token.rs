use serde::Deserialize;

#[derive(Deserialize)]
pub struct OauthToken {
    pub access_token: Option<String>,
}
