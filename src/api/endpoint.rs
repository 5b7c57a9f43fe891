pub type Endpoint = str;

pub const TOKEN: &Endpoint = "/oauth/token";
pub const LINKS: &Endpoint = "/links";

/// OAuth client of the web frontend; the secret is empty.
pub const CLIENT_ID: &str = "fresh-webclient";
pub const CLIENT_SECRET: &str = "";

/// The service only answers requests carrying the signature of its mobile app.
pub const USER_AGENT: &str = "okhttp/3.2.0";
