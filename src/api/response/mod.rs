pub mod consumption_current_month;
pub mod current_readings;
pub mod links;
pub mod oauth_token;
pub mod profile;
