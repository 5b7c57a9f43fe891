use getfresh_rs::api::{self, Client, Error};
use getfresh_rs::model::{field, FieldValue, InstanceStatus};
use getfresh_rs::{Credentials, MemorySink, MemoryTokenStore, Poller, TokenStore};
use mockito::{Matcher, Mock, ServerGuard};
use std::sync::Arc;

const OWNER: &str = "getfresh";

struct Fixture {
    server: ServerGuard,
    tokens: Arc<MemoryTokenStore>,
    sink: Arc<MemorySink>,
    poller: Poller,
}

async fn fixture(email: &str, password: &str, token: Option<&str>) -> Fixture {
    let server = mockito::Server::new_async().await;
    let tokens = Arc::new(MemoryTokenStore::new(token));
    let sink = Arc::new(MemorySink::new());
    let client = Client::new(&server.url(), api::DEFAULT_TIMEOUT).unwrap();
    let poller = Poller::new(
        client,
        OWNER,
        Credentials {
            email: email.to_string(),
            password: password.to_string(),
        },
        tokens.clone(),
        sink.clone(),
    );

    Fixture {
        server,
        tokens,
        sink,
        poller,
    }
}

impl Fixture {
    async fn mock_login(&mut self, token: &str) -> Mock {
        self.server
            .mock("POST", "/oauth/token")
            .match_body(Matcher::UrlEncoded("grant_type".into(), "password".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(format!(r#"{{"access_token":"{}"}}"#, token))
            .create_async()
            .await
    }

    async fn mock_links(&mut self, token: &str) -> Mock {
        let body = format!(
            r#"{{"_links":{{
                "currentReadings":{{"href":"{0}/readings"}},
                "consumption":{{"href":"{0}/consumption"}},
                "profile":{{"href":"{0}/profile"}},
                "consumptionCurrentMonth":{{"href":"{0}/consumption/month"}}
            }}}}"#,
            self.server.url()
        );
        self.server
            .mock("GET", "/links")
            .match_header("authorization", format!("Bearer {}", token).as_str())
            .with_status(200)
            .with_body(body)
            .create_async()
            .await
    }

    async fn mock_resource(&mut self, path: &str, body: &str) -> Mock {
        self.server
            .mock("GET", path)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await
    }

    fn value(&self, name: &str) -> Option<FieldValue> {
        self.sink.get(OWNER, name).map(|e| e.value)
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.sink.get(OWNER, name).map(|e| e.position)
    }
}

const READINGS: &str = r#"{"readings":[
    {"energyReading":100,"power":450,"powerPhase1":140,"powerPhase2":150,"powerPhase3":160},
    {"energyReading":105,"power":500,"powerPhase1":150,"powerPhase2":160,"powerPhase3":190}
]}"#;

#[tokio::test]
async fn login_when_no_token_cached() {
    let mut f = fixture("user@example.com", "secret", None).await;
    let login = f.mock_login("fresh-token").await;
    f.mock_links("fresh-token").await;
    f.mock_resource("/readings", READINGS).await;

    assert_eq!(InstanceStatus::Inactive, f.poller.status());
    f.poller.update_readings().await.unwrap();

    login.assert_async().await;
    assert_eq!(Some("fresh-token".to_string()), f.tokens.get());
    assert_eq!(InstanceStatus::Active, f.poller.status());
}

#[tokio::test]
async fn cached_token_skips_login() {
    let mut f = fixture("user@example.com", "secret", Some("cached")).await;
    let login = f
        .server
        .mock("POST", "/oauth/token")
        .expect(0)
        .create_async()
        .await;
    f.mock_links("cached").await;
    f.mock_resource("/readings", READINGS).await;

    f.poller.update_readings().await.unwrap();

    login.assert_async().await;
    assert_eq!(InstanceStatus::Active, f.poller.status());
}

#[tokio::test]
async fn tariff_fields_published_from_offset_zero() {
    let mut f = fixture("user@example.com", "secret", Some("cached")).await;
    f.mock_links("cached").await;
    f.mock_resource("/profile", r#"{"brandName":"GETEC"}"#).await;
    f.mock_resource(
        "/consumption/month",
        r#"{"monthlyBasePrice":{"value":4.5},"unitPrice":{"value":0.32}}"#,
    )
    .await;

    f.poller.update_tariff().await.unwrap();

    assert_eq!(Some(FieldValue::from("GETEC")), f.value(field::PROVIDER));
    assert_eq!(Some(FieldValue::Number(4.5)), f.value(field::BASE_PRICE));
    assert_eq!(Some(FieldValue::Number(0.32)), f.value(field::PRICE_PER_KWH));
    assert_eq!(Some(0), f.position(field::PROVIDER));
    assert_eq!(Some(1), f.position(field::BASE_PRICE));
    assert_eq!(Some(2), f.position(field::PRICE_PER_KWH));
    assert_eq!(3, f.sink.entries().len());
}

#[tokio::test]
async fn reading_fields_use_most_recent_entry() {
    let mut f = fixture("user@example.com", "secret", Some("cached")).await;
    f.mock_links("cached").await;
    f.mock_resource("/readings", READINGS).await;

    f.poller.update_readings().await.unwrap();

    assert_eq!(Some(FieldValue::Number(105.0)), f.value(field::METER_READING));
    assert_eq!(Some(FieldValue::Number(500.0)), f.value(field::POWER));
    assert_eq!(Some(FieldValue::Number(150.0)), f.value(field::POWER_L1));
    assert_eq!(Some(FieldValue::Number(160.0)), f.value(field::POWER_L2));
    assert_eq!(Some(FieldValue::Number(190.0)), f.value(field::POWER_L3));

    let positions: Vec<usize> = f.sink.entries().iter().map(|e| e.position).collect();
    assert_eq!(vec![10, 11, 12, 13, 14], positions);
}

#[tokio::test]
async fn empty_readings_publish_nothing() {
    let mut f = fixture("user@example.com", "secret", Some("cached")).await;
    f.mock_links("cached").await;
    f.mock_resource("/readings", r#"{"readings":[]}"#).await;

    f.poller.update_readings().await.unwrap();

    assert!(f.sink.entries().is_empty());
}

#[tokio::test]
async fn repeated_cycles_update_in_place() {
    let mut f = fixture("user@example.com", "secret", Some("cached")).await;
    f.mock_links("cached").await;
    let first = f.mock_resource("/readings", READINGS).await;

    f.poller.update_readings().await.unwrap();
    first.remove_async().await;

    f.mock_resource(
        "/readings",
        r#"{"readings":[{"energyReading":106,"power":510,"powerPhase1":150,"powerPhase2":170,"powerPhase3":190}]}"#,
    )
    .await;
    f.poller.update_readings().await.unwrap();

    assert_eq!(5, f.sink.entries().len());
    assert_eq!(Some(FieldValue::Number(106.0)), f.value(field::METER_READING));
    assert_eq!(Some(10), f.position(field::METER_READING));
}

#[tokio::test]
async fn invalid_credentials_mark_auth_error() {
    let mut f = fixture("user@example.com", "wrong", None).await;
    f.server
        .mock("POST", "/oauth/token")
        .with_status(400)
        .with_body(r#"{"error":"invalid_grant"}"#)
        .create_async()
        .await;
    let links = f.server.mock("GET", "/links").expect(0).create_async().await;

    let result = f.poller.update_tariff().await;

    assert!(matches!(result, Err(Error::InvalidCredentials(_))));
    assert_eq!(InstanceStatus::AuthError, f.poller.status());
    assert_eq!(None, f.tokens.get());
    assert!(f.sink.entries().is_empty());
    links.assert_async().await;
}

#[tokio::test]
async fn blank_credentials_skip_cycle() {
    let mut f = fixture("", "", None).await;
    let login = f
        .server
        .mock("POST", "/oauth/token")
        .expect(0)
        .create_async()
        .await;

    f.poller.update_readings().await.unwrap();

    login.assert_async().await;
    assert_eq!(InstanceStatus::Inactive, f.poller.status());
    assert!(f.sink.entries().is_empty());
}

#[tokio::test]
async fn unreachable_service_keeps_status() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://127.0.0.1:{}", listener.local_addr().unwrap().port());
    drop(listener);

    let tokens = Arc::new(MemoryTokenStore::new(Some("cached")));
    let sink = Arc::new(MemorySink::new());
    let poller = Poller::new(
        Client::new(&url, api::DEFAULT_TIMEOUT).unwrap(),
        OWNER,
        Credentials {
            email: "user@example.com".to_string(),
            password: "secret".to_string(),
        },
        tokens.clone(),
        sink.clone(),
    );

    let result = poller.update_readings().await;

    assert!(matches!(result, Err(Error::UnreachableService(_))));
    assert_eq!(InstanceStatus::Inactive, poller.status());
    assert_eq!(Some("cached".to_string()), tokens.get());
    assert!(sink.entries().is_empty());
}

#[tokio::test]
async fn rejected_token_is_discarded_and_renewed() {
    let mut f = fixture("user@example.com", "secret", Some("expired")).await;
    let rejected = f
        .server
        .mock("GET", "/links")
        .match_header("authorization", "Bearer expired")
        .with_status(401)
        .create_async()
        .await;

    f.poller.update_readings().await.unwrap();

    rejected.assert_async().await;
    assert_eq!(None, f.tokens.get());
    assert!(f.sink.entries().is_empty());

    f.mock_login("renewed").await;
    f.mock_links("renewed").await;
    f.mock_resource("/readings", READINGS).await;

    f.poller.update_readings().await.unwrap();

    assert_eq!(Some("renewed".to_string()), f.tokens.get());
    assert_eq!(Some(FieldValue::Number(105.0)), f.value(field::METER_READING));
}

#[tokio::test]
async fn rejected_token_keeps_newer_token() {
    let mut f = fixture("user@example.com", "secret", Some("old")).await;
    let tokens = f.tokens.clone();
    /* The reading flow logs in while this request is answered */
    let rejected = f
        .server
        .mock("GET", "/links")
        .match_header("authorization", "Bearer old")
        .with_status(401)
        .with_body_from_request(move |_| {
            tokens.set("fresh");
            Vec::new()
        })
        .expect(1)
        .create_async()
        .await;

    f.poller.update_tariff().await.unwrap();

    rejected.assert_async().await;
    assert_eq!(Some("fresh".to_string()), f.tokens.get());
    assert!(f.sink.entries().is_empty());
}

#[tokio::test]
async fn reconfigure_applies_next_cycle() {
    let mut f = fixture("", "", None).await;
    let login = f.mock_login("fresh-token").await;
    f.mock_links("fresh-token").await;
    f.mock_resource("/readings", READINGS).await;

    f.poller.update_readings().await.unwrap();
    assert!(f.sink.entries().is_empty());

    f.poller.reconfigure(Credentials {
        email: "user@example.com".to_string(),
        password: "secret".to_string(),
    });
    f.poller.update_readings().await.unwrap();

    login.assert_async().await;
    assert_eq!(Some(FieldValue::Number(105.0)), f.value(field::METER_READING));
}

#[tokio::test]
async fn tariff_and_readings_do_not_overlap() {
    let mut f = fixture("user@example.com", "secret", Some("cached")).await;
    f.mock_links("cached").await;
    f.mock_resource("/profile", r#"{"brandName":"GETEC"}"#).await;
    f.mock_resource(
        "/consumption/month",
        r#"{"monthlyBasePrice":{"value":4.5},"unitPrice":{"value":0.32}}"#,
    )
    .await;
    f.mock_resource("/readings", READINGS).await;

    f.poller.update_tariff().await.unwrap();
    f.poller.update_readings().await.unwrap();

    let entries = f.sink.entries();
    assert_eq!(8, entries.len());
    let tariff_names = [field::PROVIDER, field::BASE_PRICE, field::PRICE_PER_KWH];
    assert!(entries
        .iter()
        .filter(|e| e.position < 10)
        .all(|e| tariff_names.contains(&e.name.as_str())));
    assert!(entries
        .iter()
        .filter(|e| e.position >= 10)
        .all(|e| e.name.starts_with("Power") || e.name == field::METER_READING));
}
