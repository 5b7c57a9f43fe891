use getfresh_rs::api::Error;
use getfresh_rs::model::{FieldValue, InstanceStatus};
use getfresh_rs::publisher::Entry;
use prometheus::{Encoder, GaugeVec, IntGauge, TextEncoder};

lazy_static! {
    static ref FIELD_GAUGE: GaugeVec = register_gauge_vec!(
        opts!("getfresh_field", "numeric field published by the GetFresh poller",),
        &["instance", "field"],
    )
    .unwrap();
    static ref FIELD_INFO_GAUGE: GaugeVec = register_gauge_vec!(
        opts!(
            "getfresh_field_info",
            "text field published by the GetFresh poller, value carried as label",
        ),
        &["instance", "field", "value"],
    )
    .unwrap();
    static ref STATUS_GAUGE: IntGauge = register_int_gauge!(opts!(
        "getfresh_status",
        "instance status code (102 active, 104 inactive, 201 authentication error)",
    ))
    .unwrap();
}

/// Mirror sink `entries` and `status` into the Prometheus registry.
fn update(entries: &[Entry], status: InstanceStatus) {
    /* Fields may disappear between scrapes */
    FIELD_GAUGE.reset();
    FIELD_INFO_GAUGE.reset();

    for entry in entries {
        match &entry.value {
            FieldValue::Number(value) => FIELD_GAUGE
                .with_label_values(&[&entry.owner, &entry.name])
                .set(*value),
            FieldValue::Text(value) => FIELD_INFO_GAUGE
                .with_label_values(&[&entry.owner, &entry.name, value])
                .set(1.0),
        }
    }

    STATUS_GAUGE.set(status.code() as i64);
}

/// Read metrics from Prometheus exporter registry.
pub fn read(entries: &[Entry], status: InstanceStatus) -> Result<String, Error> {
    update(entries, status);

    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    encoder
        .encode(&metric_families, &mut buffer)
        .or(Err(Error::FormatError))?;
    String::from_utf8(buffer).or(Err(Error::FormatError))
}
