mod common;

use std::sync::Arc;

use common::*;
use vmwatch::{
    build_card_configs, CardData, Dashboard, DeviceFilter, InstanceIdentity, MetricCatalog,
    RawResponse, RawSample,
};
use vmwatch_types::SampleTuple;

const DOMAIN: &str = "instance-0000002a";

fn disk_read(device: &str) -> String {
    format!(
        r#"rate(libvirt_domain_block_stats_read_bytes_total{{domain="{DOMAIN}",device=~"{device}"}}[5m])"#
    )
}

fn ready_backend() -> ScriptedBackend {
    ScriptedBackend::new()
        .answer(&probe_query("abc"), one_value())
        .answer(&info_query("abc"), openstack_info("abc", DOMAIN))
        .answer(&devices_query(DOMAIN), block_devices(DOMAIN, &["vdb", "vda", "vda"]))
        .answer(
            &cpu_query(DOMAIN),
            RawResponse::new(vec![RawSample::instant(
                [("domain", DOMAIN)],
                SampleTuple::new(1_700_000_000.0, "0.3456"),
            )]),
        )
        .answer(&disk_read(".*"), block_devices(DOMAIN, &["vda", "vdb"]))
        .answer(&disk_read("vda"), block_devices(DOMAIN, &["vda"]))
}

fn dashboard(backend: &Arc<ScriptedBackend>) -> Dashboard {
    Dashboard::new(backend.clone(), Arc::new(MetricCatalog::builtin()))
}

#[tokio::test]
async fn refresh_polls_every_card() {
    let backend = Arc::new(ready_backend());
    let mut dashboard = dashboard(&backend);
    dashboard.open(&InstanceIdentity::new("abc"));

    let data = dashboard.refresh().await;

    assert!(data.state.is_ready());
    assert_eq!(data.state.domain.as_deref(), Some(DOMAIN));

    let devices: Vec<&str> = data.devices.iter().map(String::as_str).collect();
    assert_eq!(devices, vec!["vda", "vdb"]);
    assert!(data.device_selector_visible);

    assert_eq!(data.top_cards.len(), 3);
    assert_eq!(data.trend_cards.len(), 4);
    assert_eq!(data.top_cards[0].display.as_deref(), Some("34.56%"));

    // unscripted queries fail per card without breaking the others
    assert!(data.top_cards[1].error.is_some());
    assert_eq!(data.top_cards[1].display.as_deref(), Some("0.00%"));

    let disk = &data.trend_cards[3];
    match &disk.data {
        CardData::Series(set) => {
            let names: Vec<&str> = set.names().collect();
            assert_eq!(names, vec!["read-vda", "read-vdb"]);
            assert!(!set.is_synthetic());
        }
        other => panic!("unexpected card data: {other:?}"),
    }

    let modes: Vec<&str> = backend
        .seen()
        .into_iter()
        .filter(|(q, _)| *q == cpu_query(DOMAIN))
        .map(|(_, mode)| mode)
        .collect();
    assert_eq!(modes.len(), 2);
    assert!(modes.contains(&"current"));
    assert!(modes.contains(&"range"));
}

#[tokio::test]
async fn device_selection_filters_queries() {
    let backend = Arc::new(ready_backend());
    let mut dashboard = dashboard(&backend);
    dashboard.open(&InstanceIdentity::new("abc"));
    dashboard.refresh().await;

    assert!(dashboard.select_device("vda"));
    let data = dashboard.refresh().await;
    assert_eq!(data.selected_device, DeviceFilter::Device("vda".to_string()));
    assert!(backend.was_asked(&disk_read("vda")));

    match &data.trend_cards[3].data {
        CardData::Series(set) => {
            let names: Vec<&str> = set.names().collect();
            assert_eq!(names, vec!["read-vda"]);
        }
        other => panic!("unexpected card data: {other:?}"),
    }

    assert!(dashboard.select_device("all"));
    let data = dashboard.refresh().await;
    assert_eq!(data.selected_device, DeviceFilter::All);
}

#[tokio::test]
async fn not_ready_skips_card_queries() {
    let backend = Arc::new(ScriptedBackend::new().fail(&probe_query("abc")));
    let mut dashboard = dashboard(&backend);
    dashboard.open(&InstanceIdentity::new("abc"));

    let data = dashboard.refresh().await;

    assert!(data.state.is_error());
    assert!(!data.state.backend_available);
    assert!(data.top_cards.is_empty());
    assert!(data.trend_cards.is_empty());
    assert!(!data.device_selector_visible);
    assert_eq!(backend.seen().len(), 1);
}

#[tokio::test]
async fn synthetic_cpu_trend_is_opt_in() {
    let backend = Arc::new(
        ScriptedBackend::new()
            .answer(&probe_query("abc"), one_value())
            .answer(&info_query("abc"), openstack_info("abc", DOMAIN)),
    );

    let mut plain = dashboard(&backend);
    plain.open(&InstanceIdentity::new("abc"));
    let data = plain.refresh().await;
    assert!(data.trend_cards[0].data.is_empty());
    assert!(!data.trend_cards[0].data.is_synthetic());

    let mut synthetic = dashboard(&backend).allow_synthetic(true);
    synthetic.open(&InstanceIdentity::new("abc"));
    let data = synthetic.refresh().await;
    assert!(data.trend_cards[0].data.is_synthetic());
    // only the CPU trend is eligible
    assert!(!data.trend_cards[1].data.is_synthetic());
}

#[test]
fn card_configs_are_structurally_stable() {
    assert_eq!(build_card_configs("abc", DOMAIN), build_card_configs("abc", DOMAIN));
}
