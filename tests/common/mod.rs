//! Scripted in-memory backend shared by the integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use vmwatch::{AdapterError, MetricsBackend, RawResponse, RawSample};
use vmwatch_types::{QueryMode, SampleTuple};

#[derive(Debug, Clone)]
enum Reply {
    Ok(RawResponse),
    Fail,
}

#[derive(Debug, Clone)]
struct Script {
    delay: Duration,
    reply: Reply,
}

/// Answers exact query strings with canned replies, after an optional delay,
/// and records every query it was asked.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    scripts: BTreeMap<String, Script>,
    seen: Mutex<Vec<(String, &'static str)>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(self, query: &str, response: RawResponse) -> Self {
        self.answer_after(query, Duration::ZERO, response)
    }

    pub fn answer_after(mut self, query: &str, delay: Duration, response: RawResponse) -> Self {
        self.scripts.insert(
            query.to_string(),
            Script {
                delay,
                reply: Reply::Ok(response),
            },
        );
        self
    }

    pub fn fail(mut self, query: &str) -> Self {
        self.scripts.insert(
            query.to_string(),
            Script {
                delay: Duration::ZERO,
                reply: Reply::Fail,
            },
        );
        self
    }

    /// Every query received so far, with its mode.
    pub fn seen(&self) -> Vec<(String, &'static str)> {
        self.seen.lock().clone()
    }

    pub fn was_asked(&self, query: &str) -> bool {
        self.seen.lock().iter().any(|(q, _)| q == query)
    }
}

#[async_trait]
impl MetricsBackend for ScriptedBackend {
    async fn fetch(&self, query: &str, mode: QueryMode) -> Result<RawResponse, AdapterError> {
        self.seen.lock().push((query.to_string(), mode.as_str()));
        let Some(script) = self.scripts.get(query).cloned() else {
            return Err(AdapterError::Query(format!("unscripted query {query}")));
        };
        if !script.delay.is_zero() {
            tokio::time::sleep(script.delay).await;
        }
        match script.reply {
            Reply::Ok(response) => Ok(response),
            Reply::Fail => Err(AdapterError::Connection("connection refused".to_string())),
        }
    }

    fn description(&self) -> &str {
        "scripted"
    }
}

pub fn probe_query(instance: &str) -> String {
    format!(r#"count(libvirt_domain_openstack_info{{instance_id="{instance}"}})"#)
}

pub fn info_query(instance: &str) -> String {
    format!(r#"libvirt_domain_openstack_info{{instance_id="{instance}"}}"#)
}

pub fn devices_query(domain: &str) -> String {
    format!(r#"libvirt_domain_block_stats_read_bytes_total{{domain="{domain}"}}"#)
}

pub fn cpu_query(domain: &str) -> String {
    format!(
        r#"rate(libvirt_domain_info_cpu_time_seconds_total{{domain="{domain}"}}[5m]) / on(domain) libvirt_domain_info_virtual_cpus{{domain="{domain}"}}"#
    )
}

pub fn one_value() -> RawResponse {
    RawResponse::new(vec![RawSample::instant(
        Vec::<(String, String)>::new(),
        SampleTuple::new(1_700_000_000.0, "1"),
    )])
}

pub fn openstack_info(instance: &str, domain: &str) -> RawResponse {
    RawResponse::new(vec![RawSample::instant(
        [("instance_id", instance), ("domain", domain)],
        SampleTuple::new(1_700_000_000.0, "1"),
    )])
}

pub fn block_devices(domain: &str, devices: &[&str]) -> RawResponse {
    RawResponse::new(
        devices
            .iter()
            .map(|device| {
                RawSample::instant(
                    [("domain", domain), ("device", *device), ("target_device", *device)],
                    SampleTuple::new(1_700_000_000.0, "4096"),
                )
            })
            .collect(),
    )
}
