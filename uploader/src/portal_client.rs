use crate::models::{
    CreatedId, FinishItemRq, FinishLaunchRq, ItemId, ItemRef, Page, SaveLogRq, StartItemRq,
    StartLaunchRq,
};
use chrono::Utc;
use parser::timestamp::to_unix_millis;
use parser::{Elapsed, ReportError, ReportSink, TestResult};
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Connection settings for a report portal project.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub base_url: String,
    pub project: String,
    pub token: String,
    pub skip_tls: bool,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
struct PortalItem {
    name: String,
    id: Option<ItemId>,
    uuid: String,
}

#[derive(Debug, Clone)]
struct PortalTest {
    uuid: String,
    start_millis: i64,
}

/// Report sink that uploads to a ReportPortal instance over its REST API.
#[derive(Debug)]
pub struct PortalSink {
    client: Client,
    base_url: String,
    project: String,
    token: String,
    launch: Option<PortalItem>,
    suite: Option<PortalItem>,
    tests: Vec<PortalTest>,
    index: HashMap<String, usize>,
}

fn http_error(e: reqwest::Error) -> ReportError {
    ReportError::Sink(format!("HTTP request failed: {e}"))
}

impl PortalSink {
    pub fn connect(config: &PortalConfig) -> Result<Self, ReportError> {
        info!("Connecting to portal {} (project {})", config.base_url, config.project);
        if config.skip_tls {
            warn!("TLS certificate verification is disabled");
        }

        let client = Client::builder()
            .danger_accept_invalid_certs(config.skip_tls)
            .timeout(config.timeout)
            .build()
            .map_err(http_error)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            project: config.project.clone(),
            token: config.token.clone(),
            launch: None,
            suite: None,
            tests: Vec::new(),
            index: HashMap::new(),
        })
    }

    fn url(&self, version: &str, path: &str) -> String {
        format!("{}/api/{}/{}/{}", self.base_url, version, self.project, path)
    }

    fn execute(&self, request: RequestBuilder) -> Result<Response, ReportError> {
        let response = request.bearer_auth(&self.token).send().map_err(http_error)?;
        let status = response.status();
        if !status.is_success() {
            let url = response.url().to_string();
            let body = response.text().unwrap_or_default();
            return Err(ReportError::Sink(format!("{url} returned {status}: {body}")));
        }
        Ok(response)
    }

    fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ReportError> {
        self.execute(request)?.json::<T>().map_err(http_error)
    }

    fn get_item(&self, kind: &str, id: &ItemId) -> Result<ItemRef, ReportError> {
        debug!("Resolving {} {}", kind, id);
        self.fetch(self.client.get(self.url("v1", &format!("{kind}/{id}"))))
    }

    /// Id of the first launch called `name`, if any.
    pub fn find_launch_id(&self, name: &str) -> Result<Option<ItemId>, ReportError> {
        let page: Page = self.fetch(
            self.client
                .get(self.url("v1", "launch"))
                .query(&[("filter.eq.name", name)]),
        )?;
        Ok(page.content.into_iter().next().and_then(|item| item.id))
    }

    /// Id of the first suite called `name` within the launch `launch_id`, if any.
    pub fn find_suite_id(&self, launch_id: &ItemId, name: &str) -> Result<Option<ItemId>, ReportError> {
        let page: Page = self.fetch(
            self.client
                .get(self.url("v1", "item"))
                .query(&[("filter.eq.launchId", launch_id.0.as_str()), ("filter.eq.name", name)]),
        )?;
        Ok(page.content.into_iter().next().and_then(|item| item.id))
    }

    /// Report into an existing launch instead of creating one.
    pub fn resume_launch(&mut self, name: &str, id: ItemId) {
        info!("Reusing existing launch '{}' ({})", name, id);
        self.launch = Some(PortalItem { name: name.to_string(), id: Some(id), uuid: String::new() });
    }

    /// Report into an existing suite instead of creating one.
    pub fn resume_suite(&mut self, name: &str, id: ItemId) {
        info!("Reusing existing suite '{}' ({})", name, id);
        self.suite = Some(PortalItem { name: name.to_string(), id: Some(id), uuid: String::new() });
    }

    /// Fill in the uuid of an item known only by id.
    fn resolve(&self, kind: &str, item: &mut PortalItem) -> Result<(), ReportError> {
        if !item.uuid.is_empty() {
            return Ok(());
        }
        let id = item
            .id
            .clone()
            .ok_or_else(|| ReportError::Sink(format!("{kind} '{}' has neither id nor uuid", item.name)))?;
        let found = self.get_item(kind, &id)?;
        item.uuid = found.uuid;
        if found.id.is_some() {
            item.id = found.id;
        }
        Ok(())
    }

    fn launch_uuid(&self) -> Result<&str, ReportError> {
        match &self.launch {
            Some(launch) if !launch.uuid.is_empty() => Ok(&launch.uuid),
            _ => Err(ReportError::NoActiveRun),
        }
    }
}

impl ReportSink for PortalSink {
    fn name(&self) -> &'static str {
        "portal"
    }

    #[instrument(skip(self))]
    fn ensure_run(&mut self, name: &str, suite: &str, start_time: &str) -> Result<(), ReportError> {
        let start = to_unix_millis(start_time)?;

        let mut launch = match self.launch.take() {
            Some(launch) => launch,
            None => {
                info!("Creating launch '{}'", name);
                let rq = StartLaunchRq { name: name.to_string(), start_time: start, rerun: false };
                let created: CreatedId = self.fetch(self.client.post(self.url("v1", "launch")).json(&rq))?;
                PortalItem { name: name.to_string(), id: Some(created.id), uuid: String::new() }
            }
        };
        let resolved = self.resolve("launch", &mut launch);
        self.launch = Some(launch);
        resolved?;

        let mut current = match self.suite.take() {
            Some(existing) if existing.name == suite => existing,
            _ => {
                info!("Creating suite '{}'", suite);
                let rq = StartItemRq {
                    name: suite.to_string(),
                    item_type: "suite".to_string(),
                    launch_uuid: self.launch_uuid()?.to_string(),
                    description: String::new(),
                    start_time: start,
                };
                let created: CreatedId = self.fetch(self.client.post(self.url("v1", "item")).json(&rq))?;
                PortalItem { name: suite.to_string(), id: Some(created.id), uuid: String::new() }
            }
        };
        let resolved = self.resolve("item", &mut current);
        self.suite = Some(current);
        resolved
    }

    fn ensure_test(&mut self, name: &str, start_time: &str) -> Result<(), ReportError> {
        if self.lookup_test_index(name).is_some() {
            return Ok(());
        }

        let start = to_unix_millis(start_time)?;
        let launch_uuid = self.launch_uuid()?.to_string();
        let suite_uuid = match &self.suite {
            Some(suite) if !suite.uuid.is_empty() => suite.uuid.clone(),
            _ => return Err(ReportError::NoActiveRun),
        };

        debug!("Creating test item '{}'", name);
        let rq = StartItemRq {
            name: name.to_string(),
            item_type: "test".to_string(),
            launch_uuid,
            description: name.to_string(),
            start_time: start,
        };
        let created: CreatedId = self.fetch(
            self.client
                .post(self.url("v2", &format!("item/{suite_uuid}")))
                .json(&rq),
        )?;

        self.index.insert(name.to_string(), self.tests.len());
        self.tests.push(PortalTest { uuid: created.id.0, start_millis: start });
        Ok(())
    }

    fn append_log_line(
        &mut self,
        test: &str,
        time: &str,
        level: &str,
        message: &str,
    ) -> Result<(), ReportError> {
        let idx = self
            .lookup_test_index(test)
            .ok_or_else(|| ReportError::UnknownTest(test.to_string()))?;
        let mut rq = SaveLogRq {
            launch_uuid: self.launch_uuid()?.to_string(),
            item_uuid: self.tests[idx].uuid.clone(),
            time: time.to_string(),
            message: message.to_string(),
            level: level.to_string(),
        };

        let url = self.url("v2", "log/entry");
        self.execute(self.client.post(&url).json(&rq))?;
        // Mirror the line at launch level.
        rq.item_uuid.clear();
        self.execute(self.client.post(&url).json(&rq))?;
        Ok(())
    }

    fn finish_test(
        &mut self,
        test: &str,
        _start_time: &str,
        result: &TestResult,
        elapsed: &Elapsed,
    ) -> Result<(), ReportError> {
        let idx = self
            .lookup_test_index(test)
            .ok_or_else(|| ReportError::UnknownTest(test.to_string()))?;
        let item = &self.tests[idx];

        debug!("Finishing test '{}' as {} after {}s", test, result.status(), elapsed.as_str());
        let end_time = item
            .start_millis
            .checked_add(elapsed.as_millis())
            .ok_or_else(|| ReportError::InvalidDuration(elapsed.as_str().to_string()))?;
        let rq = FinishItemRq {
            end_time,
            launch_uuid: self.launch_uuid()?.to_string(),
            status: Some(result.status().to_string()),
        };
        self.execute(
            self.client
                .put(self.url("v1", &format!("item/{}", item.uuid)))
                .json(&rq),
        )?;
        Ok(())
    }

    fn finish_run(&mut self, end_time: &str) -> Result<(), ReportError> {
        let Ok(launch_uuid) = self.launch_uuid().map(str::to_string) else {
            warn!("Nothing was reported, no launch to finish");
            return Ok(());
        };
        let end = if end_time.is_empty() {
            warn!("No timestamp seen in the log, finishing launch at current time");
            Utc::now().timestamp_millis()
        } else {
            to_unix_millis(end_time)?
        };

        if let Some(suite) = self.suite.as_ref().filter(|s| !s.uuid.is_empty()) {
            let rq = FinishItemRq { end_time: end, launch_uuid: launch_uuid.clone(), status: None };
            self.execute(
                self.client
                    .put(self.url("v1", &format!("item/{}", suite.uuid)))
                    .json(&rq),
            )?;
        }

        info!("Finishing launch {}", launch_uuid);
        self.execute(
            self.client
                .put(self.url("v1", &format!("launch/{launch_uuid}/finish")))
                .json(&FinishLaunchRq { end_time: end }),
        )?;
        Ok(())
    }

    fn lookup_test_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }
}
