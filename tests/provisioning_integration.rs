//! ---
//! prov_section: "15-testing-qa-runbook"
//! prov_subsection: "integration-tests"
//! prov_type: "source"
//! prov_scope: "code"
//! prov_description: "Integration and validation tests for the R-PROV stack."
//! prov_version: "v0.0.0-prealpha"
//! prov_owner: "tbd"
//! ---
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use r_prov_adapter::envelope::{
    HOST_ADAPTER_PROP, HOST_URI_PROP, NETWORK_DRIVER_PROP, NETWORK_ID_PROP, NETWORK_NAME_PROP,
};
use r_prov_adapter::model::OperationType;
use r_prov_adapter::{
    AdapterType, ChannelTaskSink, CommandEnvelope, CommandExecutor, ContainerHost, ExecutorError,
    ExecutorRegistry, ExecutorResponse, ExecutorResult, FailureKind, InMemoryHostDirectory,
    InMemoryResourceStore, NetworkAdapterService, NetworkRequest, ResourceRecord, Submission,
    TaskStage, TaskStageUpdate,
};
use r_prov_common::AppConfig;
use r_prov_metrics::ProvMetrics;
use serde_json::json;
use tempfile::tempdir;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;

const DOCKER_HOST: &str = "/resources/hosts/docker-1";
const KUBE_HOST: &str = "/resources/hosts/kube-1";

/// Engine keeping networks in memory, failing the first `flaky_creates`
/// create calls with a server error.
struct FakeEngine {
    name: &'static str,
    networks: Mutex<BTreeMap<String, (String, String)>>,
    next_id: AtomicUsize,
    flaky_creates: AtomicUsize,
    calls: Mutex<Vec<(&'static str, CommandEnvelope)>>,
}

impl FakeEngine {
    fn new(name: &'static str, flaky_creates: usize) -> Self {
        Self {
            name,
            networks: Mutex::new(BTreeMap::new()),
            next_id: AtomicUsize::new(1),
            flaky_creates: AtomicUsize::new(flaky_creates),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn record(&self, op: &'static str, input: &CommandEnvelope) {
        self.calls.lock().push((op, input.clone()));
    }

    fn count(&self, op: &str) -> usize {
        self.calls.lock().iter().filter(|(name, _)| *name == op).count()
    }

    fn id_of(input: &CommandEnvelope) -> Result<String, ExecutorError> {
        input
            .get_str(NETWORK_ID_PROP)
            .map(str::to_string)
            .ok_or_else(|| ExecutorError::protocol(400, "missing network id"))
    }
}

#[async_trait]
impl CommandExecutor for FakeEngine {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn create(&self, input: CommandEnvelope) -> ExecutorResult {
        self.record("create", &input);
        if self
            .flaky_creates
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
        {
            return Err(ExecutorError::protocol(502, "bad gateway"));
        }
        let name = input.get_str(NETWORK_NAME_PROP).unwrap_or_default().to_string();
        let driver = input.get_str(NETWORK_DRIVER_PROP).unwrap_or_default().to_string();
        let id = format!("{}-net-{}", self.name, self.next_id.fetch_add(1, Ordering::SeqCst));
        self.networks.lock().insert(id.clone(), (name, driver));
        Ok(ExecutorResponse::ok(json!({ "Id": id }).to_string()))
    }

    async fn inspect(&self, input: CommandEnvelope) -> ExecutorResult {
        self.record("inspect", &input);
        let id = Self::id_of(&input)?;
        let networks = self.networks.lock();
        let (name, driver) = networks
            .get(&id)
            .ok_or_else(|| ExecutorError::protocol(404, format!("network {id} not found")))?;
        Ok(ExecutorResponse::ok(
            json!({
                "Id": id,
                "Name": name,
                "Driver": driver,
                "Internal": false,
                "Labels": { "engine": self.name },
                "IPAM": {
                    "Driver": "default",
                    "Config": [{ "Subnet": "10.10.0.0/24", "Gateway": "10.10.0.1" }]
                }
            })
            .to_string(),
        ))
    }

    async fn remove(&self, input: CommandEnvelope) -> ExecutorResult {
        self.record("remove", &input);
        let id = Self::id_of(&input)?;
        match self.networks.lock().remove(&id) {
            Some(_) => Ok(ExecutorResponse::empty(204)),
            None => Err(ExecutorError::protocol(404, format!("network {id} not found"))),
        }
    }

    async fn list(&self, input: CommandEnvelope) -> ExecutorResult {
        self.record("list", &input);
        let body: Vec<_> = self
            .networks
            .lock()
            .iter()
            .map(|(id, (name, driver))| json!({ "Id": id, "Name": name, "Driver": driver }))
            .collect();
        Ok(ExecutorResponse::ok(serde_json::Value::Array(body).to_string()))
    }
}

struct Deployment {
    service: Arc<NetworkAdapterService>,
    store: Arc<InMemoryResourceStore>,
    docker: Arc<FakeEngine>,
    kube: Arc<FakeEngine>,
    updates: UnboundedReceiver<TaskStageUpdate>,
    metrics: Option<ProvMetrics>,
}

impl Deployment {
    fn from_config(config: &AppConfig, flaky_creates: usize) -> Self {
        let hosts = InMemoryHostDirectory::new();
        hosts.insert(
            ContainerHost::new(DOCKER_HOST, "tcp://docker-1:2376", AdapterType::Docker)
                .with_credentials("/auth/credentials/docker-1"),
        );
        hosts.insert(ContainerHost::new(
            KUBE_HOST,
            "https://kube-1:6443",
            AdapterType::Kubernetes,
        ));
        let docker = Arc::new(FakeEngine::new("docker", flaky_creates));
        let kube = Arc::new(FakeEngine::new("kube", 0));
        let resolver = ExecutorRegistry::new(Arc::new(hosts))
            .with_executor(AdapterType::Docker, docker.clone())
            .with_executor(AdapterType::Kubernetes, kube.clone());
        let store = Arc::new(InMemoryResourceStore::new());
        let (sink, updates) = ChannelTaskSink::new();
        let metrics = ProvMetrics::from_config(&config.metrics).unwrap();
        let mut service = NetworkAdapterService::new(
            &config.adapter,
            store.clone(),
            Arc::new(resolver),
            Arc::new(sink),
        );
        if let Some(metrics) = &metrics {
            service = service.with_metrics(metrics.adapter.clone());
        }
        Self {
            service: Arc::new(service),
            store,
            docker,
            kube,
            updates,
            metrics,
        }
    }

    fn submit(&self, operation: OperationType, reference: &str) -> Submission {
        self.service
            .submit(NetworkRequest::new(operation, reference))
            .unwrap()
    }

    async fn next_update(&mut self) -> TaskStageUpdate {
        timeout(Duration::from_secs(5), self.updates.recv())
            .await
            .expect("request did not reach a terminal stage")
            .expect("task sink closed")
    }
}

fn load_config(contents: &str) -> AppConfig {
    let dir = tempdir().unwrap();
    let path = dir.path().join("r-prov.toml");
    std::fs::write(&path, contents).unwrap();
    AppConfig::from_path(&path).unwrap()
}

const CONFIG: &str = r#"
[adapter]
network_create_retries = 2
retryable_statuses = [500, 502, 503]
default_network_driver = "overlay"
retry_backoff_ms = 1

[trust]
reconcile_interval_secs = 3600
"#;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn network_lifecycle_follows_configuration() {
    r_prov_logging::init();
    let config = load_config(CONFIG);
    let mut deployment = Deployment::from_config(&config, 2);
    let net = "/resources/container-networks/backend";
    let mut record = ResourceRecord::new(net, "backend").with_host(DOCKER_HOST);
    record.document_expiration_time_micros = 42;
    deployment.store.insert(record);

    assert!(matches!(
        deployment.submit(OperationType::Create, net),
        Submission::Accepted
    ));
    let update = deployment.next_update().await;
    assert_eq!(update.stage, TaskStage::Finished, "{update:?}");
    assert!(!update.tracking_id.is_empty());
    assert_eq!(deployment.docker.count("create"), 3);

    let stored = deployment.store.snapshot(net).unwrap();
    assert_eq!(stored.id.as_deref(), Some("docker-net-1"));
    assert_eq!(stored.driver.as_deref(), Some("overlay"));
    assert_eq!(stored.labels.get("engine").map(String::as_str), Some("docker"));
    assert_eq!(stored.document_expiration_time_micros, -1);

    let creates: Vec<_> = deployment
        .docker
        .calls
        .lock()
        .iter()
        .filter(|(op, _)| *op == "create")
        .map(|(_, input)| input.clone())
        .collect();
    assert_eq!(creates[0].get_str(HOST_URI_PROP), Some("tcp://docker-1:2376"));
    assert_eq!(creates[0].get_str(HOST_ADAPTER_PROP), Some("DOCKER"));

    deployment.submit(OperationType::Delete, net);
    assert_eq!(deployment.next_update().await.stage, TaskStage::Finished);
    // A second delete finds the network already gone.
    deployment.submit(OperationType::Delete, net);
    assert_eq!(deployment.next_update().await.stage, TaskStage::Finished);
    assert_eq!(deployment.docker.count("remove"), 2);

    let rendered = deployment.metrics.as_ref().unwrap().render().unwrap();
    assert!(rendered.contains("r_prov_adapter_retries_total{operation=\"CREATE\"} 2"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn retry_budget_comes_from_configuration() {
    let config = load_config(CONFIG);
    let mut deployment = Deployment::from_config(&config, 3);
    let net = "/resources/container-networks/flaky";
    deployment
        .store
        .insert(ResourceRecord::new(net, "flaky").with_host(DOCKER_HOST));

    deployment.submit(OperationType::Create, net);
    let update = deployment.next_update().await;
    assert_eq!(update.stage, TaskStage::Failed);
    assert_eq!(update.failure.unwrap().kind, FailureKind::Backend);
    assert_eq!(deployment.docker.count("create"), 3);
    assert_eq!(deployment.docker.count("inspect"), 0);
    assert!(deployment.store.snapshot(net).unwrap().id.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn requests_route_to_the_owning_host_family() {
    let config = load_config(CONFIG);
    let mut deployment = Deployment::from_config(&config, 0);
    let net = "/resources/container-networks/pods";
    deployment
        .store
        .insert(ResourceRecord::new(net, "pods").with_host(KUBE_HOST));

    deployment.submit(OperationType::Create, net);
    assert_eq!(deployment.next_update().await.stage, TaskStage::Finished);
    assert_eq!(deployment.kube.count("create"), 1);
    assert_eq!(deployment.docker.count("create"), 0);

    let gets_before_list = deployment.store.get_count();
    let listing = deployment
        .submit(OperationType::List, KUBE_HOST)
        .into_direct()
        .unwrap()
        .wait()
        .await
        .unwrap();
    let listed: serde_json::Value = serde_json::from_str(&listing).unwrap();
    assert_eq!(listed[0]["Id"], "kube-net-1");
    assert_eq!(listed[0]["Name"], "pods");
    assert_eq!(deployment.store.get_count(), gets_before_list);

    deployment.submit(OperationType::Connect, net);
    let update = deployment.next_update().await;
    assert_eq!(update.stage, TaskStage::Failed);
    assert_eq!(update.failure.unwrap().kind, FailureKind::NotImplemented);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn disabled_metrics_leave_requests_unaffected() {
    let config = load_config(&format!("{CONFIG}\n[metrics]\nenabled = false\n"));
    assert!(!config.metrics.enabled);
    let mut deployment = Deployment::from_config(&config, 1);
    assert!(deployment.metrics.is_none());
    let net = "/resources/container-networks/quiet";
    deployment
        .store
        .insert(ResourceRecord::new(net, "quiet").with_host(DOCKER_HOST));

    deployment.submit(OperationType::Create, net);
    assert_eq!(deployment.next_update().await.stage, TaskStage::Finished);
    assert_eq!(deployment.docker.count("create"), 2);
    assert!(deployment.store.snapshot(net).unwrap().id.is_some());
}
