//! Integration tests for `kube-hosts-sync`.
//!
//! The cluster is replaced by an in-memory [`FakeCluster`]; hosts files live
//! in temp dirs.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Service, ServiceSpec};
use k8s_openapi::api::networking::v1::{Ingress, IngressRule, IngressSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use kube_hosts_sync::{
    ClusterApi, FailurePolicy, Marker, OutputTarget, Result, SyncConfig, SyncError, Syncer,
    owned_lines,
};

// ---------------------------------------------------------------------------
// Fake cluster
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct FakeCluster {
    ingresses: Mutex<Vec<Ingress>>,
    services: Mutex<Vec<Service>>,
    down: Mutex<bool>,
}

impl FakeCluster {
    fn with_ingress_hosts(self, hosts: &[&str]) -> Self {
        self.ingresses.lock().unwrap().push(Ingress {
            metadata: ObjectMeta {
                name: Some("ingress".into()),
                ..Default::default()
            },
            spec: Some(IngressSpec {
                rules: Some(
                    hosts
                        .iter()
                        .map(|h| IngressRule {
                            host: Some((*h).to_string()),
                            ..Default::default()
                        })
                        .collect(),
                ),
                ..Default::default()
            }),
            ..Default::default()
        });
        self
    }

    fn with_service(self, name: &str, cluster_ip: Option<&str>) -> Self {
        self.set_service(name, cluster_ip);
        self
    }

    fn set_service(&self, name: &str, cluster_ip: Option<&str>) {
        let mut services = self.services.lock().unwrap();
        services.retain(|s| s.metadata.name.as_deref() != Some(name));
        services.push(Service {
            metadata: ObjectMeta {
                name: Some(name.into()),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                cluster_ip: cluster_ip.map(str::to_string),
                ..Default::default()
            }),
            ..Default::default()
        });
    }

    fn remove_service(&self, name: &str) {
        self.services
            .lock()
            .unwrap()
            .retain(|s| s.metadata.name.as_deref() != Some(name));
    }

    fn set_down(&self, down: bool) {
        *self.down.lock().unwrap() = down;
    }
}

#[async_trait]
impl ClusterApi for FakeCluster {
    async fn list_ingresses(&self, namespace: &str) -> Result<Vec<Ingress>> {
        if *self.down.lock().unwrap() {
            return Err(SyncError::source_unavailable(
                "ingresses",
                namespace,
                "connection refused",
            ));
        }
        Ok(self.ingresses.lock().unwrap().clone())
    }

    async fn list_services(&self, _namespace: &str) -> Result<Vec<Service>> {
        Ok(self.services.lock().unwrap().clone())
    }
}

const BASE: &str =
    "127.0.0.1 localhost\n::1 localhost ip6-localhost\n# static entries\n192.168.1.1 router\n";

fn hosts_file(dir: &Path) -> PathBuf {
    let path = dir.join("hosts");
    std::fs::write(&path, BASE).unwrap();
    path
}

fn in_place(pattern: &str, path: &Path, cluster: &Arc<FakeCluster>) -> Syncer<Arc<FakeCluster>> {
    Syncer::new(SyncConfig::new(pattern).with_hosts_file(path), Arc::clone(cluster)).unwrap()
}

fn read(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap()
}

// ---------------------------------------------------------------------------
// Passes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn full_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let path = hosts_file(dir.path());
    let cluster = Arc::new(
        FakeCluster::default()
            .with_ingress_hosts(&["svc-web.local", "shop.example.com"])
            .with_service("svc-a", Some("10.0.0.5"))
            .with_service("svc-pending", None)
            .with_service("db", Some("10.0.0.8")),
    );

    let syncer = in_place("^svc-", &path, &cluster);
    let m = Marker::for_pattern("^svc-");

    syncer.run_pass().await.unwrap();
    assert_eq!(
        read(&path),
        format!("{BASE}127.0.0.1 svc-web.local {m}\n10.0.0.5 svc-a {m}\n")
    );

    // Address change replaces the old line.
    cluster.set_service("svc-a", Some("10.0.0.9"));
    syncer.run_pass().await.unwrap();
    let text = read(&path);
    assert!(text.contains(&format!("10.0.0.9 svc-a {m}")));
    assert!(!text.contains("10.0.0.5"));
    assert_eq!(owned_lines(&text, &m).len(), 2);

    // Service removed from the cluster: its line goes away.
    cluster.remove_service("svc-a");
    syncer.run_pass().await.unwrap();
    assert_eq!(read(&path), format!("{BASE}127.0.0.1 svc-web.local {m}\n"));
}

#[tokio::test]
async fn repeated_passes_are_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = hosts_file(dir.path());
    let cluster = Arc::new(
        FakeCluster::default()
            .with_ingress_hosts(&["app.local"])
            .with_service("app-api", Some("10.0.0.2")),
    );

    let syncer = in_place("app", &path, &cluster);

    syncer.run_pass().await.unwrap();
    let first = read(&path);
    let report = syncer.run_pass().await.unwrap();

    assert_eq!(read(&path), first);
    assert!(!report.merge.changed);
    assert!(!report.written);
}

#[tokio::test]
async fn instances_with_different_patterns_coexist() {
    let dir = tempfile::tempdir().unwrap();
    let path = hosts_file(dir.path());
    let cluster = Arc::new(
        FakeCluster::default()
            .with_ingress_hosts(&["web.local"])
            .with_service("svc-a", Some("10.0.0.5")),
    );

    let svc = in_place("^svc-", &path, &cluster);
    let web = Syncer::new(
        SyncConfig::new(r"\.local$")
            .with_hosts_file(&path)
            .with_default_address("10.1.1.1"),
        Arc::clone(&cluster),
    )
    .unwrap();

    svc.run_pass().await.unwrap();
    web.run_pass().await.unwrap();
    svc.run_pass().await.unwrap();

    let text = read(&path);
    assert_eq!(
        owned_lines(&text, svc.marker()),
        vec![format!("10.0.0.5 svc-a {}", svc.marker())]
    );
    assert_eq!(
        owned_lines(&text, web.marker()),
        vec![format!("10.1.1.1 web.local {}", web.marker())]
    );
    assert!(text.starts_with(BASE));
}

#[tokio::test]
async fn cluster_failure_leaves_file_unmodified() {
    let dir = tempfile::tempdir().unwrap();
    let path = hosts_file(dir.path());
    let cluster = Arc::new(FakeCluster::default().with_service("svc-a", Some("10.0.0.5")));
    let syncer = in_place("^svc-", &path, &cluster);

    syncer.run_pass().await.unwrap();
    let before = read(&path);

    cluster.set_down(true);
    let err = syncer.run_pass().await.unwrap_err();
    assert!(matches!(err, SyncError::SourceUnavailable { .. }));
    assert_eq!(read(&path), before);
}

#[tokio::test]
async fn separate_output_file_keeps_input_intact() {
    let dir = tempfile::tempdir().unwrap();
    let input = hosts_file(dir.path());
    let output = dir.path().join("hosts.out");
    let cluster = Arc::new(FakeCluster::default().with_service("svc-a", Some("10.0.0.5")));

    let config = SyncConfig::new("^svc-")
        .with_input(&input)
        .with_output(OutputTarget::File(output.clone()));
    Syncer::new(config, Arc::clone(&cluster)).unwrap().run_pass().await.unwrap();

    assert_eq!(read(&input), BASE);
    assert!(read(&output).ends_with("10.0.0.5 svc-a # kube-hosts-sync: \"^svc-\"\n"));
}

#[tokio::test]
async fn stdout_output_leaves_files_alone() {
    let dir = tempfile::tempdir().unwrap();
    let input = hosts_file(dir.path());
    let cluster = Arc::new(FakeCluster::default().with_service("svc-a", Some("10.0.0.5")));

    let config = SyncConfig::new("^svc-")
        .with_input(&input)
        .with_output(OutputTarget::Stdout);
    let report = Syncer::new(config, Arc::clone(&cluster))
        .unwrap()
        .run_pass()
        .await
        .unwrap();

    assert!(report.written);
    assert!(report.merge.changed);
    assert_eq!(read(&input), BASE);
    let files: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(files, vec![std::ffi::OsString::from("hosts")]);
}

#[tokio::test]
async fn lines_from_python_release_are_migrated() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hosts");
    std::fs::write(
        &path,
        format!(
            "{BASE}10.0.0.5 svc-a # microk8s ingress host sync: '^svc-'\n\
             127.0.0.1 web.local # microk8s ingress host sync: 'web'\n"
        ),
    )
    .unwrap();
    let cluster = Arc::new(FakeCluster::default().with_service("svc-a", Some("10.0.0.9")));
    let syncer = in_place("^svc-", &path, &cluster);
    let m = syncer.marker().clone();

    let report = syncer.run_pass().await.unwrap();

    assert_eq!(report.merge.removed, 1);
    assert_eq!(
        read(&path),
        format!(
            "{BASE}127.0.0.1 web.local # microk8s ingress host sync: 'web'\n10.0.0.9 svc-a {m}\n"
        )
    );
}

#[tokio::test]
async fn unwritable_output_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let input = hosts_file(dir.path());
    let cluster = Arc::new(FakeCluster::default());

    let config = SyncConfig::new(".")
        .with_input(&input)
        .with_output(OutputTarget::File(dir.path().join("missing").join("hosts")));
    let err = Syncer::new(config, Arc::clone(&cluster))
        .unwrap()
        .run_pass()
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Io { op: "write", .. }));
}

// ---------------------------------------------------------------------------
// Watch loop
// ---------------------------------------------------------------------------

#[tokio::test]
async fn watch_loop_picks_up_changes_and_stops_on_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let path = hosts_file(dir.path());
    let cluster = Arc::new(FakeCluster::default().with_service("svc-a", Some("10.0.0.5")));

    let config = SyncConfig::new("^svc-")
        .with_hosts_file(&path)
        .with_watch(Duration::from_millis(20));
    let syncer = Syncer::new(config, Arc::clone(&cluster)).unwrap();

    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    let driver = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cluster.set_service("svc-b", Some("10.0.0.6"));
        for _ in 0..100 {
            if read(&path).contains("svc-b") {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tx.send(()).unwrap();
    };
    let shutdown = async {
        let _ = rx.await;
    };

    let (result, ()) = tokio::time::timeout(
        Duration::from_secs(10),
        async { tokio::join!(syncer.run(shutdown), driver) },
    )
    .await
    .expect("watch loop did not stop");
    result.unwrap();

    let text = read(&path);
    assert!(text.contains("10.0.0.5 svc-a"));
    assert!(text.contains("10.0.0.6 svc-b"));
}

#[tokio::test]
async fn watch_loop_continue_policy_survives_outage() {
    let dir = tempfile::tempdir().unwrap();
    let path = hosts_file(dir.path());
    let cluster = Arc::new(FakeCluster::default().with_service("svc-a", Some("10.0.0.5")));
    cluster.set_down(true);

    let config = SyncConfig::new("^svc-")
        .with_hosts_file(&path)
        .with_watch(Duration::from_millis(20))
        .with_failure_policy(FailurePolicy::Continue);
    let syncer = Syncer::new(config, Arc::clone(&cluster)).unwrap();

    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    let driver = async {
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(read(&path), BASE);
        cluster.set_down(false);
        for _ in 0..100 {
            if read(&path).contains("svc-a") {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tx.send(()).unwrap();
    };

    let (result, ()) = tokio::time::timeout(
        Duration::from_secs(10),
        async {
            tokio::join!(
                syncer.run(async {
                    let _ = rx.await;
                }),
                driver
            )
        },
    )
    .await
    .expect("watch loop did not stop");
    result.unwrap();

    assert!(read(&path).contains("10.0.0.5 svc-a"));
}

#[tokio::test]
async fn watch_loop_aborts_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let path = hosts_file(dir.path());
    let cluster = Arc::new(FakeCluster::default());
    cluster.set_down(true);

    let config = SyncConfig::new(".")
        .with_hosts_file(&path)
        .with_watch(Duration::from_millis(20));
    let syncer = Syncer::new(config, Arc::clone(&cluster)).unwrap();

    let err = tokio::time::timeout(Duration::from_secs(5), syncer.run(std::future::pending()))
        .await
        .expect("loop should abort on the first failure")
        .unwrap_err();
    assert!(matches!(err, SyncError::SourceUnavailable { .. }));
    assert_eq!(read(&path), BASE);
}

#[test]
fn watch_with_stdout_is_rejected() {
    let cluster = Arc::new(FakeCluster::default());
    let err = Syncer::new(
        SyncConfig::new(".")
            .with_output(OutputTarget::Stdout)
            .with_watch(Duration::from_secs(1)),
        Arc::clone(&cluster),
    )
    .unwrap_err();
    assert!(err.is_config_error());
}
