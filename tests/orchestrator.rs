// ABOUTME: End-to-end tests of a deployment run against a fake host.
// ABOUTME: Covers stage order, fail-fast behavior, tolerated checks, session teardown, and the proxy validation gate.

mod support;

use parking_lot::Mutex;
use std::path::Path;
use std::time::Duration;
use support::fake_remote::FakeRemote;
use support::write_tree;
use tandem::config::RestartPolicy;
use tandem::deploy::{
    BuildStep, Dependency, DeployErrorKind, DeployPlan, Deployment, HealthPolicy, ProxyRoute,
    ServiceSpec, Stage, run,
};
use tandem::diagnostics::{Diagnostics, WarningKind};
use tandem::output::{Output, OutputMode};
use tandem::remote::{OutputSink, OutputStream, Remote};
use tandem::sync::ExclusionRules;
use tandem::types::ServiceName;

fn service(name: &str, dir: &str, exec: &str) -> ServiceSpec {
    ServiceSpec {
        name: ServiceName::new(name).unwrap(),
        description: name.to_string(),
        user: "root".to_string(),
        working_dir: format!("/opt/kai/{}", dir),
        exec: exec.to_string(),
        restart: RestartPolicy::Always,
        env: vec![("PORT".to_string(), "3005".to_string())],
    }
}

fn plan(local_root: &Path) -> DeployPlan {
    DeployPlan {
        local_root: local_root.to_path_buf(),
        remote_root: "/opt/kai".to_string(),
        exclude: ExclusionRules::new(["node_modules", ".next"], ["task.md"]),
        dependencies: vec![Dependency::new(
            "node",
            "node --version",
            ["apt-get install -y nodejs"],
        )],
        builds: vec![
            BuildStep {
                name: "web".to_string(),
                dir: "web".to_string(),
                clean: Some(".next".to_string()),
                install: Some("npm install".to_string()),
                build: "npm run build".to_string(),
            },
            BuildStep {
                name: "worker".to_string(),
                dir: "worker".to_string(),
                clean: None,
                install: None,
                build: "cargo build --release".to_string(),
            },
        ],
        services: vec![
            service("kai-web", "web", "/usr/bin/npm start"),
            service("kai-worker", "worker", "/opt/kai/worker/target/release/worker"),
        ],
        proxy: Some(ProxyRoute::new("kai", 80, 3005)),
        health: HealthPolicy::once(Some(3005)),
    }
}

fn source_tree() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_tree(
        dir.path(),
        &[
            ("web/package.json", "{}"),
            ("web/node_modules/react/index.js", ""),
            ("worker/Cargo.toml", "[package]"),
            ("task.md", "notes"),
        ],
    );
    dir
}

fn healthy_host() -> FakeRemote {
    let remote = FakeRemote::new();
    remote.respond("systemctl is-active", 0, "active\n");
    remote.respond(
        "ss -tlnp",
        0,
        "LISTEN 0 511 *:3005 *:* users:((\"node\",pid=42,fd=20))\n",
    );
    remote
}

#[tokio::test]
async fn full_run_executes_stages_in_order() {
    support::init_tracing();
    let tree = source_tree();
    let plan = plan(tree.path());
    let remote = healthy_host();
    let output = Output::new(OutputMode::Quiet);
    let mut diag = Diagnostics::default();

    let summary = run(&remote, &plan, &output, &mut diag).await.unwrap();

    assert!(summary.report.passed());
    assert!(!diag.has_warnings());
    assert_eq!(
        summary.manifest.display_paths(),
        ["web/", "web/package.json", "worker/", "worker/Cargo.toml"]
    );

    let upload = remote.position("write: /opt/kai/web/package.json").unwrap();
    let check = remote.position("exec: node --version").unwrap();
    let clean = remote
        .position("exec: cd /opt/kai/web && rm -rf .next")
        .unwrap();
    let npm_install = remote.position("exec: cd /opt/kai/web && npm install").unwrap();
    let npm_build = remote
        .position("exec: cd /opt/kai/web && npm run build")
        .unwrap();
    let cargo = remote
        .position("exec: cd /opt/kai/worker && cargo build --release")
        .unwrap();
    let unit = remote
        .position("write: /etc/systemd/system/kai-web.service")
        .unwrap();
    let reload = remote.position("exec: systemctl daemon-reload").unwrap();
    let enable = remote
        .position("exec: systemctl enable kai-web.service kai-worker.service")
        .unwrap();
    let site = remote
        .position("write: /etc/nginx/sites-available/kai")
        .unwrap();
    let nginx_check = remote.position("exec: nginx -t").unwrap();
    let nginx_reload = remote
        .position("exec: systemctl reload-or-restart nginx")
        .unwrap();
    let restart = remote
        .position("exec: systemctl restart kai-web.service kai-worker.service")
        .unwrap();
    let active = remote
        .position("exec: systemctl is-active kai-web.service")
        .unwrap();

    let order = [
        upload,
        check,
        clean,
        npm_install,
        npm_build,
        cargo,
        unit,
        reload,
        enable,
        site,
        nginx_check,
        nginx_reload,
        restart,
        active,
    ];
    assert!(
        order.windows(2).all(|w| w[0] < w[1]),
        "operations out of order: {:?}",
        remote.operations()
    );
    // node was present, so no install.
    assert!(remote.position("exec: apt-get install -y nodejs").is_none());
    assert!(remote.is_closed());
    assert_eq!(remote.operations().last().map(String::as_str), Some("close"));
}

#[tokio::test]
async fn failed_build_stops_all_later_stages() {
    let tree = source_tree();
    let plan = plan(tree.path());
    let remote = healthy_host();
    remote.respond_err("npm run build", 1, "Type error: x is not assignable");
    let output = Output::new(OutputMode::Quiet);
    let mut diag = Diagnostics::default();

    let err = run(&remote, &plan, &output, &mut diag).await.unwrap_err();

    assert_eq!(err.stage(), Stage::Build);
    assert_eq!(err.kind(), DeployErrorKind::Command);
    assert_eq!(err.cause().command(), Some("cd /opt/kai/web && npm run build"));
    assert!(err.to_string().contains("Type error"));

    let commands = remote.commands();
    assert_eq!(
        commands.last().map(String::as_str),
        Some("cd /opt/kai/web && npm run build")
    );
    assert!(!commands.iter().any(|c| c.contains("cargo build")));
    assert!(!commands.iter().any(|c| c.starts_with("systemctl")));
    assert!(
        remote
            .file("/etc/systemd/system/kai-web.service")
            .is_none()
    );
    assert!(remote.is_closed());
}

#[tokio::test]
async fn warnings_before_a_fatal_error_are_kept() {
    let tree = source_tree();
    let plan = plan(tree.path());
    let remote = healthy_host();
    remote.respond("node --version", 127, "");
    remote.respond_err("npm run build", 1, "Type error: x is not assignable");
    let output = Output::new(OutputMode::Quiet);
    let mut diag = Diagnostics::default();

    let err = run(&remote, &plan, &output, &mut diag).await.unwrap_err();

    assert_eq!(err.stage(), Stage::Build);
    let tolerated: Vec<&str> = diag
        .warnings()
        .iter()
        .filter(|w| w.kind == WarningKind::ToleratedFailure)
        .map(|w| w.message.as_str())
        .collect();
    assert_eq!(tolerated.len(), 1);
    assert!(tolerated[0].contains("node --version"));
    assert!(remote.is_closed());
}

#[tokio::test]
async fn failed_upload_stops_before_provisioning() {
    let plan = plan(Path::new("/nonexistent/tandem-source"));
    let remote = healthy_host();
    let output = Output::new(OutputMode::Quiet);
    let mut diag = Diagnostics::default();

    let err = run(&remote, &plan, &output, &mut diag).await.unwrap_err();

    assert_eq!(err.stage(), Stage::Synchronize);
    assert_eq!(err.kind(), DeployErrorKind::Upload);
    assert!(remote.commands().is_empty());
    assert!(remote.is_closed());
}

#[tokio::test]
async fn broken_session_is_fatal_even_for_tolerant_checks() {
    let tree = source_tree();
    let plan = plan(tree.path());
    let remote = healthy_host();
    remote.break_on("node --version");
    let output = Output::new(OutputMode::Quiet);
    let mut diag = Diagnostics::default();

    let err = run(&remote, &plan, &output, &mut diag).await.unwrap_err();

    assert_eq!(err.stage(), Stage::Provision);
    assert_eq!(err.kind(), DeployErrorKind::Transport);
    assert!(!remote.commands().iter().any(|c| c.contains("npm")));
}

#[tokio::test]
async fn tolerated_check_failure_does_not_stop_run() {
    let tree = source_tree();
    let plan = plan(tree.path());
    let remote = healthy_host();
    remote.respond("node --version", 127, "");
    let output = Output::new(OutputMode::Quiet);
    let mut diag = Diagnostics::default();

    let summary = run(&remote, &plan, &output, &mut diag).await.unwrap();

    assert!(remote.position("exec: apt-get install -y nodejs").is_some());
    assert!(remote.position("exec: cd /opt/kai/web && npm run build").is_some());
    let tolerated: Vec<_> = diag
        .warnings()
        .iter()
        .filter(|w| w.kind == WarningKind::ToleratedFailure)
        .collect();
    assert_eq!(tolerated.len(), 1);
    assert!(tolerated[0].message.contains("node --version"));
}

#[tokio::test]
async fn rejected_proxy_config_is_not_reloaded() {
    let tree = source_tree();
    let plan = plan(tree.path());
    let remote = healthy_host();
    remote.respond_err(
        "nginx -t",
        1,
        "nginx: [emerg] unknown directive \"proxy_pas\"",
    );
    let output = Output::new(OutputMode::Quiet);
    let mut diag = Diagnostics::default();

    let err = run(&remote, &plan, &output, &mut diag).await.unwrap_err();

    assert_eq!(err.stage(), Stage::InstallServices);
    assert_eq!(err.kind(), DeployErrorKind::Validation);
    assert!(err.to_string().contains("unknown directive"));
    assert!(remote.position("exec: systemctl reload-or-restart nginx").is_none());
    assert!(!remote.commands().iter().any(|c| c.starts_with("systemctl restart")));

    // A first install leaves no site behind once the check fails.
    let check = remote.position("exec: nginx -t").unwrap();
    let restore = remote
        .position(
            "exec: if [ -e /etc/nginx/sites-available/kai.previous ]; then \
             mv -f /etc/nginx/sites-available/kai.previous /etc/nginx/sites-available/kai; \
             else rm -f /etc/nginx/sites-available/kai; fi",
        )
        .unwrap();
    let unlink = remote
        .position("exec: rm -f /etc/nginx/sites-enabled/kai")
        .unwrap();
    assert!(check < restore && restore < unlink);
    assert!(remote.is_closed());
}

#[tokio::test]
async fn unhealthy_services_are_reported_not_fatal() {
    let tree = source_tree();
    let mut plan = plan(tree.path());
    plan.health = HealthPolicy {
        port: Some(3005),
        attempts: 2,
        interval: Duration::from_millis(1),
    };
    let remote = FakeRemote::new();
    remote.respond("systemctl is-active kai-web", 3, "failed\n");
    remote.respond("systemctl is-active kai-worker", 0, "active\n");
    remote.respond("ss -tlnp", 1, "");
    let output = Output::new(OutputMode::Quiet);
    let mut diag = Diagnostics::default();

    let summary = run(&remote, &plan, &output, &mut diag).await.unwrap();

    assert!(!summary.report.passed());
    assert_eq!(summary.report.attempts, 2);
    let unhealthy: Vec<&str> = diag
        .warnings()
        .iter()
        .filter(|w| w.kind == WarningKind::Unhealthy)
        .map(|w| w.message.as_str())
        .collect();
    assert_eq!(
        unhealthy,
        ["service kai-web is failed", "nothing is listening on port 3005"]
    );
}

#[tokio::test]
async fn health_retries_until_service_comes_up() {
    let tree = source_tree();
    let mut plan = plan(tree.path());
    plan.health = HealthPolicy {
        port: None,
        attempts: 5,
        interval: Duration::from_millis(1),
    };
    let remote = FakeRemote::new();
    remote.respond_once("systemctl is-active kai-web", 3, "activating\n");
    remote.respond("systemctl is-active", 0, "active\n");
    let output = Output::new(OutputMode::Quiet);
    let mut diag = Diagnostics::default();

    let summary = run(&remote, &plan, &output, &mut diag).await.unwrap();

    assert!(summary.report.passed());
    assert_eq!(summary.report.attempts, 2);
}

#[tokio::test]
async fn stages_can_be_driven_one_at_a_time() {
    let tree = source_tree();
    let plan = plan(tree.path());
    let remote = healthy_host();
    let output = Output::new(OutputMode::Quiet);

    let mut diag = Diagnostics::default();

    let deployment = Deployment::new(&plan, &remote, &output);
    let deployment = deployment.synchronize().await.unwrap();
    assert_eq!(deployment.manifest().files().count(), 2);
    assert!(deployment.history().is_empty());

    let deployment = deployment.provision().await.unwrap();
    assert_eq!(deployment.history().len(), 1);

    let summary = deployment
        .build()
        .await
        .unwrap()
        .install_services()
        .await
        .unwrap()
        .restart()
        .await
        .unwrap()
        .health_check()
        .await
        .unwrap()
        .finish(&mut diag);
    assert_eq!(summary.provisioned.len(), 1);
    assert!(summary.report.passed());
    assert!(!diag.has_warnings());
    // Driving stages by hand leaves the session open.
    assert!(!remote.is_closed());
}

#[derive(Default)]
struct Recorder {
    chunks: Mutex<Vec<(OutputStream, String)>>,
}

impl OutputSink for Recorder {
    fn chunk(&self, stream: OutputStream, data: &[u8]) {
        self.chunks
            .lock()
            .push((stream, String::from_utf8_lossy(data).into_owned()));
    }
}

#[tokio::test]
async fn every_command_streams_its_output() {
    let tree = source_tree();
    let plan = plan(tree.path());
    let remote = healthy_host();
    let output = Output::new(OutputMode::Quiet);
    let mut diag = Diagnostics::default();

    run(&remote, &plan, &output, &mut diag).await.unwrap();

    let commands = remote.commands();
    assert!(commands.contains(&"cd /opt/kai/web && npm run build".to_string()));
    assert_eq!(remote.streamed(), commands);
}

#[tokio::test]
async fn streamed_output_reaches_the_sink() {
    let remote = FakeRemote::new();
    remote.respond("npm run build", 0, "compiled 12 pages\n");
    remote.respond_err("cargo build", 0, "   Compiling worker v0.1.0\n");
    let sink = Recorder::default();

    let built = remote.exec_streaming("npm run build", &sink).await.unwrap();
    remote
        .exec_streaming("cargo build --release", &sink)
        .await
        .unwrap();

    assert_eq!(built.stdout, "compiled 12 pages\n");
    assert_eq!(
        *sink.chunks.lock(),
        [
            (OutputStream::Stdout, "compiled 12 pages\n".to_string()),
            (OutputStream::Stderr, "   Compiling worker v0.1.0\n".to_string()),
        ]
    );
}
