// ABOUTME: Integration tests for the SSH module that need no server.
// ABOUTME: Covers connection failures and credential handling in session settings.

mod support;

use std::time::Duration;
use tandem::ssh::{Error, Session, SessionConfig};

/// Test: Connecting to a closed port fails with a connection error.
#[tokio::test]
async fn connect_to_closed_port_fails() {
    support::init_tracing();
    let config = SessionConfig::new("127.0.0.1", "root")
        .port(1)
        .password("not-used");

    let result = Session::connect(config).await;

    assert!(
        matches!(result, Err(Error::Connection(_))),
        "expected connection error"
    );
}

/// Test: Connection errors do not echo the password.
#[tokio::test]
async fn connection_error_does_not_leak_password() {
    let config = SessionConfig::new("127.0.0.1", "root")
        .port(1)
        .password("hunter2-secret");

    let Err(err) = Session::connect(config).await else {
        panic!("connection should fail");
    };

    assert!(!err.to_string().contains("hunter2-secret"));
}

#[test]
fn builder_sets_transport_options() {
    let config = SessionConfig::new("example.com", "deploy")
        .port(2222)
        .keepalive_interval(Duration::from_secs(10))
        .command_timeout(Duration::from_secs(60))
        .trust_on_first_use(true)
        .key_path("/home/deploy/.ssh/id_ed25519");

    assert_eq!(config.port, 2222);
    assert_eq!(config.keepalive_interval, Duration::from_secs(10));
    assert_eq!(config.command_timeout, Some(Duration::from_secs(60)));
    assert!(config.trust_on_first_use);
    assert!(config.key_path.is_some());
}
