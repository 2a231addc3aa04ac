//! End-to-end rotation tests
//!
//! Real `/bin/sleep` processes stand in for the daemons; a scripted
//! control port and a plain HTTP proxy stand in for Tor and the echo
//! endpoint. Runs in real time.

#![cfg(unix)]

use rustrotate::config::ProbeConfig;
use rustrotate::probe::{HttpFetcher, IdentityProbe, RetryPolicy};
use rustrotate::scheduler::{ControllerOptions, Phase, RotationEvent, Rotator};
use rustrotate::state::{IntervalSpec, RotationState, TimeUnit};
use rustrotate::supervisor::system_proxy::NoSystemProxy;
use rustrotate::supervisor::{DaemonSpec, ProcessSupervisor};
use rustrotate::tor::{ControlConfig, ControlPortRotator};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::time::sleep;

const ADDRESS: &str = "198.51.100.7";

/// Control port that accepts any password and counts NEWNYM signals
async fn fake_control_port(newnyms: Arc<AtomicUsize>) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let newnyms = Arc::clone(&newnyms);
            tokio::spawn(async move {
                let (read, mut write) = stream.into_split();
                let mut lines = BufReader::new(read).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if line == "SIGNAL NEWNYM" {
                        newnyms.fetch_add(1, Ordering::SeqCst);
                    }
                    if line == "QUIT" {
                        let _ = write.write_all(b"250 closing connection\r\n").await;
                        break;
                    }
                    if write.write_all(b"250 OK\r\n").await.is_err() {
                        break;
                    }
                }
            });
        }
    });

    port
}

/// HTTP proxy that answers every request with a fixed address
async fn fake_proxy(requests: Arc<AtomicUsize>) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let requests = Arc::clone(&requests);
            tokio::spawn(async move {
                let (read, mut write) = stream.into_split();
                let mut lines = BufReader::new(read).lines();
                // Request head ends with an empty line
                while let Ok(Some(line)) = lines.next_line().await {
                    if line.is_empty() {
                        break;
                    }
                }
                requests.fetch_add(1, Ordering::SeqCst);
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    ADDRESS.len(),
                    ADDRESS
                );
                let _ = write.write_all(response.as_bytes()).await;
            });
        }
    });

    port
}

fn sleeper(name: &str) -> DaemonSpec {
    DaemonSpec {
        name: name.to_string(),
        executable: PathBuf::from("/bin/sleep"),
        args: vec!["60".to_string()],
        config_path: None,
    }
}

struct Setup {
    rotator: Rotator,
    supervisor: Arc<ProcessSupervisor>,
    newnyms: Arc<AtomicUsize>,
    probes: Arc<AtomicUsize>,
}

async fn setup(interval: IntervalSpec, rotate_on_start: bool) -> Setup {
    let newnyms = Arc::new(AtomicUsize::new(0));
    let probes = Arc::new(AtomicUsize::new(0));
    let control_port = fake_control_port(Arc::clone(&newnyms)).await;
    let proxy_port = fake_proxy(Arc::clone(&probes)).await;
    let proxy_endpoint = format!("127.0.0.1:{}", proxy_port);

    let supervisor = Arc::new(ProcessSupervisor::new(
        sleeper("tor"),
        sleeper("proxy"),
        proxy_endpoint.clone(),
        Box::new(NoSystemProxy),
        Duration::from_secs(2),
        RotationState::new(true, interval),
    ));

    let rotator = ControlPortRotator::new(ControlConfig {
        host: "127.0.0.1".to_string(),
        port: control_port,
        password: Some("test-password".to_string()),
    });

    let probe_config = ProbeConfig {
        url: "http://ip.example.test/".to_string(),
        timeout_secs: 2,
        ..ProbeConfig::default()
    };
    let fetcher = HttpFetcher::via_proxy(&probe_config, &proxy_endpoint).unwrap();
    let probe = IdentityProbe::new(Arc::new(fetcher), RetryPolicy::from(&probe_config));

    let options = ControllerOptions {
        rotate_on_start,
        ..ControllerOptions::default()
    };
    let rotator = Rotator::spawn(
        Arc::clone(&supervisor),
        Arc::new(rotator),
        Arc::new(probe),
        options,
    );

    Setup {
        rotator,
        supervisor,
        newnyms,
        probes,
    }
}

#[tokio::test]
async fn test_rotation_after_interval() {
    let s = setup(IntervalSpec::new(2.0, TimeUnit::Seconds).unwrap(), false).await;
    let handle = s.rotator.handle();
    let mut events = handle.subscribe();

    sleep(Duration::from_millis(500)).await;
    assert!(s.supervisor.is_primary_running().await);
    assert!(s.supervisor.is_secondary_running().await);
    assert_eq!(s.newnyms.load(Ordering::SeqCst), 0);

    let result = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Ok(RotationEvent::AddressUpdated(result)) = events.recv().await {
                return result;
            }
        }
    })
    .await
    .unwrap();

    assert_eq!(result.address.as_deref(), Some(ADDRESS));
    assert_eq!(s.newnyms.load(Ordering::SeqCst), 1);
    assert_eq!(s.probes.load(Ordering::SeqCst), 1);
    assert!(matches!(handle.phase(), Phase::Waiting { .. }));
    assert_eq!(handle.snapshot().await.last_address.as_deref(), Some(ADDRESS));

    s.rotator.shutdown().await.unwrap();
    assert!(!s.supervisor.is_primary_running().await);
    assert!(!s.supervisor.is_secondary_running().await);
}

#[tokio::test]
async fn test_disable_stops_daemons() {
    let s = setup(IntervalSpec::new(1.0, TimeUnit::Hours).unwrap(), false).await;
    let handle = s.rotator.handle();

    sleep(Duration::from_millis(300)).await;
    assert!(s.supervisor.is_primary_running().await);

    handle.set_enabled(false).await;
    sleep(Duration::from_secs(1)).await;
    assert_eq!(handle.phase(), Phase::Disabled);
    assert!(!s.supervisor.is_primary_running().await);
    assert!(!s.supervisor.is_secondary_running().await);

    handle.set_enabled(true).await;
    sleep(Duration::from_millis(500)).await;
    assert!(s.supervisor.is_primary_running().await);
    assert!(s.supervisor.is_secondary_running().await);
    assert_eq!(s.newnyms.load(Ordering::SeqCst), 0);

    s.rotator.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_rotate_on_start_and_manual() {
    let s = setup(IntervalSpec::new(1.0, TimeUnit::Hours).unwrap(), true).await;
    let handle = s.rotator.handle();

    sleep(Duration::from_millis(800)).await;
    assert_eq!(s.newnyms.load(Ordering::SeqCst), 1);

    handle.rotate_now();
    sleep(Duration::from_millis(800)).await;
    assert_eq!(s.newnyms.load(Ordering::SeqCst), 2);
    assert_eq!(handle.snapshot().await.rotations, 2);

    s.rotator.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_repeated_shutdown_is_safe() {
    let s = setup(IntervalSpec::new(1.0, TimeUnit::Hours).unwrap(), false).await;
    let handle = s.rotator.handle();
    sleep(Duration::from_millis(300)).await;

    handle.shutdown();
    s.rotator.shutdown().await.unwrap();
    s.supervisor.shutdown().await.unwrap();
    handle.shutdown();

    assert!(!s.supervisor.is_primary_running().await);
    // Starts after shutdown are refused
    s.supervisor.start_all().await.unwrap();
    assert!(!s.supervisor.is_secondary_running().await);
}
