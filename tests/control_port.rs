//! Integration tests for Tor control port communication
//!
//! Runs against a scripted control-port server on localhost, so no Tor
//! daemon is needed.

use rustrotate::error::ControlChannelError;
use rustrotate::tor::{ControlChannel, ControlConfig, ControlPortRotator, IdentityRotator};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Accept one connection, answer like Tor, return the commands received
async fn fake_tor(accept_auth: bool) -> (u16, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read, mut write) = stream.into_split();
        let mut lines = BufReader::new(read).lines();
        let mut received = Vec::new();

        while let Ok(Some(line)) = lines.next_line().await {
            received.push(line.clone());
            let (reply, close) = match line.as_str() {
                cmd if cmd.starts_with("AUTHENTICATE") => {
                    if accept_auth {
                        ("250 OK\r\n", false)
                    } else {
                        ("515 Authentication failed: Password did not match HashedControlPassword value from configuration\r\n", true)
                    }
                },
                "SIGNAL NEWNYM" => ("250 OK\r\n", false),
                "SIGNAL BOGUS" => ("552 Unrecognized signal code \"BOGUS\"\r\n", false),
                "GETINFO version" => ("250-version=0.4.8.10\r\n250 OK\r\n", false),
                "QUIT" => ("250 closing connection\r\n", true),
                _ => ("510 Unrecognized command\r\n", false),
            };
            write.write_all(reply.as_bytes()).await.unwrap();
            if close {
                break;
            }
        }
        received
    });

    (port, server)
}

fn config(port: u16, password: Option<&str>) -> ControlConfig {
    ControlConfig {
        host: "127.0.0.1".to_string(),
        port,
        password: password.map(str::to_string),
    }
}

#[tokio::test]
async fn test_newnym_with_password() {
    let (port, server) = fake_tor(true).await;

    ControlPortRotator::new(config(port, Some("s3cret")))
        .request_new_identity()
        .await
        .unwrap();

    let received = server.await.unwrap();
    assert_eq!(
        received,
        vec!["AUTHENTICATE 733363726574", "SIGNAL NEWNYM", "QUIT"]
    );
}

#[tokio::test]
async fn test_null_authentication() {
    let (port, server) = fake_tor(true).await;

    ControlPortRotator::new(config(port, None))
        .request_new_identity()
        .await
        .unwrap();

    let received = server.await.unwrap();
    assert_eq!(received[0], "AUTHENTICATE");
}

#[tokio::test]
async fn test_authentication_rejected() {
    let (port, server) = fake_tor(false).await;

    let err = ControlPortRotator::new(config(port, Some("wrong")))
        .request_new_identity()
        .await
        .unwrap_err();

    match err {
        ControlChannelError::AuthRejected(msg) => assert!(msg.starts_with("515")),
        other => panic!("unexpected error: {other}"),
    }
    // Nothing is sent after a rejected AUTHENTICATE
    assert_eq!(server.await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_connection_refused() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };

    let err = ControlPortRotator::new(config(port, None))
        .request_new_identity()
        .await
        .unwrap_err();
    assert!(matches!(err, ControlChannelError::Connect { .. }), "{err}");
}

#[tokio::test]
async fn test_get_info_and_rejected_command() {
    let (port, server) = fake_tor(true).await;

    let mut channel = ControlChannel::connect(&config(port, Some("pw")))
        .await
        .unwrap();
    assert_eq!(channel.get_info("version").await.unwrap(), "0.4.8.10");

    match channel.send_command("SIGNAL BOGUS\r\n").await.unwrap_err() {
        ControlChannelError::Rejected { code, message } => {
            assert_eq!(code, 552);
            assert!(message.contains("BOGUS"));
        },
        other => panic!("unexpected error: {other}"),
    }

    channel.quit().await.unwrap();
    assert_eq!(server.await.unwrap().last().map(String::as_str), Some("QUIT"));
}
