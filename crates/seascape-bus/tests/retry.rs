//! Retry behaviour of the reliable transport against scripted sockets.

use async_trait::async_trait;
use seascape_bus::{
    Dialer, Endpoint, ReliableClient, RequestSocket, SessionStats, SocketError, TransportConfig,
    TransportError,
};
use seascape_types::{Params, Reply, Request};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// What the remote does with the n-th request (1-based).
#[derive(Clone, Copy)]
enum Answer {
    Silence,
    Ok,
    Fail,
    Broken,
    /// The send itself never completes.
    Stuck,
}

/// Dialer whose sockets share one send counter and one script.
struct ScriptedDialer {
    script: Arc<dyn Fn(u64) -> Answer + Send + Sync>,
    sends: Arc<AtomicU64>,
    dials: Arc<AtomicU64>,
}

impl ScriptedDialer {
    fn new(script: impl Fn(u64) -> Answer + Send + Sync + 'static) -> Self {
        Self {
            script: Arc::new(script),
            sends: Arc::new(AtomicU64::new(0)),
            dials: Arc::new(AtomicU64::new(0)),
        }
    }
}

struct ScriptedSocket {
    script: Arc<dyn Fn(u64) -> Answer + Send + Sync>,
    sends: Arc<AtomicU64>,
    current: u64,
}

#[async_trait]
impl Dialer for ScriptedDialer {
    async fn dial(&self, _endpoint: &Endpoint) -> Result<Box<dyn RequestSocket>, SocketError> {
        self.dials.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedSocket {
            script: Arc::clone(&self.script),
            sends: Arc::clone(&self.sends),
            current: 0,
        }))
    }
}

#[async_trait]
impl RequestSocket for ScriptedSocket {
    async fn send(&mut self, _frame: Vec<u8>) -> Result<(), SocketError> {
        self.current = self.sends.fetch_add(1, Ordering::SeqCst) + 1;
        if let Answer::Stuck = (self.script)(self.current) {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn recv(&mut self) -> Result<Vec<u8>, SocketError> {
        match (self.script)(self.current) {
            Answer::Silence => std::future::pending().await,
            Answer::Ok => Ok(Reply::ok(Params::new().with("attempt", self.current))
                .encode()
                .unwrap()),
            Answer::Fail => Ok(Reply::fail("boom").encode().unwrap()),
            Answer::Broken => Err(SocketError::Io("connection reset".into())),
            Answer::Stuck => unreachable!("stuck sends never complete"),
        }
    }
}

fn endpoint() -> Endpoint {
    Endpoint::new("indexer", "scripted", 4000)
}

fn fast() -> TransportConfig {
    TransportConfig::default()
        .with_request_timeout(Duration::from_millis(20))
        .with_reconnect_delay(Duration::from_millis(5))
}

#[tokio::test]
async fn test_success_on_nth_attempt() {
    const N: u64 = 4;
    let dialer = ScriptedDialer::new(|n| if n < N { Answer::Silence } else { Answer::Ok });
    let sends = Arc::clone(&dialer.sends);
    let dials = Arc::clone(&dialer.dials);

    let mut client = ReliableClient::new(endpoint(), Arc::new(dialer), fast());
    let params = client.request(&Request::new("ping")).await.unwrap();

    assert_eq!(params.get_u64("attempt").unwrap(), N);
    assert_eq!(sends.load(Ordering::SeqCst), N);
    assert_eq!(dials.load(Ordering::SeqCst), N);
    assert_eq!(
        client.stats(),
        SessionStats {
            sends: N,
            reconnects: N - 1,
            dials: N
        }
    );
}

#[tokio::test]
async fn test_fail_reply_is_not_retried() {
    let dialer = ScriptedDialer::new(|_| Answer::Fail);
    let sends = Arc::clone(&dialer.sends);

    let mut client = ReliableClient::new(endpoint(), Arc::new(dialer), fast());
    let err = client.request(&Request::new("ping")).await.unwrap_err();

    assert_eq!(
        err,
        TransportError::Application {
            service: "indexer".into(),
            command: "ping".into(),
            message: "boom".into(),
        }
    );
    assert_eq!(sends.load(Ordering::SeqCst), 1);
    assert_eq!(client.stats().reconnects, 0);
}

#[tokio::test]
async fn test_io_error_is_treated_like_timeout() {
    let dialer = ScriptedDialer::new(|n| if n == 1 { Answer::Broken } else { Answer::Ok });

    let mut client = ReliableClient::new(endpoint(), Arc::new(dialer), fast());
    let params = client.request(&Request::new("ping")).await.unwrap();

    assert_eq!(params.get_u64("attempt").unwrap(), 2);
    assert_eq!(client.stats().sends, 2);
    assert_eq!(client.stats().reconnects, 1);
}

#[tokio::test]
async fn test_bounded_policy_gives_up() {
    let dialer = ScriptedDialer::new(|_| Answer::Silence);
    let sends = Arc::clone(&dialer.sends);

    let mut client =
        ReliableClient::new(endpoint(), Arc::new(dialer), fast().with_max_attempts(3));
    let err = client.request(&Request::new("ping")).await.unwrap_err();

    assert!(matches!(err, TransportError::RetriesExhausted { attempts: 3, .. }));
    assert_eq!(sends.load(Ordering::SeqCst), 3);
    assert_eq!(client.stats().reconnects, 2);
}

#[tokio::test]
async fn test_client_is_reusable_after_retries() {
    let dialer = ScriptedDialer::new(|n| if n == 1 { Answer::Silence } else { Answer::Ok });

    let mut client = ReliableClient::new(endpoint(), Arc::new(dialer), fast());
    client.request(&Request::new("ping")).await.unwrap();
    client.request(&Request::new("ping")).await.unwrap();

    // The second call reuses the socket from the first call's retry
    assert_eq!(
        client.stats(),
        SessionStats {
            sends: 3,
            reconnects: 1,
            dials: 2
        }
    );
}

#[tokio::test]
async fn test_stuck_send_is_bounded_and_retried() {
    let dialer = ScriptedDialer::new(|n| if n == 1 { Answer::Stuck } else { Answer::Ok });

    let mut client = ReliableClient::new(endpoint(), Arc::new(dialer), fast());
    let params = tokio::time::timeout(Duration::from_secs(2), client.request(&Request::new("ping")))
        .await
        .expect("send was never bounded")
        .unwrap();

    assert_eq!(params.get_u64("attempt").unwrap(), 2);
    assert_eq!(
        client.stats(),
        SessionStats {
            sends: 2,
            reconnects: 1,
            dials: 2
        }
    );
}
