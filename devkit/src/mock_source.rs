/*!
Source de latence simulée pour tests sans réseau

Remplace `HttpSource` dans le pipeline. Chaque appel consomme la prochaine
réponse scriptée ; une réponse peut être retenue jusqu'à ce que le test la
libère (pour simuler une requête lente). Tous les appels sont enregistrés.
*/

use latency_core::error::SourceError;
use latency_core::trends::TrendQuery;
use latency_core::upstream::LatencySource;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::oneshot;

type Response = Result<Value, SourceError>;

enum Scripted {
    Ready(Response),
    Held(oneshot::Receiver<Response>),
}

/// Libère une réponse retenue par `MockSource::hold_*`
pub struct ResponseGate {
    sender: oneshot::Sender<Response>,
}

impl ResponseGate {
    pub fn release(self, response: Response) {
        if self.sender.send(response).is_err() {
            log::warn!("[mock] held response released after the caller went away");
        }
    }
}

#[derive(Default)]
struct Script {
    latest: VecDeque<Scripted>,
    pair: VecDeque<Scripted>,
    latest_calls: usize,
    pair_queries: Vec<TrendQuery>,
}

/// Source scriptée ; clonable, les clones partagent le même script
#[derive(Clone, Default)]
pub struct MockSource {
    script: Arc<Mutex<Script>>,
}

fn lock(script: &Mutex<Script>) -> MutexGuard<'_, Script> {
    script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn unscripted(kind: &str) -> Response {
    Err(SourceError::Transport(format!("mock: no scripted {kind} response")))
}

async fn resolve(next: Option<Scripted>, kind: &str) -> Response {
    match next {
        Some(Scripted::Ready(response)) => response,
        Some(Scripted::Held(receiver)) => receiver
            .await
            .unwrap_or_else(|_| Err(SourceError::Transport("mock: gate dropped".into()))),
        None => unscripted(kind),
    }
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_latest(&self, response: Response) -> &Self {
        lock(&self.script).latest.push_back(Scripted::Ready(response));
        self
    }

    pub fn push_pair(&self, response: Response) -> &Self {
        lock(&self.script).pair.push_back(Scripted::Ready(response));
        self
    }

    /// Le prochain `fetch_latest` attendra `gate.release(..)`
    pub fn hold_latest(&self) -> ResponseGate {
        let (sender, receiver) = oneshot::channel();
        lock(&self.script).latest.push_back(Scripted::Held(receiver));
        ResponseGate { sender }
    }

    /// Le prochain `fetch_pair` attendra `gate.release(..)`
    pub fn hold_pair(&self) -> ResponseGate {
        let (sender, receiver) = oneshot::channel();
        lock(&self.script).pair.push_back(Scripted::Held(receiver));
        ResponseGate { sender }
    }

    pub fn latest_calls(&self) -> usize {
        lock(&self.script).latest_calls
    }

    pub fn pair_queries(&self) -> Vec<TrendQuery> {
        lock(&self.script).pair_queries.clone()
    }

    pub fn pending_latest(&self) -> usize {
        lock(&self.script).latest.len()
    }
}

impl LatencySource for MockSource {
    async fn fetch_latest(&self) -> Result<Value, SourceError> {
        let next = {
            let mut script = lock(&self.script);
            script.latest_calls += 1;
            script.latest.pop_front()
        };
        log::debug!("[mock] fetch_latest");
        resolve(next, "latest").await
    }

    async fn fetch_pair(&self, query: TrendQuery) -> Result<Value, SourceError> {
        let next = {
            let mut script = lock(&self.script);
            log::debug!("[mock] fetch_pair {} -> {}", query.src_asn, query.dst_asn);
            script.pair_queries.push(query);
            script.pair.pop_front()
        };
        resolve(next, "pair").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payloads::RadarPayload;

    fn query() -> TrendQuery {
        TrendQuery {
            src_asn: 13335,
            dst_asn: 16509,
            date_start: "2024-05-01T00:00:00Z".into(),
            date_end: "2024-05-01T00:15:00Z".into(),
            agg_interval: "1m",
        }
    }

    #[tokio::test]
    async fn test_scripted_responses_in_order() {
        let source = MockSource::new();
        source
            .push_latest(Ok(RadarPayload::latest(&[Some(0.1)])))
            .push_latest(Err(SourceError::Status { status: 502, body: "bad gateway".into() }));

        assert!(source.fetch_latest().await.is_ok());
        assert!(matches!(source.fetch_latest().await, Err(SourceError::Status { status: 502, .. })));
        assert!(matches!(source.fetch_latest().await, Err(SourceError::Transport(_))));
        assert_eq!(source.latest_calls(), 3);
    }

    #[tokio::test]
    async fn test_held_response_waits_for_release() {
        let source = MockSource::new();
        let gate = source.hold_pair();

        let pending = tokio::spawn({
            let source = source.clone();
            async move { source.fetch_pair(query()).await }
        });
        tokio::task::yield_now().await;
        assert!(!pending.is_finished());

        gate.release(Ok(RadarPayload::pair_failure()));
        let response = pending.await.unwrap().unwrap();
        assert_eq!(response["success"], false);
        assert_eq!(source.pair_queries(), vec![query()]);
    }
}
