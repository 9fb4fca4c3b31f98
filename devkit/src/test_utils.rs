/*!
Test Harness pour le pipeline de latence

Facilite l'écriture de tests avec:
- Init des logs de test (env_logger, une seule fois)
- Catalogue de référence partagé
- Attente bornée d'une condition (compatible avec l'horloge tokio en pause)
*/

use crate::mock_source::MockSource;
use latency_core::models::Catalog;
use latency_core::reference;
use std::sync::Arc;
use std::time::Duration;

pub struct TestHarness {
    pub source: Arc<MockSource>,
    pub catalog: Arc<Catalog>,
}

impl TestHarness {
    pub fn new() -> Self {
        env_logger::builder().is_test(true).try_init().ok();

        Self {
            source: Arc::new(MockSource::new()),
            catalog: Arc::new(reference::catalog()),
        }
    }

    /// Interroge `condition` toutes les 10ms jusqu'à `timeout` ; `true` si elle est devenue vraie
    pub async fn wait_until<F>(&self, timeout: Duration, mut condition: F) -> bool
    where
        F: FnMut() -> bool,
    {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if condition() {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                log::warn!("⏰ condition not met within {:?}", timeout);
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
