/*!
# Latency DevKit - Outils de test du pipeline de latence

Bibliothèque facilitant les tests du pipeline et du kernel avec:
- Source amont simulée (réponses scriptées, réponses retenues, journal des appels)
- Builders de payloads conformes aux formats Radar / Postman / Globalping
- Harness de test (logs, attente de conditions)
*/

pub mod mock_source;
pub mod payloads;
pub mod test_utils;

pub use mock_source::{MockSource, ResponseGate};
pub use payloads::{PostmanPayload, PostmanRun, RadarPayload};
pub use test_utils::TestHarness;
