/*!
Builders de payloads amont

Produisent les enveloppes JSON telles que renvoyées par Cloudflare Radar
(série `serie_0` ou `pair`) et par l'API Postman Monitors. Les horodatages
sont déterministes : une série commence au 2024-05-01T00:00:00Z.
*/

use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};

/// 2024-05-01T00:00:00Z
const SERIES_EPOCH: i64 = 1_714_521_600;

pub struct RadarPayload;

impl RadarPayload {
    /// Horodatages ISO espacés de `step_minutes`
    pub fn timestamps(count: usize, step_minutes: i64) -> Vec<String> {
        let Some(start) = DateTime::<Utc>::from_timestamp(SERIES_EPOCH, 0) else {
            return Vec::new();
        };
        (0..count)
            .map(|i| {
                let ts = start + Duration::minutes(step_minutes * i as i64);
                ts.format("%Y-%m-%dT%H:%M:%SZ").to_string()
            })
            .collect()
    }

    /// Réponse de `/api/cloudfare-latency` ; valeurs en unités natives (secondes)
    pub fn latest(values: &[Option<f64>]) -> Value {
        json!({
            "success": true,
            "result": {
                "serie_0": {
                    "timestamps": Self::timestamps(values.len(), 15),
                    "values": values,
                }
            }
        })
    }

    /// Réponse de `/api/trend-chart`
    pub fn pair(values: &[Option<f64>]) -> Value {
        Self::pair_with(Self::timestamps(values.len(), 1), values)
    }

    pub fn pair_with(timestamps: Vec<String>, values: &[Option<f64>]) -> Value {
        json!({
            "success": true,
            "result": {
                "pair": {
                    "timestamps": timestamps,
                    "values": values,
                }
            }
        })
    }

    /// `timestamps` présents, `values` absent
    pub fn pair_without_values(count: usize) -> Value {
        json!({
            "success": true,
            "result": { "pair": { "timestamps": Self::timestamps(count, 1) } }
        })
    }

    pub fn pair_failure() -> Value {
        json!({
            "success": false,
            "errors": [{ "code": 10000, "message": "Authentication error" }]
        })
    }
}

/// Résultat d'exécution d'une requête d'un monitor Postman
pub struct PostmanRun<'a> {
    pub region: &'a str,
    pub request_name: &'a str,
    pub response_time: f64,
    pub code: u16,
}

pub struct PostmanPayload;

impl PostmanPayload {
    pub fn latest_run(results: &[PostmanRun<'_>]) -> Value {
        let run_results: Vec<Value> = results
            .iter()
            .map(|r| {
                json!({
                    "region": r.region,
                    "request_name": r.request_name,
                    "response_time": r.response_time,
                    "code": r.code,
                })
            })
            .collect();
        json!({ "monitor_run": [{ "id": "run-1", "run_results": run_results }] })
    }

    pub fn no_runs() -> Value {
        json!({ "monitor_run": [] })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamps_are_deterministic() {
        let ts = RadarPayload::timestamps(3, 15);
        assert_eq!(ts, vec!["2024-05-01T00:00:00Z", "2024-05-01T00:15:00Z", "2024-05-01T00:30:00Z"]);
    }

    #[test]
    fn test_pair_payload_shape() {
        let payload = RadarPayload::pair(&[Some(0.1), None]);
        assert_eq!(payload["result"]["pair"]["values"], json!([0.1, null]));
        assert_eq!(payload["result"]["pair"]["timestamps"].as_array().map(Vec::len), Some(2));

        let broken = RadarPayload::pair_without_values(2);
        assert!(broken["result"]["pair"].get("values").is_none());
    }

    #[test]
    fn test_postman_run() {
        let payload = PostmanPayload::latest_run(&[PostmanRun {
            region: "us-east",
            request_name: "GET ticker",
            response_time: 120.0,
            code: 200,
        }]);
        assert_eq!(payload["monitor_run"][0]["run_results"][0]["request_name"], "GET ticker");
    }
}
