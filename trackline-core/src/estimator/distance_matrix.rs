//! [`DistanceEstimator`] backed by a Distance Matrix style HTTP API.

use async_trait::async_trait;
use serde::Deserialize;
use std::{fmt, time::Duration};
use tracing::{debug, warn};
use url::Url;

use super::{DistanceEstimator, RouteEstimate};
use crate::{error::EstimationError, types::Coordinate};

pub struct DistanceMatrixClient {
    http: reqwest::Client,
    api_url: Url,
    api_key: Option<String>,
}

impl fmt::Debug for DistanceMatrixClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DistanceMatrixClient")
            .field("api_url", &self.api_url.as_str())
            .field("api_key_configured", &self.api_key.is_some())
            .finish()
    }
}

impl DistanceMatrixClient {
    /// `timeout` bounds the whole request, connect through body.
    pub fn new(
        api_url: Url,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, EstimationError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| EstimationError::Unavailable(err.to_string()))?;

        Ok(Self {
            http,
            api_url,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
        })
    }

    fn request_url(&self, origin: Coordinate, destination: Coordinate) -> Url {
        let mut url = self.api_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("origins", &origin.to_string());
            query.append_pair("destinations", &destination.to_string());
            if let Some(key) = &self.api_key {
                query.append_pair("key", key);
            }
        }
        url
    }
}

#[async_trait]
impl DistanceEstimator for DistanceMatrixClient {
    async fn estimate(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> Result<RouteEstimate, EstimationError> {
        let url = self.request_url(origin, destination);

        // Errors carry the request URL, which includes the API key.
        let response = self
            .http
            .get(url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|err| {
                warn!(error = %err.without_url(), "distance lookup failed");
                unavailable("distance lookup failed")
            })?;

        let body: DistanceMatrixResponse =
            response.json().await.map_err(|err| {
                warn!(
                    error = %err.without_url(),
                    "distance lookup returned an unreadable body"
                );
                unavailable("unreadable distance response")
            })?;

        let estimate = body.into_estimate()?;
        debug!(
            %origin,
            %destination,
            distance_m = estimate.distance_meters,
            duration = %estimate.duration_text,
            status = ?estimate.status,
            "distance lookup completed"
        );
        Ok(estimate)
    }
}

#[derive(Debug, Deserialize)]
struct DistanceMatrixResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    rows: Vec<MatrixRow>,
}

#[derive(Debug, Deserialize)]
struct MatrixRow {
    #[serde(default)]
    elements: Vec<MatrixElement>,
}

#[derive(Debug, Deserialize)]
struct MatrixElement {
    status: String,
    distance: Option<Measure>,
    duration: Option<Measure>,
}

#[derive(Debug, Deserialize)]
struct Measure {
    text: String,
    value: f64,
}

impl DistanceMatrixResponse {
    fn into_estimate(self) -> Result<RouteEstimate, EstimationError> {
        if let Some(status) = self.status.as_deref()
            && status != "OK"
        {
            return Err(EstimationError::Unavailable(format!(
                "provider returned status {status}"
            )));
        }

        let element = self
            .rows
            .into_iter()
            .next()
            .and_then(|row| row.elements.into_iter().next())
            .ok_or_else(|| unavailable("response carried no elements"))?;

        match element.status.as_str() {
            "OK" => {
                let (Some(distance), Some(duration)) =
                    (element.distance, element.duration)
                else {
                    return Err(EstimationError::Unavailable(
                        "element is missing distance or duration".to_string(),
                    ));
                };
                let meters = if distance.value.is_finite()
                    && distance.value > 0.0
                {
                    distance.value.round() as u64
                } else {
                    0
                };
                debug!(distance = %distance.text, "parsed matrix element");
                Ok(RouteEstimate::ok(meters, duration.text))
            }
            "ZERO_RESULTS" | "NOT_FOUND" => Ok(RouteEstimate::zero_results()),
            other => Err(EstimationError::Unavailable(format!(
                "element returned status {other}"
            ))),
        }
    }
}

fn unavailable(reason: &str) -> EstimationError {
    EstimationError::Unavailable(reason.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::RouteStatus;

    fn parse(raw: &str) -> Result<RouteEstimate, EstimationError> {
        serde_json::from_str::<DistanceMatrixResponse>(raw)
            .unwrap()
            .into_estimate()
    }

    #[test]
    fn ok_element_yields_distance_and_duration() {
        let estimate = parse(
            r#"{
                "status": "OK",
                "rows": [{"elements": [{
                    "status": "OK",
                    "distance": {"text": "50 m", "value": 50},
                    "duration": {"text": "1 min", "value": 42}
                }]}]
            }"#,
        )
        .unwrap();
        assert_eq!(estimate, RouteEstimate::ok(50, "1 min"));
    }

    #[test]
    fn zero_results_is_a_successful_lookup() {
        let body = r#"{"status":"OK","rows":[
            {"elements":[{"status":"ZERO_RESULTS"}]}
        ]}"#;
        let estimate = parse(body).unwrap();
        assert_eq!(estimate.status, RouteStatus::ZeroResults);
    }

    #[test]
    fn provider_level_failure_is_unavailable() {
        let err =
            parse(r#"{"status":"OVER_QUERY_LIMIT","rows":[]}"#).unwrap_err();
        assert!(matches!(err, EstimationError::Unavailable(_)));

        let err = parse(r#"{"status":"OK","rows":[]}"#).unwrap_err();
        assert!(matches!(err, EstimationError::Unavailable(_)));
    }

    #[test]
    fn request_url_carries_pairs_and_key() {
        let client = DistanceMatrixClient::new(
            Url::parse("https://maps.example/distancematrix/json").unwrap(),
            Some("k3y".into()),
            Duration::from_secs(1),
        )
        .unwrap();
        let url = client
            .request_url(Coordinate::new(6.5, 3.3), Coordinate::new(6.6, 3.4));
        let pairs: Vec<(String, String)> =
            url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("origins".into(), "6.5,3.3".into()),
                ("destinations".into(), "6.6,3.4".into()),
                ("key".into(), "k3y".into()),
            ]
        );
        assert!(!format!("{client:?}").contains("k3y"));
    }
}
