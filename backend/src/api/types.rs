//! REST API types.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::models::Record;
use crate::transform::pipeline::{ReshapeOutput, SourceInfo};
use crate::transform::SetupReport;

/// Response of `POST /api/reshape/preview`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResponse {
    /// Unique job identifier
    pub job_id: String,

    /// Status: "ready", "warning" (records dropped), "empty"
    pub status: String,

    pub records: Vec<Record>,

    pub metadata: PreviewMetadata,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewMetadata {
    pub total_records: usize,
    pub dropped_records: usize,
    pub setups: Vec<SetupReport>,
    pub source: SourceInfo,
}

impl From<ReshapeOutput> for PreviewResponse {
    fn from(output: ReshapeOutput) -> Self {
        let dropped = output.dropped_count();
        let status = if output.table.is_empty() {
            "empty"
        } else if dropped > 0 {
            "warning"
        } else {
            "ready"
        };

        PreviewResponse {
            job_id: Uuid::new_v4().to_string(),
            status: status.to_string(),
            metadata: PreviewMetadata {
                total_records: output.table.len(),
                dropped_records: dropped,
                setups: output.setups,
                source: output.source,
            },
            records: output.table.records,
        }
    }
}

/// Response of the library listing and search endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryResponse {
    pub count: usize,
    pub columns: Vec<String>,
    pub chemicals: Vec<Map<String, Value>>,
}

impl LibraryResponse {
    pub fn new(columns: Vec<String>, chemicals: Vec<Map<String, Value>>) -> Self {
        Self {
            count: chemicals.len(),
            columns,
            chemicals,
        }
    }
}

/// Query string of `GET /api/library/search`.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

/// Create an error response
pub fn error_response(error: &str) -> Value {
    json!({
        "jobId": Uuid::new_v4().to_string(),
        "status": "error",
        "error": error,
        "records": [],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReshapeConfig;
    use crate::transform::pipeline::process_bytes;

    #[test]
    fn test_error_response_shape() {
        let body = error_response("Expected at least 8 columns");
        assert_eq!(body["status"], "error");
        assert_eq!(body["error"], "Expected at least 8 columns");
        assert!(body["records"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_preview_from_output() {
        let csv = "t\nn\nV,I\n0.1,1.0\n0.2,\n";
        let config = ReshapeConfig {
            setups: vec!["bare".into()],
            ..ReshapeConfig::default()
        };
        let output = process_bytes(csv.as_bytes(), None, &config).unwrap();
        let response = PreviewResponse::from(output);

        assert_eq!(response.status, "warning");
        assert_eq!(response.metadata.total_records, 1);
        assert_eq!(response.metadata.dropped_records, 1);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["records"][0]["setup"], "bare");
        assert_eq!(json["metadata"]["source"]["rowCount"], 2);
        assert_eq!(json["metadata"]["setups"][0]["droppedRows"][0], 1);
    }

    #[test]
    fn test_library_response_count() {
        let response = LibraryResponse::new(vec!["Chemical_Name".into()], vec![Map::new(), Map::new()]);
        assert_eq!(response.count, 2);
    }
}
