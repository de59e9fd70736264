use serde::{Deserialize, Serialize};

/// Success envelope returned by every JSON endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            message: None,
        }
    }

    pub fn ok_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    pub success: bool,
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.error.details = Some(details);
        self
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub service: String,
    pub version: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub checks: Vec<HealthCheck>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthCheck {
    pub name: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl HealthCheck {
    pub fn healthy(name: impl Into<String>) -> Self {
        Self { name: name.into(), status: HealthStatus::Healthy, message: None }
    }

    pub fn failing(name: impl Into<String>, status: HealthStatus, message: impl Into<String>) -> Self {
        Self { name: name.into(), status, message: Some(message.into()) }
    }
}

impl HealthResponse {
    pub fn healthy(service: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Healthy,
            service: service.into(),
            version: version.into(),
            checks: Vec::new(),
        }
    }

    /// Attaches dependency probes; the overall status is the worst one reported.
    pub fn with_checks(mut self, checks: Vec<HealthCheck>) -> Self {
        self.status = checks
            .iter()
            .map(|c| c.status)
            .max()
            .unwrap_or(HealthStatus::Healthy);
        self.checks = checks;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worst_check_wins() {
        let resp = HealthResponse::healthy("skealed-catalog", "0.1.0").with_checks(vec![
            HealthCheck::healthy("postgres"),
            HealthCheck::failing("redis", HealthStatus::Degraded, "timeout"),
        ]);
        assert_eq!(resp.status, HealthStatus::Degraded);

        let resp = HealthResponse::healthy("skealed-catalog", "0.1.0").with_checks(vec![
            HealthCheck::failing("redis", HealthStatus::Degraded, "timeout"),
            HealthCheck::failing("postgres", HealthStatus::Unhealthy, "refused"),
        ]);
        assert_eq!(resp.status, HealthStatus::Unhealthy);
    }

    #[test]
    fn no_checks_stays_healthy() {
        let resp = HealthResponse::healthy("skealed-auth", "0.1.0").with_checks(vec![]);
        assert_eq!(resp.status, HealthStatus::Healthy);

        let json = serde_json::to_value(&resp).unwrap();
        assert!(json.get("checks").is_none());
        assert_eq!(json["status"], "healthy");
    }

    #[test]
    fn message_is_optional_in_envelope() {
        let json = serde_json::to_value(ApiResponse::ok(3)).unwrap();
        assert!(json.get("message").is_none());

        let json = serde_json::to_value(ApiResponse::ok_with_message((), "Check your email for the magic link!")).unwrap();
        assert_eq!(json["message"], "Check your email for the magic link!");
    }
}
