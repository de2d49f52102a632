use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct Meta {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub total: Option<i64>,
}

impl Meta {
    pub fn new(page: i64, per_page: i64, total: i64) -> Self {
        Self {
            page: Some(page),
            per_page: Some(per_page),
            total: Some(total),
        }
    }

    pub fn empty() -> Self {
        Self {
            page: None,
            per_page: None,
            total: None,
        }
    }
}

/// Every endpoint, success or failure, answers with this envelope. `code`
/// only appears on errors that carry a machine-readable discriminator
/// (e.g. `EMAIL_NOT_VERIFIED`), so success payloads stay unchanged on the
/// wire.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
    pub data: Option<T>,
    pub meta: Option<Meta>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T, meta: Option<Meta>) -> Self {
        Self {
            message: message.into(),
            code: None,
            data: Some(data),
            meta,
        }
    }

    pub fn failure(message: impl Into<String>, code: Option<&'static str>, data: T) -> Self {
        Self {
            message: message.into(),
            code,
            data: Some(data),
            meta: Some(Meta::empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ApiResponse;

    #[test]
    fn code_is_omitted_from_success_payloads() {
        let body = serde_json::to_string(&ApiResponse::success("OK", 1, None)).unwrap();
        assert!(!body.contains("\"code\""));
    }

    #[test]
    fn failure_carries_the_code() {
        let body = serde_json::to_string(&ApiResponse::failure(
            "Please verify your email address",
            Some("EMAIL_NOT_VERIFIED"),
            serde_json::json!({}),
        ))
        .unwrap();
        assert!(body.contains("\"code\":\"EMAIL_NOT_VERIFIED\""));
    }
}
