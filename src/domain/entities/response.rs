use serde::Serialize;

/// Envelope shared by every JSON response: `{success, data?, message?, error?}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            message: None,
            error: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn failure_with_data(error: &str, message: impl Into<String>, data: T) -> Self {
        ApiResponse {
            success: false,
            data: Some(data),
            message: Some(message.into()),
            error: Some(error.to_string()),
        }
    }
}

impl ApiResponse<()> {
    pub fn failure(error: &str, message: impl Into<String>) -> Self {
        ApiResponse {
            success: false,
            data: None,
            message: Some(message.into()),
            error: Some(error.to_string()),
        }
    }
}
