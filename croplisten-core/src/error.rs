use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Platform API error: {0}")]
    PlatformApi(#[from] PlatformApiError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Sentiment error: {0}")]
    Sentiment(#[from] SentimentError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

#[derive(Error, Debug, Clone)]
pub enum PlatformApiError {
    #[error("Authentication failed for {platform}: {reason}")]
    AuthenticationFailed { platform: String, reason: String },

    #[error("Access token expired for {platform}")]
    AuthExpired { platform: String },

    #[error("Rate limit exceeded on {platform}. Retry after {retry_after} seconds")]
    RateLimitExceeded { platform: String, retry_after: u64 },

    #[error("Request timeout")]
    RequestTimeout,

    #[error("Server error: {status_code}")]
    ServerError { status_code: u16 },

    #[error("Resource temporarily unavailable: {endpoint}")]
    EndpointUnavailable { endpoint: String },

    #[error("Invalid API response: {details}")]
    InvalidResponse { details: String },

    #[error("Fetch failed permanently after {attempts} attempts: {details}")]
    RetriesExhausted { attempts: u32, details: String },
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Connection failed: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Malformed record {post_id}: {details}")]
    MalformedRecord { post_id: String, details: String },

    #[error("Bulk insert failed: {details}")]
    BulkInsertFailed { details: String },

    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum SentimentError {
    #[error("Classifier unavailable: {details}")]
    ClassifierUnavailable { details: String },

    #[error("Inference failed: {details}")]
    InferenceFailed { details: String },

    #[error("Invalid probability vector: {details}")]
    InvalidProbabilities { details: String },

    #[error("No content to analyse")]
    EmptyInput,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Environment variable not set: {var_name}")]
    MissingEnvironmentVariable { var_name: String },

    #[error("Configuration parsing error: {0}")]
    Parse(#[from] toml::de::Error),
}

impl PlatformApiError {
    /// Whether retrying the same call can succeed without intervention.
    pub fn is_retryable(&self) -> bool {
        match self {
            PlatformApiError::RateLimitExceeded { .. } => true,
            PlatformApiError::ServerError { .. } => true,
            PlatformApiError::RequestTimeout => true,
            PlatformApiError::EndpointUnavailable { .. } => true,
            PlatformApiError::AuthExpired { .. } => false,
            PlatformApiError::AuthenticationFailed { .. } => false,
            PlatformApiError::InvalidResponse { .. } => false,
            PlatformApiError::RetriesExhausted { .. } => false,
        }
    }
}
