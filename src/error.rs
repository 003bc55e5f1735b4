use thiserror::Error;

/// Main error type for the Frame-Scout library
#[derive(Error, Debug)]
pub enum ScoutError {
    #[error("Video error: {0}")]
    Video(#[from] VideoError),

    #[error("Target image error: {0}")]
    Target(#[from] TargetError),

    #[error("Media engine error: {0}")]
    Media(#[from] MediaError),

    #[error("Marker generation error: {0}")]
    Marker(#[from] MarkerError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Generic error: {0}")]
    Generic(String),
}

/// Video decoding errors
#[derive(Error, Debug)]
pub enum VideoError {
    #[error("Failed to open video file: {path}")]
    OpenFailed { path: String },

    #[error("Failed to probe video properties of {path}: {reason}")]
    ProbeFailed { path: String, reason: String },

    #[error("Video decoding failed: {reason}")]
    DecodingFailed { reason: String },

    #[error("Invalid video properties: {details}")]
    InvalidProperties { details: String },
}

/// Target image errors
#[derive(Error, Debug)]
pub enum TargetError {
    #[error("Failed to load target image {path}: {reason}")]
    LoadFailed { path: String, reason: String },
}

/// Errors raised while talking to the external media engine
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Failed to spawn {program}: {reason}")]
    SpawnFailed { program: String, reason: String },

    #[error("{program} exited with an error: {stderr}")]
    CommandFailed { program: String, stderr: String },

    #[error("Failed to write frame data: {reason}")]
    WriteFailed { reason: String },
}

/// Marker pipeline errors
#[derive(Error, Debug)]
pub enum MarkerError {
    #[error("Invalid marker request: {details}")]
    InvalidRequest { details: String },

    #[error("{stage} stage failed: {reason}")]
    StageFailed { stage: String, reason: String },
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration file: {path}")]
    ParseFailed { path: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },
}

/// Convenience type alias for Results using ScoutError
pub type Result<T> = std::result::Result<T, ScoutError>;

impl ScoutError {
    /// Create a generic error with a custom message
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into())
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Video(VideoError::OpenFailed { path }) => format!(
                "Could not open video file '{}'. \
                 Please check the file exists and is a supported format.",
                path
            ),
            Self::Target(TargetError::LoadFailed { path, .. }) => format!(
                "Could not load target image '{}'. \
                 Please check the file exists and is a PNG, JPEG or BMP image.",
                path
            ),
            Self::Media(MediaError::SpawnFailed { program, .. }) => format!(
                "Could not run '{}'. \
                 Please install FFmpeg or set the path under [tools] in the configuration.",
                program
            ),
            Self::Config(ConfigError::FileNotFound { path }) => {
                format!("Configuration file '{}' not found.", path)
            }
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_for_missing_tool() {
        let err: ScoutError = MediaError::SpawnFailed {
            program: "ffmpeg".to_string(),
            reason: "not found".to_string(),
        }
        .into();

        assert!(err.user_message().contains("install FFmpeg"));
    }

    #[test]
    fn test_user_message_falls_back_to_display() {
        let err = ScoutError::generic("something odd");
        assert_eq!(err.user_message(), "Generic error: something odd");
    }
}
