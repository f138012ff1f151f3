#![forbid(unsafe_code)]

use sz_core::ids::IdError;
use sz_storage::StoreError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ErrorCode {
    InvalidArgs,
    InvalidStep,
    InvalidSteps,
    InvalidDbCheck,
    InvalidMetaJson,
    InvalidMetaBase64,
    InvalidStepJson,
    InvalidStepBase64,
    RunNotFound,
    UnitNotFound,
    ProjectNotInitialized,
    MissingArtifact,
    EnvironmentError,
    GenerationError,
    ToolNotImplemented,
    StorageError,
    IoError,
}

impl ErrorCode {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::InvalidArgs => "invalid_args",
            Self::InvalidStep => "invalid_step",
            Self::InvalidSteps => "invalid_steps",
            Self::InvalidDbCheck => "invalid_db_check",
            Self::InvalidMetaJson => "invalid_meta_json",
            Self::InvalidMetaBase64 => "invalid_meta_base64",
            Self::InvalidStepJson => "invalid_step_json",
            Self::InvalidStepBase64 => "invalid_step_base64",
            Self::RunNotFound => "run_not_found",
            Self::UnitNotFound => "unit_not_found",
            Self::ProjectNotInitialized => "project_not_initialized",
            Self::MissingArtifact => "missing_artifact",
            Self::EnvironmentError => "environment_error",
            Self::GenerationError => "generation_error",
            Self::ToolNotImplemented => "tool_not_implemented",
            Self::StorageError => "storage_error",
            Self::IoError => "io_error",
        }
    }
}

/// Tool-level failure. Rendered into a `tools/call` result with `isError: true`,
/// never into a JSON-RPC error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct AppError {
    pub(crate) code: ErrorCode,
    pub(crate) message: String,
}

impl AppError {
    pub(crate) fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub(crate) fn invalid_args(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidArgs, message)
    }

    pub(crate) fn run_not_found(unit_id: &str, run_id: &str) -> Self {
        Self::new(
            ErrorCode::RunNotFound,
            format!("run not found: unit_id={unit_id} run_id={run_id}"),
        )
    }

    pub(crate) fn code(&self) -> &'static str {
        self.code.as_str()
    }

    /// Text shown to the calling agent: `ERROR: <message> (<code>)`.
    pub(crate) fn render(&self) -> String {
        format!("ERROR: {} ({})", self.message, self.code())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code(), self.message)
    }
}

impl std::error::Error for AppError {}

impl From<StoreError> for AppError {
    fn from(value: StoreError) -> Self {
        let code = match &value {
            StoreError::UnknownUnit { .. } => ErrorCode::UnitNotFound,
            StoreError::InvalidInput(_) => ErrorCode::InvalidArgs,
            StoreError::Io(_) => ErrorCode::IoError,
            StoreError::Sql(_) | StoreError::Json(_) => ErrorCode::StorageError,
        };
        Self::new(code, value.to_string())
    }
}

impl From<IdError> for AppError {
    fn from(value: IdError) -> Self {
        Self::new(ErrorCode::GenerationError, value.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::new(ErrorCode::IoError, format!("io: {value}"))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        Self::new(ErrorCode::IoError, format!("json: {value}"))
    }
}
