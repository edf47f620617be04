use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),

    /// The continuation for `method` was dropped without an answer, e.g. the
    /// surface was destroyed while an authorization was pending.
    #[error("Call to '{method}' was abandoned before a response was delivered")]
    Abandoned { method: String },
}

pub type Result<T> = std::result::Result<T, CoreError>;
