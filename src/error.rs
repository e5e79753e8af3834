pub type ReelResult<T> = Result<T, ReelError>;

#[derive(thiserror::Error, Debug)]
pub enum ReelError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("compile error: {0}")]
    Compile(String),

    #[error("failed to spawn renderer: {0}")]
    Spawn(String),

    #[error("renderer exited with code {code:?}: {detail}")]
    Exit { code: Option<i32>, detail: String },

    #[error("render timed out after {timeout_ms}ms")]
    TimedOut { timeout_ms: u64 },

    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ReelError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn compile(msg: impl Into<String>) -> Self {
        Self::Compile(msg.into())
    }

    pub fn spawn(msg: impl Into<String>) -> Self {
        Self::Spawn(msg.into())
    }

    pub fn exit(code: Option<i32>, detail: impl Into<String>) -> Self {
        Self::Exit {
            code,
            detail: detail.into(),
        }
    }

    pub fn checkpoint(msg: impl Into<String>) -> Self {
        Self::Checkpoint(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(ReelError::validation("x")
            .to_string()
            .contains("validation error:"));
        assert!(ReelError::compile("x")
            .to_string()
            .contains("compile error:"));
        assert!(ReelError::spawn("x")
            .to_string()
            .contains("failed to spawn"));
        assert!(ReelError::checkpoint("x")
            .to_string()
            .contains("checkpoint error:"));
    }

    #[test]
    fn exit_carries_the_code() {
        let err = ReelError::exit(Some(187), "boom");
        let s = err.to_string();
        assert!(s.contains("187"));
        assert!(s.contains("boom"));
    }

    #[test]
    fn timed_out_carries_the_deadline() {
        let err = ReelError::TimedOut { timeout_ms: 9000 };
        assert!(err.to_string().contains("9000ms"));
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = ReelError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
