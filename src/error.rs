//! Crate-wide error type.
//!
//! Errors carry a process exit code so the `svfit` binary can map them
//! directly onto its exit status:
//!
//! - `2`: configuration problems (unknown plugin, bad override, missing option)
//! - `3`: input problems (unreadable files, invalid candidates)
//! - `4`: fit problems that cannot be recorded on a solution

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(2, message)
    }

    pub fn input(message: impl Into<String>) -> Self {
        Self::new(3, message)
    }

    pub fn fit(message: impl Into<String>) -> Self {
        Self::new(4, message)
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_constructors_set_exit_codes() {
        assert_eq!(AppError::config("x").exit_code(), 2);
        assert_eq!(AppError::input("x").exit_code(), 3);
        assert_eq!(AppError::fit("x").exit_code(), 4);
        assert_eq!(AppError::fit("boom").to_string(), "boom");
    }
}
