//! Process exit codes.

/// Exit status reported by the `cdkw` binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    Success = 0,
    /// Any fatal error: missing manifest, failed synth, failed resolution.
    GeneralError = 1,
}

impl ExitCode {
    pub fn description(self) -> &'static str {
        match self {
            ExitCode::Success => "success",
            ExitCode::GeneralError => "general error",
        }
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code as u8)
    }
}
