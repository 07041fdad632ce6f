// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Command results.

use crate::error::CmeError;

pub const OK: &str = "OK";
pub const ERROR: &str = "ERROR";

/// Final result code of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalResult {
    Ok,
    Error,
    /// Coded error; rendered as bare `ERROR` unless `+CMEE` is enabled.
    Cme(CmeError),
    /// No final result now; it is sent later by a timer or a phone event.
    Deferred,
}

impl FinalResult {
    /// Render the result code, or `None` for a deferred result.
    pub fn render(&self, extended_errors: bool) -> Option<String> {
        match self {
            FinalResult::Ok => Some(OK.to_string()),
            FinalResult::Error => Some(ERROR.to_string()),
            FinalResult::Cme(e) if extended_errors => Some(format!("+CME ERROR: {}", e.code())),
            FinalResult::Cme(_) => Some(ERROR.to_string()),
            FinalResult::Deferred => None,
        }
    }
}

/// Information lines plus the final result code of one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtResult {
    pub lines: Vec<String>,
    pub status: FinalResult,
}

impl AtResult {
    pub fn ok() -> Self {
        Self::status(FinalResult::Ok)
    }

    pub fn error() -> Self {
        Self::status(FinalResult::Error)
    }

    pub fn cme(error: CmeError) -> Self {
        Self::status(FinalResult::Cme(error))
    }

    pub fn deferred() -> Self {
        Self::status(FinalResult::Deferred)
    }

    /// One information line followed by `OK`.
    pub fn line(line: impl Into<String>) -> Self {
        Self {
            lines: vec![line.into()],
            status: FinalResult::Ok,
        }
    }

    /// Several information lines followed by `OK`.
    pub fn lines(lines: Vec<String>) -> Self {
        Self {
            lines,
            status: FinalResult::Ok,
        }
    }

    fn status(status: FinalResult) -> Self {
        Self {
            lines: Vec::new(),
            status,
        }
    }
}

impl From<Result<AtResult, CmeError>> for AtResult {
    fn from(result: Result<AtResult, CmeError>) -> Self {
        result.unwrap_or_else(AtResult::cme)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_cme() {
        let status = FinalResult::Cme(CmeError::InvalidIndex);
        assert_eq!(status.render(true).as_deref(), Some("+CME ERROR: 21"));
        assert_eq!(status.render(false).as_deref(), Some("ERROR"));
    }

    #[test]
    fn test_render_deferred() {
        assert_eq!(FinalResult::Deferred.render(true), None);
        assert_eq!(FinalResult::Ok.render(false).as_deref(), Some("OK"));
    }

    #[test]
    fn test_from_result() {
        let result: AtResult = Err(CmeError::SimFailure).into();
        assert_eq!(result.status, FinalResult::Cme(CmeError::SimFailure));
        assert!(result.lines.is_empty());
    }
}
