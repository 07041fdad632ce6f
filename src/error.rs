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

//! Mobile equipment error codes reported through `+CME ERROR`.

use thiserror::Error;

/// Extended error taxonomy from 3GPP TS 27.007, section 9.2.
///
/// The discriminant is the numeric code sent to the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CmeError {
    #[error("phone failure")]
    PhoneFailure = 0,
    #[error("no connection to phone")]
    NoConnection = 1,
    #[error("operation not allowed")]
    OperationNotAllowed = 3,
    #[error("operation not supported")]
    OperationNotSupported = 4,
    #[error("SIM not inserted")]
    SimNotInserted = 10,
    #[error("SIM failure")]
    SimFailure = 13,
    #[error("SIM busy")]
    SimBusy = 14,
    #[error("memory full")]
    MemoryFull = 20,
    #[error("invalid index")]
    InvalidIndex = 21,
    #[error("not found")]
    NotFound = 22,
    #[error("memory failure")]
    MemoryFailure = 23,
    #[error("text string too long")]
    TextStringTooLong = 24,
    #[error("invalid characters in text string")]
    InvalidTextCharacters = 25,
    #[error("dial string too long")]
    DialStringTooLong = 26,
    #[error("invalid characters in dial string")]
    InvalidDialCharacters = 27,
    #[error("no network service")]
    NoNetworkService = 30,
    #[error("network timeout")]
    NetworkTimeout = 31,
    #[error("incorrect parameters")]
    IncorrectParameters = 50,
}

impl CmeError {
    /// Numeric code as it appears on the wire.
    pub fn code(self) -> u8 {
        self as u8
    }
}
