// std
use std::fmt::{Display, Formatter};
// crates
use beacon_core::{Slot, GENESIS_SLOT};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
// internal

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct BlobsSidecarsByRangeRequest {
    pub start_slot: Slot,
    pub count: u64,
}

impl BlobsSidecarsByRangeRequest {
    pub fn new(start_slot: Slot, count: u64) -> Self {
        Self { start_slot, count }
    }

    /// Exclusive upper bound of the requested slots.
    pub fn end_slot(&self) -> Slot {
        self.start_slot + self.count
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.count < 1 {
            return Err("count < 1".to_string());
        }
        if self.start_slot < GENESIS_SLOT {
            return Err("start_slot < genesis".to_string());
        }
        Ok(())
    }
}

#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum RespStatus {
    Success = 0,
    InvalidRequest = 1,
    ServerError = 2,
    ResourceUnavailable = 3,
}

impl Display for RespStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Success => "success",
            Self::InvalidRequest => "invalid_request",
            Self::ServerError => "server_error",
            Self::ResourceUnavailable => "resource_unavailable",
        };
        write!(f, "{name}")
    }
}

/// One frame of a range response. Successful frames carry an already encoded
/// sidecar so the responder never decodes what it reads from the store.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum ResponseChunk {
    Success(Bytes),
    Error { status: RespStatus, message: String },
}

impl ResponseChunk {
    pub fn error(status: RespStatus, message: impl Into<String>) -> Self {
        Self::Error {
            status,
            message: message.into(),
        }
    }

    pub fn status(&self) -> RespStatus {
        match self {
            Self::Success(_) => RespStatus::Success,
            Self::Error { status, .. } => *status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_count_is_rejected() {
        assert!(BlobsSidecarsByRangeRequest::new(Slot::new(3), 0)
            .validate()
            .is_err());
        assert!(BlobsSidecarsByRangeRequest::new(Slot::new(3), 1)
            .validate()
            .is_ok());
    }

    #[test]
    fn end_slot_saturates() {
        let request = BlobsSidecarsByRangeRequest::new(Slot::new(u64::MAX - 1), 5);
        assert_eq!(request.end_slot(), Slot::new(u64::MAX));
    }

    #[test]
    fn status_codes() {
        assert_eq!(RespStatus::Success as u8, 0);
        assert_eq!(RespStatus::ResourceUnavailable as u8, 3);
        assert_eq!(
            ResponseChunk::error(RespStatus::ServerError, "boom").status(),
            RespStatus::ServerError
        );
    }
}
