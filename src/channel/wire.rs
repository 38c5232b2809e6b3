// src/channel/wire.rs
//! Private channel frames
//!
//! Frames are compact JSON objects with numeric discriminants:
//!
//! ```text
//! {"t":201,"h":"alice"}              SYNC    untrusted -> trusted
//! {"t":202,"h":"alice","f":"🇩🇪"}    UPDATE  trusted -> untrusted
//! {"t":204,"h":"alice"}              RETRY   trusted -> untrusted
//! ```

use crate::utils::errors::{EngineError, Result};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

const SYNC: u16 = 201;
const UPDATE: u16 = 202;
const RETRY: u16 = 204;

/// Protocol message carried over the private channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireMessage {
    Sync { handle: String },
    Update { handle: String, flag: String },
    Retry { handle: String },
}

#[derive(Serialize, Deserialize)]
struct Frame {
    t: u16,
    h: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    f: Option<String>,
}

impl WireMessage {
    pub fn handle(&self) -> &str {
        match self {
            WireMessage::Sync { handle }
            | WireMessage::Update { handle, .. }
            | WireMessage::Retry { handle } => handle,
        }
    }

    pub fn encode(&self) -> Result<Bytes> {
        let frame = match self {
            WireMessage::Sync { handle } => Frame {
                t: SYNC,
                h: handle.clone(),
                f: None,
            },
            WireMessage::Update { handle, flag } => Frame {
                t: UPDATE,
                h: handle.clone(),
                f: Some(flag.clone()),
            },
            WireMessage::Retry { handle } => Frame {
                t: RETRY,
                h: handle.clone(),
                f: None,
            },
        };
        Ok(Bytes::from(serde_json::to_vec(&frame)?))
    }

    pub fn decode(raw: &[u8]) -> Result<Self> {
        let frame: Frame = serde_json::from_slice(raw)
            .map_err(|e| EngineError::ParseFailure(format!("bad frame: {}", e)))?;
        match (frame.t, frame.f) {
            (SYNC, _) => Ok(WireMessage::Sync { handle: frame.h }),
            (UPDATE, Some(flag)) => Ok(WireMessage::Update {
                handle: frame.h,
                flag,
            }),
            (UPDATE, None) => Err(EngineError::ParseFailure(
                "update frame without flag".to_string(),
            )),
            (RETRY, _) => Ok(WireMessage::Retry { handle: frame.h }),
            (other, _) => Err(EngineError::ParseFailure(format!(
                "unknown discriminant {}",
                other
            ))),
        }
    }
}
