//! User-visible notices
//!
//! Every user-facing failure surfaces as a notice. Transient notices
//! auto-dismiss; blocking ones stay until dismissed.

use serde::{Deserialize, Serialize};

pub const DEFAULT_NOTICE_MS: u32 = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Transient,
    Blocking,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub message: String,
    pub kind: NoticeKind,
    pub duration_ms: u32,
}

impl Notice {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: NoticeKind::Transient,
            duration_ms: DEFAULT_NOTICE_MS,
        }
    }

    pub fn blocking(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: NoticeKind::Blocking,
            duration_ms: 0,
        }
    }

    pub fn with_duration(mut self, duration_ms: u32) -> Self {
        if self.kind == NoticeKind::Transient {
            self.duration_ms = duration_ms;
        }
        self
    }

    pub fn is_blocking(&self) -> bool {
        self.kind == NoticeKind::Blocking
    }
}
