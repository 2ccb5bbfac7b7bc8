// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job identity and the per-instance envelope handed to lifecycle hooks

use crate::strategy::JobLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What makes two jobs "the same job": class plus ordered arguments
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobIdentity {
    pub class: String,
    pub arguments: Vec<Value>,
}

impl JobIdentity {
    pub fn new(class: impl Into<String>, arguments: Vec<Value>) -> Self {
        Self {
            class: class.into(),
            arguments,
        }
    }
}

impl std::fmt::Display for JobIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.class, Value::Array(self.arguments.clone()))
    }
}

/// A job instance as seen by the uniqueness hooks
///
/// `lock` is persisted with the job payload by the framework so the worker
/// that executes the job can release the lock taken at enqueue time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Job {
    pub identity: JobIdentity,
    #[serde(default)]
    pub lock: JobLock,
}

impl Job {
    pub fn new(class: impl Into<String>, arguments: Vec<Value>) -> Self {
        Self {
            identity: JobIdentity::new(class, arguments),
            lock: JobLock::default(),
        }
    }

    pub fn class(&self) -> &str {
        &self.identity.class
    }
}
