// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lock key derivation
//!
//! Arguments are canonicalised (object keys sorted at every depth, compact
//! scalars) before hashing, so structurally equal argument lists always map to
//! the same key. Keys render as `prefix:class:digest`.

use crate::config::ConfigError;
use crate::job::JobIdentity;
use crate::strategy::LockScope;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::sync::Arc;

/// Caller-supplied digest over canonical argument bytes
pub type DigestFn = Arc<dyn Fn(&[u8]) -> String + Send + Sync>;

/// Hash applied to canonical arguments
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DigestMethod {
    /// First 128 bits of SHA-256, 32 hex chars
    #[default]
    TruncatedSha256,
    /// Full SHA-256, 64 hex chars
    Sha256,
    Custom(DigestFn),
}

impl DigestMethod {
    pub fn custom(f: impl Fn(&[u8]) -> String + Send + Sync + 'static) -> Self {
        DigestMethod::Custom(Arc::new(f))
    }

    pub fn name(&self) -> &'static str {
        match self {
            DigestMethod::TruncatedSha256 => "sha256-128",
            DigestMethod::Sha256 => "sha256",
            DigestMethod::Custom(_) => "custom",
        }
    }

    pub fn hash(&self, input: &[u8]) -> String {
        match self {
            DigestMethod::TruncatedSha256 => to_hex(&Sha256::digest(input)[..16]),
            DigestMethod::Sha256 => to_hex(&Sha256::digest(input)),
            DigestMethod::Custom(f) => f(input),
        }
    }
}

impl std::fmt::Debug for DigestMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<String> for DigestMethod {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "sha256-128" => Ok(DigestMethod::TruncatedSha256),
            "sha256" => Ok(DigestMethod::Sha256),
            _ => Err(ConfigError::UnknownDigest(value)),
        }
    }
}

impl From<DigestMethod> for String {
    fn from(method: DigestMethod) -> Self {
        method.name().to_string()
    }
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}

/// Stable textual form of an argument list
pub fn canonical_arguments(arguments: &[Value]) -> String {
    let mut out = String::new();
    write_array(arguments, &mut out);
    out
}

fn write_array(items: &[Value], out: &mut String) {
    out.push('[');
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        write_value(item, out);
    }
    out.push(']');
}

fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Array(items) => write_array(items, out),
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_value(item, out);
            }
            out.push('}');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Lock identity of a job at the lock nodes
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LockKey {
    pub prefix: String,
    pub class: String,
    pub digest: String,
}

impl LockKey {
    /// Node key for the given scope; runtime locks live beside the enqueue lock
    pub fn for_scope(&self, scope: LockScope) -> String {
        match scope {
            LockScope::Enqueue => self.to_string(),
            LockScope::Runtime => format!("{self}:runtime"),
        }
    }

    /// Prefix shared by every key of a job class
    pub fn class_pattern(prefix: &str, class: &str) -> String {
        format!("{prefix}:{class}:")
    }
}

impl std::fmt::Display for LockKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.prefix, self.class, self.digest)
    }
}

/// Maps job identities to lock keys
#[derive(Clone, Debug)]
pub struct KeyDigester {
    prefix: String,
    method: DigestMethod,
}

impl KeyDigester {
    pub fn new(prefix: impl Into<String>, method: DigestMethod) -> Self {
        Self {
            prefix: prefix.into(),
            method,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn digest_arguments(&self, arguments: &[Value]) -> String {
        self.method.hash(canonical_arguments(arguments).as_bytes())
    }

    pub fn digest(&self, job: &JobIdentity) -> LockKey {
        LockKey {
            prefix: self.prefix.clone(),
            class: job.class.clone(),
            digest: self.digest_arguments(&job.arguments),
        }
    }
}

#[cfg(test)]
#[path = "digest_tests.rs"]
mod tests;
