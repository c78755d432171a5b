//! Deployment-specific classifier signatures.
//!
//! The vat and object ids that identify the timer service and the bundle
//! installer differ between chains, so they are configuration rather than
//! literals. Defaults match mainnet. A TOML file may override any subset:
//!
//! ```toml
//! [timer]
//! vat_id = "v5"
//! target = "ko296"
//!
//! [bundle]
//! vat_id = "v2"
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Signature of a timer wake delivery.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct TimerSignature {
    /// Vat hosting the timer service.
    pub vat_id: String,
    /// Kernel object the wake message targets.
    pub target: String,
    /// Token that must appear in the message body.
    pub method_token: String,
}

impl Default for TimerSignature {
    fn default() -> Self {
        Self {
            vat_id: "v5".into(),
            target: "ko296".into(),
            method_token: "wake".into(),
        }
    }
}

/// Signature of a bundle-installed notification.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct BundleSignature {
    /// Vat receiving the notification.
    pub vat_id: String,
    /// Token that must appear in the message body.
    pub body_marker: String,
}

impl Default for BundleSignature {
    fn default() -> Self {
        Self {
            vat_id: "v2".into(),
            body_marker: "bundleInstalled".into(),
        }
    }
}

/// All knobs the classifier reads.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ClassifierConfig {
    /// Timer wake signature.
    pub timer: TimerSignature,
    /// Bundle-installed signature.
    pub bundle: BundleSignature,
}

impl ClassifierConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(src: &str) -> Result<Self> {
        toml::from_str(src).context("parse classifier config toml")
    }

    /// Read and parse a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let src = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        Self::from_toml_str(&src).with_context(|| format!("in {}", path.display()))
    }
}
