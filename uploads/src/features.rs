//! Centralized feature flags for the upload pipeline.
//!
//! Call sites consult a single `Features` set attached to `UploadConfig`
//! instead of threading individual booleans around.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::collections::BTreeSet;

/// Lifecycle stage for a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Experimental,
    Beta,
    Stable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Feature {
    /// Send bytes straight to object storage via presigned requests instead of
    /// posting them to the upload endpoint.
    DirectUploads,
    /// Run registered pre-submit processors (client-side resize and friends).
    UploadProcessors,
}

impl Feature {
    pub fn key(self) -> &'static str {
        self.info().key
    }

    pub fn stage(self) -> Stage {
        self.info().stage
    }

    pub fn default_enabled(self) -> bool {
        self.info().default_enabled
    }

    fn info(self) -> &'static FeatureSpec {
        FEATURES
            .iter()
            .find(|spec| spec.id == self)
            .unwrap_or_else(|| unreachable!("missing FeatureSpec for {self:?}"))
    }
}

/// The effective set of enabled features.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Features {
    enabled: BTreeSet<Feature>,
}

impl Features {
    pub fn with_defaults() -> Self {
        let enabled = FEATURES
            .iter()
            .filter(|spec| spec.default_enabled)
            .map(|spec| spec.id)
            .collect();
        Self { enabled }
    }

    pub fn enabled(&self, f: Feature) -> bool {
        self.enabled.contains(&f)
    }

    pub fn enable(&mut self, f: Feature) {
        self.enabled.insert(f);
    }

    pub fn disable(&mut self, f: Feature) {
        self.enabled.remove(&f);
    }

    /// Apply `key -> bool` toggles from a `[features]` table. Unknown keys are
    /// logged and ignored.
    pub fn apply_map(&mut self, m: &BTreeMap<String, bool>) {
        for (k, v) in m {
            match feature_for_key(k) {
                Some(feat) if *v => self.enable(feat),
                Some(feat) => self.disable(feat),
                None => tracing::warn!("unknown feature key in config: {k}"),
            }
        }
    }
}

fn feature_for_key(key: &str) -> Option<Feature> {
    FEATURES
        .iter()
        .find(|spec| spec.key == key)
        .map(|spec| spec.id)
}

/// Deserializable `[features]` table.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct FeaturesToml {
    #[serde(flatten)]
    pub entries: BTreeMap<String, bool>,
}

#[derive(Debug, Clone, Copy)]
pub struct FeatureSpec {
    pub id: Feature,
    pub key: &'static str,
    pub stage: Stage,
    pub default_enabled: bool,
}

pub const FEATURES: &[FeatureSpec] = &[
    FeatureSpec {
        id: Feature::DirectUploads,
        key: "direct_uploads",
        stage: Stage::Beta,
        default_enabled: false,
    },
    FeatureSpec {
        id: Feature::UploadProcessors,
        key: "upload_processors",
        stage: Stage::Stable,
        default_enabled: true,
    },
];
