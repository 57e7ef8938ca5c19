//! The generated watch manifest.
//!
//! Synthesis writes a JSON document mapping every watchable function's
//! logical construct path (for example `Api/Users/Handler`) to the data
//! needed to rebuild and redeploy it:
//!
//! ```json
//! {
//!   "region": "eu-west-1",
//!   "lambdas": {
//!     "Api/Users/Handler": {
//!       "assetPath": "asset.4f0c...",
//!       "esbuildOptions": { "entryPoints": ["/app/src/users.ts"], "bundle": true },
//!       "cdkwBuildOptions": { "preCompilation": false },
//!       "lambdaLogicalId": "UsersHandler1A2B3C",
//!       "rootStackName": "Api",
//!       "nestedStackLogicalIds": [],
//!       "nodeModulesLayerVersion": null
//!     }
//!   }
//! }
//! ```
//!
//! The manifest is loaded once per invocation and never mutated.

mod error;

pub use error::{ManifestError, ManifestResult};

use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::build::EsbuildOptions;

/// Build behavior that is specific to this tool rather than the bundler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CdkwBuildOptions {
    /// Run the type compiler and bundle its `.js` output instead of the sources.
    #[serde(default)]
    pub pre_compilation: bool,
}

/// One deployable function's build and runtime metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LambdaEntry {
    /// Synthesized code asset directory, relative to the manifest's directory.
    pub asset_path: PathBuf,
    #[serde(default)]
    pub esbuild_options: EsbuildOptions,
    #[serde(default)]
    pub cdkw_build_options: CdkwBuildOptions,
    pub lambda_logical_id: String,
    pub root_stack_name: String,
    /// Logical ids of nested stacks from the root stack down to the function's stack.
    #[serde(default)]
    pub nested_stack_logical_ids: Vec<String>,
    /// Version tag of the shared node_modules layer, when the function uses one.
    #[serde(default)]
    pub node_modules_layer_version: Option<String>,
}

impl LambdaEntry {
    pub fn pre_compilation(&self) -> bool {
        self.cdkw_build_options.pre_compilation
    }
}

/// Region plus every watchable function, keyed by logical path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub region: String,
    #[serde(default)]
    pub lambdas: IndexMap<String, LambdaEntry>,
    /// Directory the manifest was read from; asset paths resolve against it.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl Manifest {
    /// Read the manifest, failing when the file is absent.
    pub fn read(path: &Path) -> ManifestResult<Self> {
        if !path.exists() {
            return Err(ManifestError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut manifest: Manifest =
            serde_json::from_str(&content).map_err(|source| ManifestError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        manifest.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        crate::debug_event!(
            "manifest",
            "loaded",
            "{} functions in {}",
            manifest.lambdas.len(),
            manifest.region
        );

        Ok(manifest)
    }

    /// Keep only entries whose logical path matches `pattern`.
    ///
    /// `*` does not cross `/`, `**` spans any number of path segments. An
    /// empty result is returned as-is; callers decide whether that is fatal.
    pub fn filter(&self, pattern: &str) -> ManifestResult<Manifest> {
        let matcher = PathGlob::new(pattern)?;

        Ok(Manifest {
            region: self.region.clone(),
            lambdas: self
                .lambdas
                .iter()
                .filter(|(key, _)| matcher.matches(key))
                .map(|(key, entry)| (key.clone(), entry.clone()))
                .collect(),
            base_dir: self.base_dir.clone(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.lambdas.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lambdas.len()
    }

    /// Absolute-or-cwd-relative location of an entry's synthesized asset.
    pub fn asset_dir(&self, entry: &LambdaEntry) -> PathBuf {
        if entry.asset_path.is_absolute() {
            entry.asset_path.clone()
        } else {
            self.base_dir.join(&entry.asset_path)
        }
    }
}

/// Glob matcher over logical construct paths.
#[derive(Debug, Clone)]
pub struct PathGlob {
    pattern: Pattern,
}

impl PathGlob {
    const OPTIONS: MatchOptions = MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    };

    pub fn new(pattern: &str) -> ManifestResult<Self> {
        let pattern = Pattern::new(pattern).map_err(|e| ManifestError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.msg.to_string(),
        })?;
        Ok(Self { pattern })
    }

    pub fn matches(&self, logical_path: &str) -> bool {
        self.pattern.matches_with(logical_path, Self::OPTIONS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn entry(id: &str) -> LambdaEntry {
        LambdaEntry {
            asset_path: PathBuf::from(format!("asset.{id}")),
            esbuild_options: EsbuildOptions::default(),
            cdkw_build_options: CdkwBuildOptions::default(),
            lambda_logical_id: id.to_string(),
            root_stack_name: "Root".to_string(),
            nested_stack_logical_ids: Vec::new(),
            node_modules_layer_version: None,
        }
    }

    fn manifest(keys: &[&str]) -> Manifest {
        Manifest {
            region: "us-east-1".to_string(),
            lambdas: keys.iter().map(|k| (k.to_string(), entry(k))).collect(),
            base_dir: PathBuf::from("cdk.out"),
        }
    }

    #[test]
    fn missing_manifest_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let err = Manifest::read(&temp_dir.path().join("manifest.cdk-watch.json")).unwrap_err();
        assert!(matches!(err, ManifestError::NotFound { .. }));
        assert!(err.to_string().contains("was not found"));
    }

    #[test]
    fn reads_camel_case_manifest() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("manifest.cdk-watch.json");
        fs::write(
            &path,
            r#"{
                "region": "eu-west-1",
                "lambdas": {
                    "Api/Handler": {
                        "assetPath": "asset.abc",
                        "esbuildOptions": { "entryPoints": ["src/handler.ts"], "minify": false },
                        "cdkwBuildOptions": { "preCompilation": true },
                        "lambdaLogicalId": "Handler886CB40B",
                        "rootStackName": "Api",
                        "nestedStackLogicalIds": ["Nested1"],
                        "realTimeLogsApiLogicalId": null,
                        "nodeModulesLayerVersion": "deadbeef"
                    }
                }
            }"#,
        )
        .unwrap();

        let manifest = Manifest::read(&path).unwrap();
        assert_eq!(manifest.region, "eu-west-1");
        let entry = &manifest.lambdas["Api/Handler"];
        assert!(entry.pre_compilation());
        assert_eq!(entry.esbuild_options.minify, Some(false));
        assert_eq!(entry.nested_stack_logical_ids, vec!["Nested1".to_string()]);
        assert_eq!(entry.node_modules_layer_version.as_deref(), Some("deadbeef"));
        assert_eq!(
            manifest.asset_dir(entry),
            temp_dir.path().join("asset.abc")
        );
    }

    #[test]
    fn single_star_stays_within_a_segment() {
        let m = manifest(&["Api/Users", "Api/Users/Handler", "Worker/Queue"]);

        let filtered = m.filter("Api/*").unwrap();
        let keys: Vec<_> = filtered.lambdas.keys().cloned().collect();
        assert_eq!(keys, vec!["Api/Users".to_string()]);
    }

    #[test]
    fn double_star_spans_segments() {
        let m = manifest(&["Api/Users", "Api/Users/Handler", "Worker/Queue"]);

        assert_eq!(m.filter("**").unwrap().len(), 3);
        assert_eq!(m.filter("Api/**").unwrap().len(), 2);
        assert!(m.filter("Nothing/**").unwrap().is_empty());
    }

    #[test]
    fn filtering_is_idempotent() {
        let m = manifest(&["Api/Users", "Api/Orders", "Worker/Queue"]);
        for pattern in ["Api/*", "**", "*/Queue", "Api/Orders"] {
            let once = m.filter(pattern).unwrap();
            let twice = once.filter(pattern).unwrap();
            assert_eq!(once, twice, "pattern {pattern}");
        }
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let m = manifest(&["Api/Users"]);
        let err = m.filter("Api/[").unwrap_err();
        assert!(matches!(err, ManifestError::InvalidPattern { .. }));
    }
}
