//! Bundler options as recorded in the manifest, and the resolved build plan.
//!
//! The manifest stores the esbuild options the construct was synthesized
//! with. [`BuildPlan`] turns them into the invocation used while watching:
//! entry points switched to compiled `.js` siblings under pre-compilation,
//! output pinned to the session's working directory, and size-oriented
//! defaults filled in only where the user left a field unset. The plan is
//! handed to the bundler as an esbuild JavaScript API options object.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::manifest::LambdaEntry;

/// File written into the working directory by every build.
pub const OUTPUT_FILE: &str = "index.js";

const DEFAULT_LOG_LEVEL: &str = "error";

/// `entryPoints` accepts a list of paths or a map of output name to path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntryPoints {
    List(Vec<PathBuf>),
    Named(IndexMap<String, PathBuf>),
}

impl Default for EntryPoints {
    fn default() -> Self {
        EntryPoints::List(Vec::new())
    }
}

impl EntryPoints {
    /// Source paths regardless of shape.
    pub fn paths(&self) -> Vec<PathBuf> {
        match self {
            EntryPoints::List(paths) => paths.clone(),
            EntryPoints::Named(map) => map.values().cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            EntryPoints::List(paths) => paths.is_empty(),
            EntryPoints::Named(map) => map.is_empty(),
        }
    }
}

/// esbuild build options as recorded by the construct.
///
/// Fields the plan reads are typed; anything else lands in `other` and is
/// passed through to esbuild untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EsbuildOptions {
    #[serde(default)]
    pub entry_points: EntryPoints,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tsconfig: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    /// String or list of strings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub external: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minify: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tree_shaking: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
    /// `true`, `false` or one of esbuild's sourcemap modes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sourcemap: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keep_names: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charset: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub define: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub loader: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub main_fields: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub banner: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub footer: BTreeMap<String, String>,
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

/// Keys whose values the plan decides; manifest values for them are dropped.
const PLAN_OWNED_KEYS: [&str; 6] = ["entryPoints", "outfile", "outdir", "incremental", "write", "watch"];

/// One entry point as passed to the bundler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedEntry {
    pub name: Option<String>,
    pub path: PathBuf,
}

/// Fully resolved bundler invocation for one session.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildPlan {
    pub entry_points: Vec<PlannedEntry>,
    pub outfile: PathBuf,
    pub resolve_extensions: Option<Vec<String>>,
    pub tree_shaking: bool,
    pub minify: bool,
    pub log_level: String,
    pub options: EsbuildOptions,
}

/// `src/handler.ts` -> `src/handler.js`.
pub fn js_sibling(path: &Path) -> PathBuf {
    path.with_extension("js")
}

impl BuildPlan {
    /// Resolve the plan for `entry`, writing into `work_dir`.
    pub fn for_entry(entry: &LambdaEntry, work_dir: &Path) -> Self {
        let options = entry.esbuild_options.clone();
        let pre_compiled = entry.pre_compilation();

        let resolve = |path: &PathBuf| {
            if pre_compiled {
                js_sibling(path)
            } else {
                path.clone()
            }
        };

        let entry_points = match &options.entry_points {
            EntryPoints::List(paths) => paths
                .iter()
                .map(|path| PlannedEntry {
                    name: None,
                    path: resolve(path),
                })
                .collect(),
            EntryPoints::Named(map) => map
                .iter()
                .map(|(name, path)| PlannedEntry {
                    name: Some(name.clone()),
                    path: resolve(path),
                })
                .collect(),
        };

        Self {
            entry_points,
            outfile: work_dir.join(OUTPUT_FILE),
            resolve_extensions: pre_compiled.then(|| vec![".js".to_string()]),
            // Smaller bundles upload faster; an explicit `false` still wins
            tree_shaking: options.tree_shaking.unwrap_or(true),
            minify: options.minify.unwrap_or(true),
            log_level: options
                .log_level
                .clone()
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            options,
        }
    }

    /// Options object for `esbuild.context()`.
    ///
    /// Starts from the manifest's options, including keys this crate does
    /// not model, then applies the planned entry points, output file and
    /// defaults.
    pub fn to_build_options(&self) -> serde_json::Result<Value> {
        let mut options = match serde_json::to_value(&self.options)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        for key in PLAN_OWNED_KEYS {
            options.remove(key);
        }

        let path = |entry: &PlannedEntry| Value::String(entry.path.display().to_string());
        let entry_points = if self.entry_points.iter().any(|e| e.name.is_some()) {
            Value::Object(
                self.entry_points
                    .iter()
                    .map(|entry| {
                        let name = entry
                            .name
                            .clone()
                            .unwrap_or_else(|| entry.path.display().to_string());
                        (name, path(entry))
                    })
                    .collect(),
            )
        } else {
            Value::Array(self.entry_points.iter().map(path).collect())
        };

        options.insert("entryPoints".to_string(), entry_points);
        options.insert(
            "outfile".to_string(),
            Value::String(self.outfile.display().to_string()),
        );
        if let Some(extensions) = &self.resolve_extensions {
            options.insert(
                "resolveExtensions".to_string(),
                Value::Array(extensions.iter().cloned().map(Value::String).collect()),
            );
        }
        options.insert("minify".to_string(), Value::Bool(self.minify));
        options.insert("treeShaking".to_string(), Value::Bool(self.tree_shaking));
        options.insert("logLevel".to_string(), Value::String(self.log_level.clone()));

        Ok(Value::Object(options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::CdkwBuildOptions;
    use serde_json::json;

    fn entry_with(options: EsbuildOptions, pre_compilation: bool) -> LambdaEntry {
        LambdaEntry {
            asset_path: PathBuf::from("asset.1"),
            esbuild_options: options,
            cdkw_build_options: CdkwBuildOptions { pre_compilation },
            lambda_logical_id: "Fn".to_string(),
            root_stack_name: "Stack".to_string(),
            nested_stack_logical_ids: Vec::new(),
            node_modules_layer_version: None,
        }
    }

    fn options(json: &str) -> EsbuildOptions {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn fills_size_defaults_when_unset() {
        let entry = entry_with(options(r#"{ "entryPoints": ["src/a.ts"] }"#), false);
        let plan = BuildPlan::for_entry(&entry, Path::new("/out/fn"));

        assert!(plan.tree_shaking);
        assert!(plan.minify);
        assert_eq!(plan.log_level, "error");
        assert_eq!(plan.outfile, PathBuf::from("/out/fn/index.js"));
        assert!(plan.resolve_extensions.is_none());

        let built = plan.to_build_options().unwrap();
        assert_eq!(
            built,
            json!({
                "entryPoints": ["src/a.ts"],
                "outfile": "/out/fn/index.js",
                "minify": true,
                "treeShaking": true,
                "logLevel": "error"
            })
        );
    }

    #[test]
    fn explicit_choices_are_not_overridden() {
        let entry = entry_with(
            options(
                r#"{ "entryPoints": ["a.ts"], "minify": false, "treeShaking": false, "logLevel": "debug" }"#,
            ),
            false,
        );
        let plan = BuildPlan::for_entry(&entry, Path::new("/out"));

        assert!(!plan.minify);
        assert!(!plan.tree_shaking);
        assert_eq!(plan.log_level, "debug");

        let built = plan.to_build_options().unwrap();
        assert_eq!(built["minify"], json!(false));
        assert_eq!(built["treeShaking"], json!(false));
        assert_eq!(built["logLevel"], json!("debug"));
    }

    #[test]
    fn pre_compilation_switches_to_js_siblings() {
        let entry = entry_with(
            options(r#"{ "entryPoints": ["src/api/handler.ts", "src/worker.tsx"] }"#),
            true,
        );
        let plan = BuildPlan::for_entry(&entry, Path::new("/out"));

        let paths: Vec<_> = plan.entry_points.iter().map(|e| e.path.clone()).collect();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("src/api/handler.js"),
                PathBuf::from("src/worker.js")
            ]
        );
        assert_eq!(plan.resolve_extensions, Some(vec![".js".to_string()]));

        let built = plan.to_build_options().unwrap();
        assert_eq!(built["entryPoints"], json!(["src/api/handler.js", "src/worker.js"]));
        assert_eq!(built["resolveExtensions"], json!([".js"]));
    }

    #[test]
    fn named_entry_points_keep_their_names() {
        let entry = entry_with(
            options(r#"{ "entryPoints": { "main": "src/main.ts" } }"#),
            false,
        );
        let plan = BuildPlan::for_entry(&entry, Path::new("/out"));
        let built = plan.to_build_options().unwrap();
        assert_eq!(built["entryPoints"], json!({ "main": "src/main.ts" }));
    }

    #[test]
    fn passes_manifest_options_through_and_owns_output() {
        let entry = entry_with(
            options(
                r#"{
                    "entryPoints": ["a.ts"],
                    "bundle": true,
                    "platform": "node",
                    "target": ["node18", "es2020"],
                    "external": ["aws-sdk"],
                    "define": { "process.env.STAGE": "\"dev\"" },
                    "sourcemap": "inline",
                    "mainFields": ["module", "main"],
                    "metafile": true,
                    "outdir": "dist",
                    "write": false,
                    "incremental": true
                }"#,
            ),
            false,
        );
        let plan = BuildPlan::for_entry(&entry, Path::new("/out"));
        let built = plan.to_build_options().unwrap();

        assert_eq!(built["bundle"], json!(true));
        assert_eq!(built["platform"], json!("node"));
        assert_eq!(built["target"], json!(["node18", "es2020"]));
        assert_eq!(built["external"], json!(["aws-sdk"]));
        assert_eq!(built["define"], json!({ "process.env.STAGE": "\"dev\"" }));
        assert_eq!(built["sourcemap"], json!("inline"));
        assert_eq!(built["mainFields"], json!(["module", "main"]));
        assert_eq!(built["metafile"], json!(true));
        assert_eq!(built["outfile"], json!("/out/index.js"));

        let object = built.as_object().unwrap();
        for owned in ["outdir", "write", "incremental"] {
            assert!(!object.contains_key(owned), "{owned} should be dropped");
        }
    }
}
