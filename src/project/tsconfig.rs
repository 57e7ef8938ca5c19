//! tsconfig.json handling: JSONC parsing, `extends` chains, compiler flag
//! derivation for pre-compilation, and `paths` aliases for the dependency
//! scanner.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Reverse;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::error::{TsConfigError, TsConfigResult};

/// Options the compiler rejects when invoked on loose files instead of a project.
pub const EXCLUDED_COMPILER_OPTIONS: [&str; 2] = ["composite", "tsBuildInfoFile"];

/// Minimal tsconfig.json representation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TsConfig {
    /// Parent configuration, relative path or package specifier
    pub extends: Option<String>,

    /// Raw compiler options, kept untyped so every key can be forwarded
    #[serde(default)]
    pub compiler_options: Map<String, Value>,
}

/// JSONC parsing helper using serde_json5 for comment and trailing comma support
pub fn parse_tsconfig(content: &str, path: &Path) -> TsConfigResult<TsConfig> {
    serde_json5::from_str(content).map_err(|e| TsConfigError::Parse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Read and parse a tsconfig.json file with JSONC support
pub fn read_tsconfig(path: &Path) -> TsConfigResult<TsConfig> {
    let content = std::fs::read_to_string(path).map_err(|source| TsConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_tsconfig(&content, path)
}

/// Locate the file an `extends` value points at.
///
/// Relative and absolute values resolve against the extending config's
/// directory (adding `.json` when no extension is given). Anything else is a
/// package specifier looked up in `node_modules` directories above the config.
pub fn resolve_extends(config_path: &Path, extends: &str) -> TsConfigResult<PathBuf> {
    let config_dir = config_path.parent().unwrap_or(Path::new("."));
    let unresolved = || TsConfigError::UnresolvedExtends {
        extends: extends.to_string(),
        from: config_path.to_path_buf(),
    };

    if extends.starts_with('.') || Path::new(extends).is_absolute() {
        let target = config_dir.join(extends);
        return Ok(if target.extension().is_none() {
            target.with_extension("json")
        } else {
            target
        });
    }

    for ancestor in config_dir.ancestors() {
        let candidate = ancestor.join("node_modules").join(extends);
        if candidate.is_dir() {
            let nested = candidate.join("tsconfig.json");
            if nested.is_file() {
                return Ok(nested);
            }
        } else if candidate.is_file() {
            return Ok(candidate);
        } else if candidate.extension().is_none() {
            let with_json = candidate.with_extension("json");
            if with_json.is_file() {
                return Ok(with_json);
            }
        }
    }

    Err(unresolved())
}

/// Load a config and all of its ancestors, child first.
///
/// Walks `extends` iteratively and stops at the first config without one.
/// A config reached twice is an error.
pub fn load_chain(path: &Path) -> TsConfigResult<Vec<(PathBuf, TsConfig)>> {
    let mut chain = Vec::new();
    let mut visited = HashSet::new();
    let mut next = Some(path.to_path_buf());

    while let Some(current) = next.take() {
        let canonical = current
            .canonicalize()
            .map_err(|source| TsConfigError::Io {
                path: current.clone(),
                source,
            })?;

        if !visited.insert(canonical.clone()) {
            return Err(TsConfigError::CircularExtends { path: canonical });
        }

        let config = read_tsconfig(&canonical)?;
        if let Some(extends) = &config.extends {
            next = Some(resolve_extends(&canonical, extends)?);
        }
        chain.push((canonical, config));
    }

    Ok(chain)
}

/// Flatten the `extends` chain: each level's options override its parents'.
pub fn flatten_compiler_options(path: &Path) -> TsConfigResult<Map<String, Value>> {
    let mut merged = Map::new();
    for (_, config) in load_chain(path)? {
        for (key, value) in config.compiler_options {
            // Child levels come first, so an existing key is already the winner
            merged.entry(key).or_insert(value);
        }
    }
    Ok(merged)
}

/// Turn compiler options into command-line tokens, sorted by option name.
///
/// Booleans become `--key` or `--key false`, strings `--key value`, arrays
/// `--key a,b`. Objects and nulls (such as `paths`) have no command-line
/// form and are skipped; numbers are rejected.
pub fn compiler_flags(options: &Map<String, Value>) -> TsConfigResult<Vec<String>> {
    let mut keys: Vec<&String> = options.keys().collect();
    keys.sort();

    let mut tokens = Vec::new();
    for key in keys {
        if EXCLUDED_COMPILER_OPTIONS.contains(&key.as_str()) {
            continue;
        }

        let option = format!("--{key}");
        match &options[key] {
            Value::Bool(true) => tokens.push(option),
            Value::Bool(false) => tokens.extend([option, "false".to_string()]),
            Value::String(value) => tokens.extend([option, value.clone()]),
            Value::Array(items) => {
                let joined = items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(",");
                tokens.extend([option, joined]);
            }
            Value::Object(_) | Value::Null => {}
            Value::Number(n) => {
                return Err(TsConfigError::UnsupportedOption {
                    key: key.clone(),
                    kind: "number",
                    value: n.to_string(),
                });
            }
        }
    }

    Ok(tokens)
}

/// Flags for compiling loose entry points in place.
///
/// The flattened options are overridden so output lands next to each source
/// and no build info is written.
pub fn pre_compilation_flags(tsconfig: Option<&Path>) -> TsConfigResult<Vec<String>> {
    let mut options = match tsconfig {
        Some(path) => flatten_compiler_options(path)?,
        None => Map::new(),
    };
    options.insert("incremental".to_string(), Value::Bool(false));
    options.insert("rootDir".to_string(), Value::String("./".to_string()));
    options.insert("outDir".to_string(), Value::String("./".to_string()));

    compiler_flags(&options)
}

/// Compiled `paths` rule for efficient pattern matching
#[derive(Debug)]
pub struct PathRule {
    /// Original pattern (e.g., "@lib/*")
    pub pattern: String,
    /// Target templates (e.g., ["src/lib/*"])
    pub targets: Vec<String>,
    regex: regex::Regex,
}

impl PathRule {
    pub fn new(pattern: String, targets: Vec<String>) -> TsConfigResult<Self> {
        // "@lib/*" becomes "^@lib/(.*)$"
        let regex_pattern = format!("^{}$", regex::escape(&pattern).replace("\\*", "(.*)"));
        let regex =
            regex::Regex::new(&regex_pattern).map_err(|e| TsConfigError::InvalidPathPattern {
                pattern: pattern.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            pattern,
            targets,
            regex,
        })
    }

    /// Substitute the wildcard capture into every target.
    pub fn try_resolve(&self, specifier: &str) -> Option<Vec<String>> {
        let captures = self.regex.captures(specifier)?;
        let captured = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
        Some(
            self.targets
                .iter()
                .map(|target| target.replace('*', captured))
                .collect(),
        )
    }
}

/// Resolves bare import specifiers through `baseUrl` and `paths`.
#[derive(Debug)]
pub struct PathAliasResolver {
    /// Directory `paths` targets are relative to
    pub paths_base: PathBuf,
    /// Absolute `baseUrl`, when one is set anywhere in the chain
    pub base_url: Option<PathBuf>,
    /// Rules in priority order
    pub rules: Vec<PathRule>,
}

impl PathAliasResolver {
    /// Build from a loaded chain, honoring the closest `baseUrl` and `paths`.
    pub fn from_chain(chain: &[(PathBuf, TsConfig)]) -> TsConfigResult<Self> {
        let dir_of = |path: &Path| path.parent().unwrap_or(Path::new(".")).to_path_buf();

        let base_url = chain.iter().find_map(|(path, config)| {
            config
                .compiler_options
                .get("baseUrl")
                .and_then(Value::as_str)
                .map(|base| dir_of(path).join(base))
        });

        let paths = chain.iter().find_map(|(path, config)| {
            config
                .compiler_options
                .get("paths")
                .and_then(Value::as_object)
                .map(|paths| (dir_of(path), paths.clone()))
        });

        let (paths_dir, paths) = match paths {
            Some((dir, paths)) => (Some(dir), paths),
            None => (None, Map::new()),
        };

        // More specific patterns (longer, fewer wildcards) match before catch-alls
        let mut entries: Vec<_> = paths.into_iter().collect();
        entries.sort_by_key(|(pattern, _)| {
            let wildcard_count = pattern.matches('*').count();
            (Reverse(pattern.len()), wildcard_count)
        });

        let mut rules = Vec::with_capacity(entries.len());
        for (pattern, targets) in entries {
            let targets = targets
                .as_array()
                .map(|items| {
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            rules.push(PathRule::new(pattern, targets)?);
        }

        let paths_base = base_url
            .clone()
            .or(paths_dir)
            .or_else(|| chain.first().map(|(path, _)| dir_of(path)))
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            paths_base,
            base_url,
            rules,
        })
    }

    /// Candidate locations for `specifier`, without extension probing.
    pub fn resolve_import(&self, specifier: &str) -> Vec<PathBuf> {
        let mut candidates: Vec<PathBuf> = self
            .rules
            .iter()
            .filter_map(|rule| rule.try_resolve(specifier))
            .flatten()
            .map(|target| self.paths_base.join(target))
            .collect();

        if let Some(base) = &self.base_url {
            candidates.push(base.join(specifier));
        }

        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn parse_tsconfig_with_comments() {
        let content = r#"{
            // Base configuration
            "compilerOptions": {
                "strict": true, // trailing comma below
                "lib": ["es2020"],
            }
        }"#;

        let config = parse_tsconfig(content, Path::new("tsconfig.json")).unwrap();
        assert_eq!(config.compiler_options["strict"], Value::Bool(true));
        assert!(config.extends.is_none());
    }

    #[test]
    fn invalid_json_returns_error() {
        let err = parse_tsconfig("{ invalid json }", Path::new("tsconfig.json")).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Failed to parse"));
        assert!(message.contains("Suggestion:"));
    }

    #[test]
    fn child_overrides_parent_through_the_chain() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        write(
            dir,
            "c.json",
            r#"{ "compilerOptions": { "strict": false, "target": "es5", "lib": ["es5"], "module": "commonjs" } }"#,
        );
        write(
            dir,
            "b.json",
            r#"{ "extends": "./c", "compilerOptions": { "target": "es2019", "lib": ["es2019"] } }"#,
        );
        let a = write(
            dir,
            "a.json",
            r#"{ "extends": "./b.json", "compilerOptions": { "strict": true, "lib": ["es2022", "dom"] } }"#,
        );

        let options = flatten_compiler_options(&a).unwrap();
        assert_eq!(options["strict"], Value::Bool(true));
        assert_eq!(options["target"], Value::String("es2019".to_string()));
        assert_eq!(options["module"], Value::String("commonjs".to_string()));
        assert_eq!(options["lib"], serde_json::json!(["es2022", "dom"]));
    }

    #[test]
    fn detect_circular_extends() {
        let temp_dir = TempDir::new().unwrap();
        let a = write(temp_dir.path(), "a.json", r#"{ "extends": "./b.json" }"#);
        write(temp_dir.path(), "b.json", r#"{ "extends": "./a.json" }"#);

        let err = load_chain(&a).unwrap_err();
        assert!(matches!(err, TsConfigError::CircularExtends { .. }));
        assert!(err.to_string().contains("Suggestion:"));
    }

    #[test]
    fn extends_resolves_packages_from_node_modules() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        write(
            dir,
            "node_modules/@tsconfig/node18/tsconfig.json",
            r#"{ "compilerOptions": { "target": "es2022" } }"#,
        );
        let config = write(
            dir,
            "app/tsconfig.json",
            r#"{ "extends": "@tsconfig/node18/tsconfig.json" }"#,
        );

        let options = flatten_compiler_options(&config).unwrap();
        assert_eq!(options["target"], Value::String("es2022".to_string()));
    }

    #[test]
    fn flags_are_sorted_and_typed() {
        let options = serde_json::json!({
            "strict": true,
            "declaration": false,
            "target": "es2020",
            "lib": ["es2020", "dom"],
            "paths": { "@/*": ["src/*"] }
        });
        let tokens = compiler_flags(options.as_object().unwrap()).unwrap();

        assert_eq!(
            tokens.join(" "),
            "--declaration false --lib es2020,dom --strict --target es2020"
        );
    }

    #[test]
    fn excluded_options_never_appear() {
        let temp_dir = TempDir::new().unwrap();
        write(
            temp_dir.path(),
            "base.json",
            r#"{ "compilerOptions": { "composite": true, "tsBuildInfoFile": "out/.tsbuildinfo" } }"#,
        );
        let config = write(
            temp_dir.path(),
            "tsconfig.json",
            r#"{ "extends": "./base.json", "compilerOptions": { "composite": false } }"#,
        );

        let flags = pre_compilation_flags(Some(&config)).unwrap().join(" ");
        assert!(!flags.contains("composite"));
        assert!(!flags.contains("tsBuildInfoFile"));
        assert_eq!(flags, "--incremental false --outDir ./ --rootDir ./");
    }

    #[test]
    fn numeric_options_are_rejected() {
        let options = serde_json::json!({ "maxNodeModuleJsDepth": 2 });
        let err = compiler_flags(options.as_object().unwrap()).unwrap_err();
        assert!(matches!(err, TsConfigError::UnsupportedOption { .. }));
    }

    #[test]
    fn path_rule_resolves_wildcards() {
        let rule = PathRule::new(
            "@lib/*".to_string(),
            vec!["src/lib/*".to_string(), "vendor/lib/*".to_string()],
        )
        .unwrap();

        assert_eq!(
            rule.try_resolve("@lib/db/client"),
            Some(vec![
                "src/lib/db/client".to_string(),
                "vendor/lib/db/client".to_string()
            ])
        );
        assert!(rule.try_resolve("@utils/format").is_none());
    }

    #[test]
    fn alias_resolver_uses_base_url_of_defining_config() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        write(
            dir,
            "config/base.json",
            r#"{ "compilerOptions": { "baseUrl": "..", "paths": { "@/*": ["src/*"] } } }"#,
        );
        let config = write(dir, "tsconfig.json", r#"{ "extends": "./config/base.json" }"#);

        let chain = load_chain(&config).unwrap();
        let resolver = PathAliasResolver::from_chain(&chain).unwrap();
        let root = dir.canonicalize().unwrap();

        let candidates = resolver.resolve_import("@/handlers/users");
        assert_eq!(
            candidates[0],
            root.join("config").join("..").join("src/handlers/users")
        );
        assert_eq!(
            candidates.last().unwrap(),
            &root.join("config").join("..").join("@/handlers/users")
        );
    }

    #[test]
    fn longer_alias_patterns_resolve_first() {
        let temp_dir = TempDir::new().unwrap();
        let config = write(
            temp_dir.path(),
            "tsconfig.json",
            r#"{ "compilerOptions": { "baseUrl": ".", "paths": {
                "*": ["types/*"],
                "@/*": ["src/*"],
                "@/db/*": ["lib/db/*"]
            } } }"#,
        );

        let chain = load_chain(&config).unwrap();
        let resolver = PathAliasResolver::from_chain(&chain).unwrap();
        let root = temp_dir.path().canonicalize().unwrap();

        let candidates = resolver.resolve_import("@/db/client");
        assert_eq!(candidates[0], root.join("lib/db/client"));
        assert_eq!(candidates[1], root.join("src/db/client"));
    }
}
