//! Local dependency scanning for the watch set.
//!
//! Starting from a function's entry points, every reachable local source
//! file is collected by parsing imports with tree-sitter and resolving them
//! the way the TypeScript compiler would (relative paths, `paths` aliases,
//! `baseUrl`). Packages and anything under `node_modules` are never
//! followed.
//!
//! The result only decides which files are watched. The bundler remains the
//! authority on what actually gets bundled, so a missed import delays a
//! rebuild trigger but never produces a wrong bundle.

use std::collections::{BTreeSet, HashSet, VecDeque};
use std::path::{Component, Path, PathBuf};

use tree_sitter::{Language, Node, Parser};

use super::tsconfig::{PathAliasResolver, load_chain};

/// Extensions probed, in order, when a specifier omits one.
const SOURCE_EXTENSIONS: [&str; 9] = [
    "ts", "tsx", "mts", "cts", "js", "jsx", "mjs", "cjs", "json",
];

/// Directory name that marks a vendored dependency tree.
pub const VENDOR_DIR: &str = "node_modules";

/// True when any component of `path` is a vendored dependency directory.
pub fn is_vendored(path: &Path) -> bool {
    path.components()
        .any(|c| matches!(c, Component::Normal(name) if name == VENDOR_DIR))
}

/// Computes the set of local files an entry's bundle depends on.
pub struct DependencyScanner {
    parser: Parser,
    aliases: Option<PathAliasResolver>,
}

impl DependencyScanner {
    /// Create a scanner, loading path aliases from `tsconfig` when given.
    ///
    /// An unreadable tsconfig only disables alias resolution.
    pub fn new(tsconfig: Option<&Path>) -> Self {
        let aliases = tsconfig.and_then(|path| {
            match load_chain(path).and_then(|chain| PathAliasResolver::from_chain(&chain)) {
                Ok(resolver) => Some(resolver),
                Err(e) => {
                    tracing::warn!("[scanner] ignoring path aliases from {}: {e}", path.display());
                    None
                }
            }
        });

        Self {
            parser: Parser::new(),
            aliases,
        }
    }

    /// Transitive local dependencies of `entry_points`, entry points included.
    ///
    /// Sorted, deduplicated, absolute where the files exist.
    pub fn scan(&mut self, entry_points: &[PathBuf]) -> Vec<PathBuf> {
        let mut seen: HashSet<PathBuf> = HashSet::new();
        let mut found: BTreeSet<PathBuf> = BTreeSet::new();
        let mut queue: VecDeque<PathBuf> = entry_points
            .iter()
            .filter_map(|entry| probe(entry))
            .collect();

        while let Some(file) = queue.pop_front() {
            if is_vendored(&file) || !seen.insert(file.clone()) {
                continue;
            }
            found.insert(file.clone());

            for specifier in self.imports_of(&file) {
                if let Some(resolved) = self.resolve(&file, &specifier) {
                    if !is_vendored(&resolved) && !seen.contains(&resolved) {
                        queue.push_back(resolved);
                    }
                }
            }
        }

        found.into_iter().collect()
    }

    /// Import specifiers appearing in `file`.
    fn imports_of(&mut self, file: &Path) -> Vec<String> {
        let Some(language) = language_for(file) else {
            return Vec::new();
        };

        let code = match std::fs::read_to_string(file) {
            Ok(code) => code,
            Err(e) => {
                crate::debug_event!("scanner", "unreadable", "{}: {e}", file.display());
                return Vec::new();
            }
        };

        if let Err(e) = self.parser.set_language(&language) {
            crate::debug_event!("scanner", "grammar", "{}: {e}", file.display());
            return Vec::new();
        }

        let Some(tree) = self.parser.parse(&code, None) else {
            crate::debug_event!("scanner", "unparsable", "{}", file.display());
            return Vec::new();
        };

        let mut specifiers = Vec::new();
        collect_specifiers(tree.root_node(), &code, &mut specifiers);
        specifiers
    }

    fn resolve(&self, from: &Path, specifier: &str) -> Option<PathBuf> {
        if specifier.starts_with('.') || Path::new(specifier).is_absolute() {
            let dir = from.parent().unwrap_or(Path::new("."));
            return probe(&dir.join(specifier));
        }

        self.aliases
            .as_ref()?
            .resolve_import(specifier)
            .iter()
            .find_map(|candidate| probe(candidate))
    }
}

fn language_for(file: &Path) -> Option<Language> {
    match file.extension()?.to_str()? {
        "ts" | "mts" | "cts" => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
        "tsx" => Some(tree_sitter_typescript::LANGUAGE_TSX.into()),
        "js" | "jsx" | "mjs" | "cjs" => Some(tree_sitter_javascript::LANGUAGE.into()),
        _ => None,
    }
}

/// Walk the tree collecting `import`/`export ... from`, `require()` and
/// dynamic `import()` specifiers.
fn collect_specifiers(node: Node, code: &str, out: &mut Vec<String>) {
    match node.kind() {
        "import_statement" | "export_statement" => {
            if let Some(source) = node.child_by_field_name("source") {
                out.push(string_literal(source, code));
            }
        }
        "call_expression" => {
            let callee = node.child_by_field_name("function");
            let is_loader = callee.is_some_and(|callee| {
                callee.kind() == "import"
                    || (callee.kind() == "identifier" && &code[callee.byte_range()] == "require")
            });
            if is_loader {
                let first_arg = node.child_by_field_name("arguments").and_then(|args| {
                    let mut cursor = args.walk();
                    args.named_children(&mut cursor)
                        .find(|arg| arg.kind() == "string")
                });
                if let Some(arg) = first_arg {
                    out.push(string_literal(arg, code));
                }
            }
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_specifiers(child, code, out);
    }
}

fn string_literal(node: Node, code: &str) -> String {
    code[node.byte_range()]
        .trim_matches(|c| c == '"' || c == '\'' || c == '`')
        .to_string()
}

/// Find the file a specifier-shaped path refers to.
fn probe(base: &Path) -> Option<PathBuf> {
    let existing = |path: PathBuf| -> Option<PathBuf> {
        if path.is_file() {
            Some(path.canonicalize().unwrap_or(path))
        } else {
            None
        }
    };

    if let Some(found) = existing(base.to_path_buf()) {
        return Some(found);
    }

    // `./util.js` written against `util.ts` under ESM-style resolution
    if let Some(ext) = base.extension().and_then(|e| e.to_str()) {
        let swaps: &[&str] = match ext {
            "js" => &["ts", "tsx"],
            "jsx" => &["tsx"],
            "mjs" => &["mts"],
            "cjs" => &["cts"],
            _ => &[],
        };
        for swap in swaps {
            if let Some(found) = existing(base.with_extension(swap)) {
                return Some(found);
            }
        }
    }

    for ext in SOURCE_EXTENSIONS {
        let mut with_ext = base.as_os_str().to_os_string();
        with_ext.push(".");
        with_ext.push(ext);
        if let Some(found) = existing(PathBuf::from(with_ext)) {
            return Some(found);
        }
    }

    SOURCE_EXTENSIONS
        .iter()
        .find_map(|ext| existing(base.join(format!("index.{ext}"))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path.canonicalize().unwrap()
    }

    fn names(root: &Path, files: &[PathBuf]) -> Vec<String> {
        let root = root.canonicalize().unwrap();
        files
            .iter()
            .map(|f| f.strip_prefix(&root).unwrap().display().to_string())
            .collect()
    }

    #[test]
    fn follows_relative_imports_transitively() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        let entry = write(
            dir,
            "src/handler.ts",
            "import { db } from './lib/db';\nimport type { User } from \"./types\";\nexport * from './lib';\n",
        );
        write(dir, "src/lib/db.ts", "const cfg = require('../config.json');\nexport const db = cfg;\n");
        write(dir, "src/lib/index.ts", "export const lib = 1;\n");
        write(dir, "src/types.ts", "export interface User { id: string }\n");
        write(dir, "src/config.json", "{}");
        write(dir, "src/unused.ts", "export {};\n");

        let files = DependencyScanner::new(None).scan(&[entry]);
        assert_eq!(
            names(dir, &files),
            vec![
                "src/config.json",
                "src/handler.ts",
                "src/lib/db.ts",
                "src/lib/index.ts",
                "src/types.ts",
            ]
        );
    }

    #[test]
    fn never_includes_vendored_files() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        let entry = write(
            dir,
            "handler.ts",
            "import x from 'left-pad';\nimport y from './node_modules/left-pad/index.js';\nimport z from './local';\n",
        );
        write(dir, "node_modules/left-pad/index.js", "module.exports = 1;\n");
        write(dir, "local.ts", "export default 1;\n");

        let files = DependencyScanner::new(None).scan(&[entry]);
        assert!(files.iter().all(|f| !is_vendored(f)));
        assert_eq!(names(dir, &files), vec!["handler.ts", "local.ts"]);
    }

    #[test]
    fn resolves_path_aliases_from_tsconfig() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        let tsconfig = write(
            dir,
            "tsconfig.json",
            r#"{ "compilerOptions": { "baseUrl": ".", "paths": { "@shared/*": ["shared/*"] } } }"#,
        );
        let entry = write(
            dir,
            "src/main.ts",
            "import { log } from '@shared/log';\nconst later = () => import('./lazy');\n",
        );
        write(dir, "shared/log.ts", "export const log = console.log;\n");
        write(dir, "src/lazy.tsx", "export default () => null;\n");

        let files = DependencyScanner::new(Some(&tsconfig)).scan(&[entry]);
        assert_eq!(
            names(dir, &files),
            vec!["shared/log.ts", "src/lazy.tsx", "src/main.ts"]
        );
    }

    #[test]
    fn multiple_entry_points_are_deduplicated() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        let a = write(dir, "a.ts", "import './common';\n");
        let b = write(dir, "b.js", "const c = require('./common');\n");
        write(dir, "common.ts", "export {};\n");

        let files = DependencyScanner::new(None).scan(&[a, b]);
        assert_eq!(names(dir, &files), vec!["a.ts", "b.js", "common.ts"]);
    }

    #[test]
    fn esm_js_specifiers_map_to_typescript_sources() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        let entry = write(dir, "index.ts", "import { f } from './util.js';\n");
        write(dir, "util.ts", "export const f = 1;\n");

        let files = DependencyScanner::new(None).scan(&[entry]);
        assert_eq!(names(dir, &files), vec!["index.ts", "util.ts"]);
    }
}
