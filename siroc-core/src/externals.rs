//! Classification of module specifiers that must stay unbundled.

use indexmap::IndexSet;
use once_cell::sync::Lazy;
use regex::RegexSet;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::manifest::Manifest;

/// Built-in modules of the Node.js runtime.
pub static BUILTIN_MODULES: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "assert",
        "assert/strict",
        "async_hooks",
        "buffer",
        "child_process",
        "cluster",
        "console",
        "constants",
        "crypto",
        "dgram",
        "diagnostics_channel",
        "dns",
        "dns/promises",
        "domain",
        "events",
        "fs",
        "fs/promises",
        "http",
        "http2",
        "https",
        "inspector",
        "module",
        "net",
        "os",
        "path",
        "path/posix",
        "path/win32",
        "perf_hooks",
        "process",
        "punycode",
        "querystring",
        "readline",
        "readline/promises",
        "repl",
        "stream",
        "stream/consumers",
        "stream/promises",
        "stream/web",
        "string_decoder",
        "sys",
        "timers",
        "timers/promises",
        "tls",
        "trace_events",
        "tty",
        "url",
        "util",
        "util/types",
        "v8",
        "vm",
        "wasi",
        "worker_threads",
        "zlib",
    ]
});

const NODE_PROTOCOL_RULE: &str = "^node:";

/// Decides whether a module specifier (or resolved path) is external.
///
/// Exact entries match verbatim. Pattern entries are regular expressions;
/// each dependency contributes two of them, one for the bare specifier and its
/// subpaths and one for resolved paths below a `node_modules` directory.
#[derive(Debug, Clone, Serialize)]
pub struct ExternalMatcher {
    exact: IndexSet<String>,
    patterns: Vec<String>,
    #[serde(skip)]
    compiled: RegexSet,
}

impl ExternalMatcher {
    /// Builds the matcher for a manifest plus caller-supplied entries.
    ///
    /// Caller entries written as `/pattern/` are regular expressions; anything
    /// else is an exact specifier.
    pub fn compute(manifest: &Manifest, explicit: &[String]) -> Result<Self> {
        let mut exact: IndexSet<String> = BUILTIN_MODULES.iter().map(|m| m.to_string()).collect();
        let mut patterns: IndexSet<String> = IndexSet::new();
        patterns.insert(NODE_PROTOCOL_RULE.to_string());

        for dependency in manifest.runtime_dependency_names() {
            let (specifier, path) = dependency_rules(dependency);
            patterns.insert(specifier);
            patterns.insert(path);
        }

        for entry in explicit {
            match entry
                .strip_prefix('/')
                .and_then(|rest| rest.strip_suffix('/'))
                .filter(|body| !body.is_empty())
            {
                Some(body) => {
                    regex::Regex::new(body).map_err(|e| Error::InvalidExternal {
                        pattern: entry.clone(),
                        message: e.to_string(),
                    })?;
                    patterns.insert(body.to_string());
                }
                None => {
                    exact.insert(entry.clone());
                }
            }
        }

        let patterns: Vec<String> = patterns.into_iter().collect();
        let compiled = RegexSet::new(&patterns).map_err(|e| Error::InvalidExternal {
            pattern: patterns.join(", "),
            message: e.to_string(),
        })?;

        Ok(Self {
            exact,
            patterns,
            compiled,
        })
    }

    pub fn is_external(&self, id: &str) -> bool {
        self.exact.contains(id) || self.compiled.is_match(id)
    }

    pub fn exact(&self) -> impl Iterator<Item = &str> {
        self.exact.iter().map(String::as_str)
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

/// Specifier and resolved-path rules for one dependency.
fn dependency_rules(name: &str) -> (String, String) {
    let escaped = regex::escape(name);
    let specifier = format!("^{}(/.*)?$", escaped);
    let segmented = escaped.replace('/', r"[\\/]");
    let path = format!(r"[\\/]node_modules[\\/]{}([\\/]|$)", segmented);
    (specifier, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependency_rule_shapes() {
        let (specifier, path) = dependency_rules("@scope/util");
        assert_eq!(specifier, "^@scope/util(/.*)?$");
        assert_eq!(path, r"[\\/]node_modules[\\/]@scope[\\/]util([\\/]|$)");
    }
}
