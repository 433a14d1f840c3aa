//! Source entrypoint discovery by filename convention.

use std::path::{Path, PathBuf};

use indexmap::IndexSet;

/// Directory, relative to the package root, that holds sources.
pub const SOURCE_DIR: &str = "src";

const SOURCE_EXTENSIONS: [&str; 2] = ["ts", "js"];

/// Candidate source files for a declared output path, most specific first.
///
/// `lib/babel.es.js` yields `babel.es.ts`, `babel.es.js`, `babel.es/index.ts`,
/// `babel.es/index.js`, then the same for `babel`, then `index.ts` and `index.js`.
/// Nested output directories below the first one are tried as source
/// subdirectories before falling back to the source root.
pub fn candidate_filenames(declared: Option<&str>) -> Vec<String> {
    let mut stems: IndexSet<String> = IndexSet::new();

    if let Some(path) = declared {
        let path = path.strip_prefix("./").unwrap_or(path);
        let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty() && *s != ".").collect();
        let file = segments.pop().unwrap_or_default();

        let basefile = match file.rfind('.') {
            Some(idx) if idx > 0 => &file[..idx],
            _ => file,
        };
        let without_type = basefile.split('.').next().unwrap_or(basefile);

        // The first segment is the output directory (`lib`, `dist`), which has no
        // counterpart under `src`.
        let inner: &[&str] = if segments.len() > 1 { &segments[1..] } else { &[] };

        for depth in (0..=inner.len()).rev() {
            let prefix: String = inner[..depth].iter().map(|dir| format!("{}/", dir)).collect();
            for name in [basefile, without_type] {
                if name.is_empty() {
                    continue;
                }
                stems.insert(format!("{}{}", prefix, name));
                stems.insert(format!("{}{}/index", prefix, name));
            }
        }
    }
    stems.insert("index".to_string());

    stems
        .iter()
        .flat_map(|stem| SOURCE_EXTENSIONS.iter().map(move |ext| format!("{}.{}", stem, ext)))
        .collect::<IndexSet<_>>()
        .into_iter()
        .collect()
}

/// Returns the first candidate that exists under `<root>/src`.
pub fn resolve(root_dir: &Path, declared: Option<&str>) -> Option<PathBuf> {
    let source_dir = root_dir.join(SOURCE_DIR);
    candidate_filenames(declared)
        .into_iter()
        .map(|candidate| source_dir.join(candidate))
        .find(|path| path.is_file())
}

/// Strips a trailing `.ts`/`.js` extension, as module specifiers omit it.
pub fn strip_source_extension(path: &str) -> &str {
    path.strip_suffix(".ts")
        .or_else(|| path.strip_suffix(".js"))
        .unwrap_or(path)
}
