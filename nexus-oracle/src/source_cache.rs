use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Lazily-populated, per-file line cache for annotating trace output with
/// source text.
///
/// Each file is read and split into lines on first request and kept around
/// for the life of the oracle, the same one-shot-then-cached shape
/// `nexus_core::Section`'s `cached_decode` uses for instruction decodes. A
/// failed read is cached too (as `None`), so a missing source file costs
/// one failed `fs::read_to_string` per session rather than one per line
/// requested.
#[derive(Default)]
pub struct SourceFileCache {
    files: RefCell<HashMap<String, Option<Rc<Vec<String>>>>>,
}

impl SourceFileCache {
    pub fn new() -> SourceFileCache {
        SourceFileCache::default()
    }

    fn load(&self, path: &str) -> Option<Rc<Vec<String>>> {
        if let Some(cached) = self.files.borrow().get(path) {
            return cached.clone();
        }
        let loaded = std::fs::read_to_string(path).ok().map(|contents| {
            Rc::new(
                contents
                    .lines()
                    .map(|l| l.trim_end_matches('\r').to_string())
                    .collect::<Vec<_>>(),
            )
        });
        if loaded.is_none() {
            log::debug!("source file unavailable for annotation: {path}");
        }
        self.files.borrow_mut().insert(path.to_string(), loaded.clone());
        loaded
    }

    /// 1-based source line text, or `None` if the file could not be read or
    /// `line` is out of range.
    pub fn line(&self, path: &str, line: u32) -> Option<String> {
        if line == 0 {
            return None;
        }
        let lines = self.load(path)?;
        lines.get((line - 1) as usize).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_and_caches_a_real_file() {
        let mut tmp = tempfile_for_test("a\nb\nc\n");
        let cache = SourceFileCache::new();
        assert_eq!(cache.line(tmp.path_str(), 2).as_deref(), Some("b"));
        assert_eq!(cache.line(tmp.path_str(), 99), None);
        tmp.cleanup();
    }

    #[test]
    fn missing_file_returns_none_without_panicking() {
        let cache = SourceFileCache::new();
        assert_eq!(cache.line("/nonexistent/path/does-not-exist.c", 1), None);
    }

    // Minimal scratch-file helper; avoids pulling in a dev-dependency just
    // for one test.
    struct ScratchFile(std::path::PathBuf);
    impl ScratchFile {
        fn path_str(&self) -> &str {
            self.0.to_str().unwrap()
        }
        fn cleanup(&mut self) {
            let _ = std::fs::remove_file(&self.0);
        }
    }

    fn tempfile_for_test(contents: &str) -> ScratchFile {
        let path = std::env::temp_dir().join(format!(
            "nexus_oracle_source_cache_test_{:p}",
            contents as *const str
        ));
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        ScratchFile(path)
    }
}
