//! Running SCRIPT-prop entries.
//!
//! The original's `RunPostScript` shelled out to a free function reaching
//! into a global archive handle. Here, extraction threads an explicit `&mut
//! dyn ScriptRunner` through instead. The embedded scripting language itself
//! is out of scope for this crate; this module is the interface an embedding
//! application implements against.

use crate::Error;

/// Executes script sources extracted from SCRIPT-prop entries.
pub trait ScriptRunner {
    /// Runs `source` (the entry's decoded text); `title` is the entry's
    /// logical path, passed through for diagnostics.
    fn run(&mut self, source: &str, title: &str) -> Result<(), Error>;
}

/// Does nothing; the library default, and what `--safe` mode installs on the
/// CLI side regardless of what an embedder configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopScriptRunner;

impl ScriptRunner for NoopScriptRunner {
    fn run(&mut self, _source: &str, _title: &str) -> Result<(), Error> {
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn noop_runner_always_succeeds() {
        assert!(NoopScriptRunner.run("print(1)", "scripts/hello").is_ok());
    }
}
