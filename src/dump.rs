//! Postmortem dumps of dependency closures.
//!
//! When a test fails, the modules it produced are written to disk so they can be inspected
//! with external tools. Each failure gets its own numbered directory below the dump root:
//!
//! ```text
//! <root>/
//!   0/
//!     App.exe
//!     App.pdb
//!     Lib.dll
//!     Part.netmodule
//!     dump.log
//!   1/
//!     ...
//! ```
//!
//! Only modules produced in this run are written. Fixtures already exist somewhere on disk.
//! The number of dumps per service is capped, so a suite with many failing tests cannot
//! fill the disk.

use std::{
    fmt::Write as _,
    fs,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, OnceLock,
    },
};

use tracing::{info, warn};

use crate::{config::HarnessConfig, module::ModuleRecord, Result};

/// Name of the log listing every file written into a dump directory
pub const DUMP_LOG: &str = "dump.log";

/// Writes numbered postmortem dumps, at most `limit` per service.
///
/// One instance is shared by every session of a process, see [`DumpService::global`].
/// Tests of the pipeline itself create isolated instances.
#[derive(Debug)]
pub struct DumpService {
    root: Option<PathBuf>,
    limit: usize,
    counter: AtomicUsize,
}

impl DumpService {
    /// Create a service writing below `root`
    pub fn new(root: impl Into<PathBuf>, limit: usize) -> Self {
        Self {
            root: Some(root.into()),
            limit,
            counter: AtomicUsize::new(0),
        }
    }

    /// Create a service that never writes anything
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            root: None,
            limit: 0,
            counter: AtomicUsize::new(0),
        }
    }

    /// Create a service from a harness configuration
    #[must_use]
    pub fn from_config(config: &HarnessConfig) -> Self {
        match &config.dump_root {
            Some(root) => Self::new(root, config.dump_limit),
            None => Self::disabled(),
        }
    }

    /// The process-wide service, configured from the environment on first use
    pub fn global() -> Arc<DumpService> {
        static GLOBAL: OnceLock<Arc<DumpService>> = OnceLock::new();
        GLOBAL
            .get_or_init(|| Arc::new(DumpService::from_config(&HarnessConfig::from_env())))
            .clone()
    }

    /// The dump root, `None` when disabled
    #[must_use]
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Number of dump slots handed out so far, including refused ones
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.counter.load(Ordering::SeqCst)
    }

    /// Write the in-memory modules of `modules` into a fresh numbered directory.
    ///
    /// Returns the directory, or `None` when dumps are disabled or the limit is reached.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if a directory or file cannot be written.
    pub fn dump(&self, modules: &[ModuleRecord]) -> Result<Option<PathBuf>> {
        let Some(root) = &self.root else {
            return Ok(None);
        };

        let index = self.counter.fetch_add(1, Ordering::SeqCst);
        if index >= self.limit {
            warn!(limit = self.limit, "dump limit reached, not writing modules");
            return Ok(None);
        }

        let directory = root.join(index.to_string());
        fs::create_dir_all(&directory)?;

        let mut log = String::new();
        for module in modules.iter().filter(|module| module.in_memory()) {
            let path = directory.join(module.file_name());
            fs::write(&path, module.image())?;
            let _ = writeln!(log, "PE({}): {}", module.kind(), path.display());

            if let Some(debug_image) = module.debug_image() {
                let path = directory.join(module.debug_file_name());
                fs::write(&path, debug_image)?;
                let _ = writeln!(log, "PDB: {}", path.display());
            }
        }
        fs::write(directory.join(DUMP_LOG), log)?;

        info!(directory = %directory.display(), "dumped modules");
        Ok(Some(directory))
    }

    /// Like [`dump`](Self::dump), but a failing dump is logged instead of returned.
    ///
    /// Used on error paths, where the original failure must be reported unchanged.
    pub fn dump_or_warn(&self, modules: &[ModuleRecord]) -> Option<PathBuf> {
        match self.dump(modules) {
            Ok(directory) => directory,
            Err(error) => {
                warn!(%error, "failed to write postmortem dump");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{AssemblyIdentity, OutputKind, Provenance};
    use tempfile::TempDir;

    fn compiled(name: &str, kind: OutputKind, debug: bool) -> ModuleRecord {
        let identity = AssemblyIdentity::parse(name).unwrap();
        let record =
            ModuleRecord::assembly(&identity, kind, Arc::from(&b"MZ"[..]), Provenance::Compiled);
        if debug {
            record.with_debug_image(Some(Arc::from(&b"BSJB"[..])))
        } else {
            record
        }
    }

    #[test]
    fn dump_writes_in_memory_modules_and_log() -> Result<()> {
        let temp = TempDir::new()?;
        let service = DumpService::new(temp.path(), 10);
        let fixture = ModuleRecord::assembly(
            &AssemblyIdentity::parse("Fixture").unwrap(),
            OutputKind::Library,
            Arc::from(&b"MZ"[..]),
            Provenance::Supplied,
        );
        let part = ModuleRecord::net_module("Part.netmodule", Arc::from(&b"MZ"[..]), Provenance::Compiled);

        let directory = service
            .dump(&[
                compiled("App", OutputKind::ConsoleApplication, true),
                compiled("Lib", OutputKind::Library, false),
                part,
                fixture,
            ])?
            .unwrap();

        assert_eq!(directory, temp.path().join("0"));
        assert!(directory.join("App.exe").exists());
        assert!(directory.join("App.pdb").exists());
        assert!(directory.join("Lib.dll").exists());
        assert!(directory.join("Part.netmodule").exists());
        assert!(!directory.join("Fixture.dll").exists());

        let log = fs::read_to_string(directory.join(DUMP_LOG))?;
        assert!(log.contains("PE(ConsoleApplication): "));
        assert!(log.contains("PDB: "));
        assert_eq!(log.lines().count(), 4);
        Ok(())
    }

    #[test]
    fn dump_respects_limit() -> Result<()> {
        let temp = TempDir::new()?;
        let service = DumpService::new(temp.path(), 2);
        let modules = [compiled("App", OutputKind::Library, false)];

        assert_eq!(service.dump(&modules)?, Some(temp.path().join("0")));
        assert_eq!(service.dump(&modules)?, Some(temp.path().join("1")));
        assert_eq!(service.dump(&modules)?, None);
        assert_eq!(service.attempts(), 3);
        assert!(!temp.path().join("2").exists());
        Ok(())
    }

    #[test]
    fn disabled_service_writes_nothing() -> Result<()> {
        let service = DumpService::disabled();
        assert_eq!(service.dump(&[compiled("App", OutputKind::Library, false)])?, None);
        assert_eq!(service.attempts(), 0);
        Ok(())
    }
}
