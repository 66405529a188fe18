//! Pluggable persistence backend for the state stores.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chanvault_core::Result;

/// Named-blob persistence used by the state stores.
///
/// `save` replaces the named blob wholesale; there is no append. A crash
/// mid-write may lose that one save, which callers tolerate.
pub trait StateBackend: Send + Sync {
    /// Load the named blob, or `None` if it has never been saved.
    fn load(&self, name: &str) -> Result<Option<String>>;

    /// Atomically-enough replace the named blob with `contents`.
    fn save(&self, name: &str, contents: &str) -> Result<()>;
}

/// File-per-name backend rooted at a state directory.
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    /// Create a backend rooted at `dir`, creating the directory if absent.
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.txt"))
    }
}

impl StateBackend for FileBackend {
    fn load(&self, name: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path_for(name)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, name: &str, contents: &str) -> Result<()> {
        fs::write(self.path_for(name), contents)?;
        Ok(())
    }
}
