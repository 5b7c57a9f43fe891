use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Account credentials of one update cycle plus the cached bearer token.
#[derive(Clone, PartialEq)]
pub struct Session {
    pub email: String,
    pub password: String,
    pub token: Option<String>,
}

impl Session {
    pub fn new(email: &str, password: &str, token: Option<String>) -> Self {
        Session {
            email: email.to_owned(),
            password: password.to_owned(),
            token: token.filter(|t| !t.is_empty()),
        }
    }

    /// Blank email or password means the account is not set up yet.
    pub fn is_configured(&self) -> bool {
        !self.email.trim().is_empty() && !self.password.is_empty()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("email", &self.email)
            .field("password", &"********")
            .field("token", &self.token.as_ref().map(|_| "********"))
            .finish()
    }
}

/// Persistent buffer holding the bearer token between cycles and restarts.
pub trait TokenStore: Send + Sync {
    fn get(&self) -> Option<String>;
    fn set(&self, token: &str);
    /// Drop the stored token if it is still `token`. Returns whether it did.
    fn clear_if(&self, token: &str) -> bool;
}

#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new(token: Option<&str>) -> Self {
        MemoryTokenStore {
            token: Mutex::new(token.map(String::from)),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> Option<String> {
        self.token.lock().ok().and_then(|t| t.clone())
    }

    fn set(&self, token: &str) {
        if let Ok(mut t) = self.token.lock() {
            *t = Some(token.to_owned());
        }
    }

    fn clear_if(&self, token: &str) -> bool {
        match self.token.lock() {
            Ok(mut t) if t.as_deref() == Some(token) => {
                *t = None;
                true
            }
            _ => false,
        }
    }
}

/// Token buffer backed by a single-line text file.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    cache: MemoryTokenStore,
}

impl FileTokenStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let token = match fs::read_to_string(&path) {
            Ok(s) => Some(s.trim().to_owned()).filter(|t| !t.is_empty()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                log::warn!("Unable to read token from {}: {}", path.display(), e);
                None
            }
        };

        FileTokenStore {
            path,
            cache: MemoryTokenStore::new(token.as_deref()),
        }
    }

    fn write(&self, contents: &str) {
        if let Err(e) = fs::write(&self.path, contents) {
            log::warn!("Unable to write token to {}: {}", self.path.display(), e);
        }
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self) -> Option<String> {
        self.cache.get()
    }

    fn set(&self, token: &str) {
        self.cache.set(token);
        self.write(token);
    }

    fn clear_if(&self, token: &str) -> bool {
        let cleared = self.cache.clear_if(token);
        if cleared {
            self.write("");
        }
        cleared
    }
}
