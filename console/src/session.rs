use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;
use tracing::{debug, info, warn};

use shared::types::{LoginResponse, Session, SessionEmployee, SessionUser};

/// Where a controller sends the user when it cannot stay on its page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Login,
    Dashboard,
    /// The employee list, after a record went missing.
    Employees,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session storage I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("session file is corrupt: {0}")]
    Json(#[from] serde_json::Error),

    #[error("session storage lock poisoned")]
    Poisoned,
}

// ---------------------------------------------------------------------------
// Storage backends
// ---------------------------------------------------------------------------

/// Persistence seam for the session.
pub trait SessionStorage {
    fn load(&self) -> Result<Option<Session>, SessionError>;
    fn save(&self, session: &Session) -> Result<(), SessionError>;
    fn clear(&self) -> Result<(), SessionError>;
}

/// JSON file on disk. A missing file means "no session".
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStorage for FileStorage {
    fn load(&self) -> Result<Option<Session>, SessionError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, session: &Session) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let bytes = serde_json::to_vec_pretty(session)?;

        // The file holds the bearer token: owner read/write only.
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&self.path)?;
        #[cfg(unix)]
        {
            // `mode` only applies on creation; tighten a file left by older runs.
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(0o600))?;
        }
        file.write_all(&bytes)?;

        debug!("Session written to {}", self.path.display());
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Process-local storage.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    slot: Mutex<Option<Session>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for MemoryStorage {
    fn load(&self) -> Result<Option<Session>, SessionError> {
        Ok(self.slot.lock().map_err(|_| SessionError::Poisoned)?.clone())
    }

    fn save(&self, session: &Session) -> Result<(), SessionError> {
        *self.slot.lock().map_err(|_| SessionError::Poisoned)? = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        *self.slot.lock().map_err(|_| SessionError::Poisoned)? = None;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Session store
// ---------------------------------------------------------------------------

/// The one owner of the bearer token and cached profile.
///
/// Every 401 seen anywhere goes through [`SessionStore::invalidate`].
#[derive(Debug)]
pub struct SessionStore<S: SessionStorage> {
    storage: S,
    session: Option<Session>,
    invalidations: usize,
}

impl<S: SessionStorage> SessionStore<S> {
    /// Load whatever session the storage already holds.
    pub fn open(storage: S) -> Result<Self, SessionError> {
        let session = storage.load()?;
        Ok(Self {
            storage,
            session,
            invalidations: 0,
        })
    }

    pub fn set_session(
        &mut self,
        token: String,
        user: SessionUser,
        employee: Option<SessionEmployee>,
    ) -> Result<(), SessionError> {
        let session = Session {
            token,
            user,
            employee,
        };
        self.storage.save(&session)?;
        info!("Signed in as {}", session.user);
        self.session = Some(session);
        Ok(())
    }

    pub fn sign_in(&mut self, login: LoginResponse) -> Result<(), SessionError> {
        self.set_session(login.access_token, login.user, login.employee)
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn token(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.token.as_str())
    }

    pub fn user(&self) -> Option<&SessionUser> {
        self.session.as_ref().map(|s| &s.user)
    }

    pub fn employee(&self) -> Option<&SessionEmployee> {
        self.session.as_ref().and_then(|s| s.employee.as_ref())
    }

    /// The token, or where to go instead. No network call is made either way.
    pub fn require_token(&self) -> Result<String, Navigation> {
        self.token().map(str::to_string).ok_or(Navigation::Login)
    }

    /// Remove every persisted session field.
    pub fn clear(&mut self) -> Result<(), SessionError> {
        self.session = None;
        self.storage.clear()
    }

    /// Drop a session the backend no longer accepts and send the user to
    /// login. Storage failures are logged, never surfaced.
    pub fn invalidate(&mut self) -> Navigation {
        self.invalidations += 1;
        warn!("Session rejected by the backend, signing out");
        if let Err(e) = self.clear() {
            warn!("Failed to clear stored session: {}", e);
        }
        Navigation::Login
    }

    /// How many times [`SessionStore::invalidate`] has run in this process.
    pub fn invalidations(&self) -> usize {
        self.invalidations
    }

    /// `Cookie` header value mirroring the token for page navigation.
    pub fn cookie_header(&self, cookie_name: &str) -> Option<String> {
        self.token().map(|t| format!("{}={}", cookie_name, t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::types::Role;

    fn user() -> SessionUser {
        SessionUser {
            id: 1,
            email: "hr@example.com".into(),
            role: Role::Hr,
        }
    }

    #[test]
    fn no_session_requires_login() {
        let store = SessionStore::open(MemoryStorage::new()).unwrap();
        assert_eq!(store.require_token(), Err(Navigation::Login));
        assert!(store.cookie_header("token").is_none());
    }

    #[test]
    fn set_session_then_read_back() {
        let mut store = SessionStore::open(MemoryStorage::new()).unwrap();
        store.set_session("t0k".into(), user(), None).unwrap();
        assert_eq!(store.token(), Some("t0k"));
        assert_eq!(store.require_token(), Ok("t0k".to_string()));
        assert_eq!(store.user().unwrap().role, Role::Hr);
        assert_eq!(store.cookie_header("token").as_deref(), Some("token=t0k"));
    }

    #[test]
    fn invalidate_clears_everything() {
        let mut store = SessionStore::open(MemoryStorage::new()).unwrap();
        store.set_session("t0k".into(), user(), None).unwrap();
        assert_eq!(store.invalidate(), Navigation::Login);
        assert!(store.session().is_none());
        assert!(store.storage.load().unwrap().is_none());
        assert_eq!(store.invalidations(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn session_file_is_private_to_the_owner() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, b"{}").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        let mut store = SessionStore {
            storage: FileStorage::new(&path),
            session: None,
            invalidations: 0,
        };
        store.set_session("t0k".into(), user(), None).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
        assert_eq!(store.storage.load().unwrap().unwrap().token, "t0k");
    }

    #[cfg(unix)]
    #[test]
    fn new_session_file_is_created_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");
        let mut store = SessionStore::open(FileStorage::new(&path)).unwrap();
        store.set_session("t0k".into(), user(), None).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[test]
    fn clearing_a_missing_file_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("session.json"));
        assert!(storage.clear().is_ok());
    }
}
