use anyhow::Result;

/// The single browser-local / file-local entry holding the API key.
pub const CREDENTIAL_KEY: &str = "gemini_api_key";

#[cfg(target_arch = "wasm32")]
pub trait KeyStoreBounds {}
#[cfg(target_arch = "wasm32")]
impl<T> KeyStoreBounds for T {}

#[cfg(not(target_arch = "wasm32"))]
pub trait KeyStoreBounds: Send + Sync {}
#[cfg(not(target_arch = "wasm32"))]
impl<T: Send + Sync> KeyStoreBounds for T {}

/// Persistence for the one credential string. An absent entry means the
/// application is in credential-required mode.
pub trait KeyStore: KeyStoreBounds {
    fn load(&self) -> Option<String>;
    fn store(&self, key: &str) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

// --- Native Implementation ---

#[cfg(not(target_arch = "wasm32"))]
pub struct FileKeyStore {
    path: std::path::PathBuf,
}

#[cfg(not(target_arch = "wasm32"))]
impl FileKeyStore {
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl KeyStore for FileKeyStore {
    fn load(&self) -> Option<String> {
        let content = std::fs::read_to_string(&self.path).ok()?;
        let key = content.trim();
        if key.is_empty() {
            None
        } else {
            Some(key.to_string())
        }
    }

    fn store(&self, key: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, key)?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

// --- Web Implementation ---

#[cfg(target_arch = "wasm32")]
pub struct WebKeyStore;

#[cfg(target_arch = "wasm32")]
impl WebKeyStore {
    pub fn new() -> Self {
        Self
    }

    fn local_storage() -> Option<web_sys::Storage> {
        web_sys::window()?.local_storage().ok()?
    }
}

#[cfg(target_arch = "wasm32")]
impl KeyStore for WebKeyStore {
    fn load(&self) -> Option<String> {
        let storage = Self::local_storage()?;
        let value = storage.get_item(CREDENTIAL_KEY).ok()??;
        let key = value.trim();
        if key.is_empty() {
            None
        } else {
            Some(key.to_string())
        }
    }

    fn store(&self, key: &str) -> Result<()> {
        let storage = Self::local_storage()
            .ok_or_else(|| anyhow::anyhow!("localStorage unavailable"))?;
        storage
            .set_item(CREDENTIAL_KEY, key)
            .map_err(|e| anyhow::anyhow!("localStorage write failed: {:?}", e))?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let storage = Self::local_storage()
            .ok_or_else(|| anyhow::anyhow!("localStorage unavailable"))?;
        storage
            .remove_item(CREDENTIAL_KEY)
            .map_err(|e| anyhow::anyhow!("localStorage remove failed: {:?}", e))?;
        Ok(())
    }
}

// --- In-Memory Implementation ---

/// Non-persistent store, used by tests and as a fallback.
#[derive(Default)]
pub struct MemoryKeyStore {
    key: std::sync::Mutex<Option<String>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(key: &str) -> Self {
        Self {
            key: std::sync::Mutex::new(Some(key.to_string())),
        }
    }
}

impl KeyStore for MemoryKeyStore {
    fn load(&self) -> Option<String> {
        self.key.lock().unwrap().clone()
    }

    fn store(&self, key: &str) -> Result<()> {
        *self.key.lock().unwrap() = Some(key.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.key.lock().unwrap() = None;
        Ok(())
    }
}
