//! Dynamic library loading for `libjvm`
//!
//! Cross-platform support for loading shared libraries (.so, .dylib, .dll)

use std::ffi::CString;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during library loading
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    /// Library file not found or could not be loaded
    #[error("Library not found: {path}")]
    NotFound {
        /// Path that was attempted, with the platform loader's reason
        path: String,
    },

    /// Symbol not found in library
    #[error("Symbol not found: {symbol} in {library}")]
    SymbolNotFound {
        /// Symbol name that was not found
        symbol: String,
        /// Library path
        library: String,
    },

    /// Platform-specific error
    #[error("Platform error: {0}")]
    PlatformError(String),

    /// Invalid path encoding
    #[error("Invalid UTF-8 in path: {0}")]
    InvalidPath(String),
}

/// Cross-platform dynamic library handle
pub struct Library {
    handle: LibraryHandle,
    path: String,
}

impl Library {
    /// Load a dynamic library from the given path.
    ///
    /// # Platform-specific behavior
    ///
    /// - **Linux/macOS**: `dlopen(RTLD_NOW | RTLD_GLOBAL)`; `libjvm` resolves
    ///   its own companion libraries through the global namespace
    /// - **Windows**: `LoadLibraryW`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let path_ref = path.as_ref();
        let path_str = path_ref
            .to_str()
            .ok_or_else(|| LoadError::InvalidPath(format!("{:?}", path_ref)))?;

        let handle = LibraryHandle::load(path_str)?;

        Ok(Library {
            handle,
            path: path_str.to_string(),
        })
    }

    /// Get a function pointer by name.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    /// - The function signature matches the type T
    /// - The library remains loaded while using the function
    pub unsafe fn get<T: Copy>(&self, symbol: &str) -> Result<T, LoadError> {
        self.handle.symbol(symbol, &self.path)
    }

    /// Get the path this library was loaded from
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Library").field("path", &self.path).finish()
    }
}

#[cfg(unix)]
type LibraryHandle = UnixLibrary;

#[cfg(windows)]
type LibraryHandle = WindowsLibrary;

// ============================================================================
// Unix Implementation (Linux, macOS, BSD)
// ============================================================================

#[cfg(unix)]
struct UnixLibrary {
    handle: *mut std::ffi::c_void,
}

#[cfg(unix)]
impl UnixLibrary {
    fn load(path: &str) -> Result<Self, LoadError> {
        let c_path = CString::new(path)
            .map_err(|e| LoadError::PlatformError(format!("Invalid path: {}", e)))?;

        let handle = unsafe { libc::dlopen(c_path.as_ptr(), libc::RTLD_NOW | libc::RTLD_GLOBAL) };

        if handle.is_null() {
            return Err(LoadError::NotFound {
                path: format!("{}: {}", path, last_dl_error()),
            });
        }

        Ok(UnixLibrary { handle })
    }

    unsafe fn symbol<T: Copy>(&self, name: &str, lib_path: &str) -> Result<T, LoadError> {
        let c_name = CString::new(name)
            .map_err(|e| LoadError::PlatformError(format!("Invalid symbol name: {}", e)))?;

        // Clear any previous errors
        libc::dlerror();

        let symbol = libc::dlsym(self.handle, c_name.as_ptr());

        if symbol.is_null() {
            return Err(LoadError::SymbolNotFound {
                symbol: name.to_string(),
                library: format!("{}: {}", lib_path, last_dl_error()),
            });
        }

        Ok(std::mem::transmute_copy(&symbol))
    }
}

#[cfg(unix)]
fn last_dl_error() -> String {
    unsafe {
        let err_ptr = libc::dlerror();
        if err_ptr.is_null() {
            "Unknown error".to_string()
        } else {
            std::ffi::CStr::from_ptr(err_ptr)
                .to_string_lossy()
                .into_owned()
        }
    }
}

#[cfg(unix)]
impl Drop for UnixLibrary {
    fn drop(&mut self) {
        unsafe {
            libc::dlclose(self.handle);
        }
    }
}

#[cfg(unix)]
unsafe impl Send for UnixLibrary {}
#[cfg(unix)]
unsafe impl Sync for UnixLibrary {}

// ============================================================================
// Windows Implementation
// ============================================================================

#[cfg(windows)]
struct WindowsLibrary {
    handle: *mut std::ffi::c_void,
}

#[cfg(windows)]
impl WindowsLibrary {
    fn load(path: &str) -> Result<Self, LoadError> {
        use std::ffi::OsStr;
        use std::os::windows::ffi::OsStrExt;

        let wide: Vec<u16> = OsStr::new(path)
            .encode_wide()
            .chain(std::iter::once(0))
            .collect();

        let handle = unsafe { LoadLibraryW(wide.as_ptr()) };

        if handle.is_null() {
            let error = unsafe { GetLastError() };
            return Err(LoadError::NotFound {
                path: format!("{} (error code: {})", path, error),
            });
        }

        Ok(WindowsLibrary { handle })
    }

    unsafe fn symbol<T: Copy>(&self, name: &str, lib_path: &str) -> Result<T, LoadError> {
        let c_name = CString::new(name)
            .map_err(|e| LoadError::PlatformError(format!("Invalid symbol name: {}", e)))?;

        let symbol = GetProcAddress(self.handle, c_name.as_ptr());

        if symbol.is_null() {
            let error = GetLastError();
            return Err(LoadError::SymbolNotFound {
                symbol: name.to_string(),
                library: format!("{} (error code: {})", lib_path, error),
            });
        }

        Ok(std::mem::transmute_copy(&symbol))
    }
}

#[cfg(windows)]
impl Drop for WindowsLibrary {
    fn drop(&mut self) {
        unsafe {
            FreeLibrary(self.handle);
        }
    }
}

#[cfg(windows)]
unsafe impl Send for WindowsLibrary {}
#[cfg(windows)]
unsafe impl Sync for WindowsLibrary {}

#[cfg(windows)]
extern "system" {
    fn LoadLibraryW(filename: *const u16) -> *mut std::ffi::c_void;
    fn GetProcAddress(
        module: *mut std::ffi::c_void,
        procname: *const std::os::raw::c_char,
    ) -> *mut std::ffi::c_void;
    fn FreeLibrary(module: *mut std::ffi::c_void) -> i32;
    fn GetLastError() -> u32;
}
