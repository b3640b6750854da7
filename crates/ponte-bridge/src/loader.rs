//! Dynamic library loading for native bridge libraries
//!
//! Cross-platform support for loading shared libraries (.so, .dylib, .dll)
//! and looking up their exports by name. The rest of the bridge only sees
//! the [`SymbolSource`] trait, so an in-process table of function pointers
//! can stand in for a real library.

use std::ffi::{c_void, CStr, CString};
use std::path::Path;
use std::ptr::NonNull;

use thiserror::Error;

/// Errors that can occur while loading a library or resolving its exports
#[derive(Debug, Error)]
pub enum LoadError {
    /// Library file not found or could not be loaded
    #[error("Library not found: {path}")]
    NotFound {
        /// Path that was attempted, with the platform's reason
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

/// Anything that can hand out export addresses by name.
pub trait SymbolSource {
    /// Display name of the library (its path for real libraries)
    fn name(&self) -> &str;

    /// Address of the export named `symbol`
    fn symbol_address(&self, symbol: &str) -> Result<NonNull<c_void>, LoadError>;

    /// Release the library. Returns whether the platform reported success.
    fn unload(self: Box<Self>) -> bool;
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
    /// - **Linux/macOS**: `dlopen(RTLD_NOW | RTLD_LOCAL)`
    /// - **Windows**: `LoadLibraryW`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let path_ref = path.as_ref();
        let path_str = path_ref
            .to_str()
            .ok_or_else(|| LoadError::InvalidPath(format!("{:?}", path_ref)))?;

        let handle = LibraryHandle::load(path_str)?;
        log::debug!("Loaded native library {}", path_str);

        Ok(Library {
            handle,
            path: path_str.to_string(),
        })
    }

    /// Get the path this library was loaded from
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Check whether `symbol` is exported
    pub fn has_symbol(&self, symbol: &str) -> bool {
        self.handle.symbol(symbol, &self.path).is_ok()
    }

    /// Close the library, reporting whether the platform call succeeded.
    pub fn close(mut self) -> bool {
        let closed = self.handle.close();
        if closed {
            log::debug!("Unloaded native library {}", self.path);
        } else {
            log::warn!("Platform refused to unload {}", self.path);
        }
        closed
    }
}

impl SymbolSource for Library {
    fn name(&self) -> &str {
        &self.path
    }

    fn symbol_address(&self, symbol: &str) -> Result<NonNull<c_void>, LoadError> {
        self.handle.symbol(symbol, &self.path)
    }

    fn unload(self: Box<Self>) -> bool {
        (*self).close()
    }
}

impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Library").field("path", &self.path).finish()
    }
}

fn symbol_name(name: &str) -> Result<CString, LoadError> {
    CString::new(name).map_err(|e| LoadError::PlatformError(format!("Invalid symbol name: {}", e)))
}

// Platform-specific implementations

#[cfg(unix)]
type LibraryHandle = UnixLibrary;

#[cfg(windows)]
type LibraryHandle = WindowsLibrary;

// ============================================================================
// Unix Implementation (Linux, macOS, BSD)
// ============================================================================

#[cfg(unix)]
struct UnixLibrary {
    handle: *mut c_void,
}

#[cfg(unix)]
impl UnixLibrary {
    fn load(path: &str) -> Result<Self, LoadError> {
        let c_path = CString::new(path)
            .map_err(|e| LoadError::PlatformError(format!("Invalid path: {}", e)))?;

        // RTLD_LOCAL keeps the native library's symbols out of later loads
        let handle = unsafe { libc::dlopen(c_path.as_ptr(), libc::RTLD_NOW | libc::RTLD_LOCAL) };

        if handle.is_null() {
            return Err(LoadError::NotFound {
                path: format!("{}: {}", path, last_dl_error()),
            });
        }

        Ok(UnixLibrary { handle })
    }

    fn symbol(&self, name: &str, lib_path: &str) -> Result<NonNull<c_void>, LoadError> {
        if self.handle.is_null() {
            return Err(LoadError::PlatformError(format!("{} is closed", lib_path)));
        }
        let c_name = symbol_name(name)?;

        let symbol = unsafe {
            libc::dlerror();
            libc::dlsym(self.handle, c_name.as_ptr())
        };

        NonNull::new(symbol).ok_or_else(|| LoadError::SymbolNotFound {
            symbol: name.to_string(),
            library: format!("{}: {}", lib_path, last_dl_error()),
        })
    }

    fn close(&mut self) -> bool {
        if self.handle.is_null() {
            return false;
        }
        let rc = unsafe { libc::dlclose(self.handle) };
        self.handle = std::ptr::null_mut();
        rc == 0
    }
}

#[cfg(unix)]
fn last_dl_error() -> String {
    unsafe {
        let err_ptr = libc::dlerror();
        if err_ptr.is_null() {
            "Unknown error".to_string()
        } else {
            CStr::from_ptr(err_ptr).to_string_lossy().into_owned()
        }
    }
}

#[cfg(unix)]
impl Drop for UnixLibrary {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(unix)]
unsafe impl Send for UnixLibrary {}

// ============================================================================
// Windows Implementation
// ============================================================================

#[cfg(windows)]
struct WindowsLibrary {
    handle: *mut c_void,
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

    fn symbol(&self, name: &str, lib_path: &str) -> Result<NonNull<c_void>, LoadError> {
        if self.handle.is_null() {
            return Err(LoadError::PlatformError(format!("{} is closed", lib_path)));
        }
        let c_name = symbol_name(name)?;

        let symbol = unsafe { GetProcAddress(self.handle, c_name.as_ptr()) };

        NonNull::new(symbol).ok_or_else(|| {
            let error = unsafe { GetLastError() };
            LoadError::SymbolNotFound {
                symbol: name.to_string(),
                library: format!("{} (error code: {})", lib_path, error),
            }
        })
    }

    fn close(&mut self) -> bool {
        if self.handle.is_null() {
            return false;
        }
        let rc = unsafe { FreeLibrary(self.handle) };
        self.handle = std::ptr::null_mut();
        rc != 0
    }
}

#[cfg(windows)]
impl Drop for WindowsLibrary {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(windows)]
unsafe impl Send for WindowsLibrary {}

#[cfg(windows)]
extern "system" {
    fn LoadLibraryW(filename: *const u16) -> *mut c_void;
    fn GetProcAddress(module: *mut c_void, procname: *const std::ffi::c_char) -> *mut c_void;
    fn FreeLibrary(module: *mut c_void) -> i32;
    fn GetLastError() -> u32;
}
