//! Host collaborators exposed as services.
//!
//! Programs never touch stdout or the file system directly; they resolve a
//! [`Console`] or a [`FileSystem`] from their context. Tests swap in the
//! log-backed console and the in-memory file system.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use parking_lot::RwLock;
use thiserror::Error;

use crate::context::Context;
use crate::effect::Effect;
use crate::error::Defect;
use crate::exit::ExitStatus;
use crate::key::Tag;
use crate::traits::Release;
use crate::Never;

/// Line-oriented output.
pub trait Console: Send + Sync {
    fn print_line(&self, line: &str) -> Effect<(), Never>;
}

/// Declaration of the console service.
pub const CONSOLE: Tag<dyn Console> = Tag::new("Console");

/// Console writing to standard output.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutConsole;

impl Console for StdoutConsole {
    fn print_line(&self, line: &str) -> Effect<(), Never> {
        let line = line.to_string();
        Effect::sync(move || println!("{}", line))
    }
}

/// Console writing to the run's side-channel log.
///
/// Lets tests assert on console output with
/// [`execute_expecting_log`](crate::testing::execute_expecting_log).
#[derive(Debug, Default, Clone, Copy)]
pub struct LogConsole;

impl Console for LogConsole {
    fn print_line(&self, line: &str) -> Effect<(), Never> {
        Effect::log(line)
    }
}

/// Prints `line` through the console service in context.
///
/// # Examples
///
/// ```
/// use ferrous_effect::host::{self, LogConsole};
/// use ferrous_effect::Runtime;
///
/// let program = host::print_line::<String>("First").provide(host::console(LogConsole));
/// let (_, logs) = Runtime::new().run_with_logs(&program);
/// assert_eq!(logs, vec!["First"]);
/// ```
pub fn print_line<E: 'static>(line: impl Into<String>) -> Effect<(), E> {
    let line: String = line.into();
    Effect::<(), Never>::service_with_effect(CONSOLE, move |console| console.print_line(&line)).widen()
}

/// Context binding [`CONSOLE`] to `console`.
pub fn console<C: Console + 'static>(console: C) -> Context {
    Context::make(CONSOLE, Arc::new(console) as Arc<dyn Console>)
}

/// Expected file-system failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FsError {
    #[error("File not found: {0}")]
    NotFound(String),
}

/// Opens files by path.
pub trait FileSystem: Send + Sync {
    fn open(&self, path: &str) -> Effect<FileHandle, FsError>;
}

/// Declaration of the file-system service.
pub const FILE_SYSTEM: Tag<dyn FileSystem> = Tag::new("FileSystem");

/// An open file.
///
/// Handles are cheap to clone; all clones share the open/closed state.
/// Reading through a handle after it was closed is a
/// [`Defect::UseAfterClose`], which is what happens when the handle escapes
/// the scope that owned it.
#[derive(Debug, Clone)]
pub struct FileHandle {
    inner: Arc<HandleInner>,
}

#[derive(Debug)]
struct HandleInner {
    fd: u32,
    path: String,
    contents: String,
    closed: AtomicBool,
}

impl FileHandle {
    fn new(fd: u32, path: &str, contents: String) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                fd,
                path: path.to_string(),
                contents,
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn fd(&self) -> u32 {
        self.inner.fd
    }

    pub fn path(&self) -> &str {
        &self.inner.path
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Reads the whole file.
    pub fn read_to_string<E: 'static>(&self) -> Effect<String, E> {
        let handle = self.clone();
        Effect::from_fiber(move |_| {
            if handle.is_closed() {
                crate::Exit::die(Defect::UseAfterClose(format!(
                    "file {} (fd {})",
                    handle.inner.path, handle.inner.fd
                )))
            } else {
                crate::Exit::succeed(handle.inner.contents.clone())
            }
        })
    }

    /// Closes the handle. Closing twice is harmless.
    pub fn close(&self) -> Effect<(), Never> {
        let handle = self.clone();
        Effect::sync(move || {
            handle.inner.closed.store(true, Ordering::Release);
        })
    }
}

impl Release for FileHandle {
    fn release(&self, _status: ExitStatus) -> Effect<(), Never> {
        self.close()
    }
}

/// File system backed by a map of paths to contents.
///
/// # Examples
///
/// Reading a handle after its scope closed:
///
/// ```
/// use ferrous_effect::host::{self, MemoryFileSystem};
/// use ferrous_effect::{Defect, Exit, Runtime};
///
/// let fs = MemoryFileSystem::new().with_file("notes.txt", "hello");
///
/// let escaped = host::open_file("notes.txt")
///     .scoped()
///     .flat_map(|handle| handle.read_to_string());
///
/// let exit = Runtime::new().run(&escaped.provide(host::file_system(fs)));
/// assert!(matches!(exit, Exit::Failure(ferrous_effect::Cause::Die(Defect::UseAfterClose(_)))));
/// ```
#[derive(Debug)]
pub struct MemoryFileSystem {
    files: RwLock<HashMap<String, String>>,
    next_fd: AtomicU32,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self {
            files: RwLock::new(HashMap::new()),
            next_fd: AtomicU32::new(3),
        }
    }

    pub fn with_file(self, path: impl Into<String>, contents: impl Into<String>) -> Self {
        self.files.write().insert(path.into(), contents.into());
        self
    }
}

impl Default for MemoryFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystem for MemoryFileSystem {
    fn open(&self, path: &str) -> Effect<FileHandle, FsError> {
        match self.files.read().get(path) {
            Some(contents) => {
                let fd = self.next_fd.fetch_add(1, Ordering::Relaxed);
                let handle = FileHandle::new(fd, path, contents.clone());
                Effect::succeed(handle)
            }
            None => Effect::fail(FsError::NotFound(path.to_string())),
        }
    }
}

/// Context binding [`FILE_SYSTEM`] to `fs`.
pub fn file_system<F: FileSystem + 'static>(fs: F) -> Context {
    Context::make(FILE_SYSTEM, Arc::new(fs) as Arc<dyn FileSystem>)
}

/// Opens `path` and closes the handle when the ambient scope closes.
pub fn open_file(path: impl Into<String>) -> Effect<FileHandle, FsError> {
    let path: String = path.into();
    let open = Effect::service_with_effect(FILE_SYSTEM, move |fs| fs.open(&path));
    Effect::acquire_release(open, |handle: FileHandle| handle.close())
}
