use backtrace::Symbol;
use serde::Serialize;
use std::{fmt, panic::Location, path::Path, slice, sync::Arc};

/// Maximum number of frames kept in a [`CallStack`].
pub const MAX_FRAMES: usize = 64;

/// Path prefixes of symbols that belong to the rust runtime,
/// the test harness or the stack walker itself.
const RUNTIME_PREFIXES: &[&str] = &[
    "std::",
    "core::",
    "alloc::",
    "test::",
    "backtrace::",
    "__rust",
];

/// Symbols of C runtime entry points and thread trampolines.
const ENTRY_POINTS: &[&str] = &[
    "main",
    "_start",
    "start_thread",
    "clone",
    "clone3",
    "__clone",
    "__clone3",
    "thread_start",
    "_pthread_start",
    "BaseThreadInitThunk",
    "RtlUserThreadStart",
];

/// Source directories of the standard library and the test harness.
const TOOLCHAIN_DIRS: &[&str] = &[
    "/rustc/",
    "\\rustc\\",
    "/rustlib/src/",
    "/library/std/src/",
    "/library/core/src/",
    "/library/alloc/src/",
    "/library/test/src/",
];

/// Source directories of downloaded dependencies.
const DEPENDENCY_DIRS: &[&str] = &[".cargo/registry/", ".cargo\\registry\\", ".cargo/git/"];

/// Symbol prefix of the frames belonging to this crate.
const CRATE_PREFIX: &str = concat!(env!("CARGO_CRATE_NAME"), "::");

/// A single frame of a [`CallStack`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Frame {
    #[serde(skip_serializing_if = "Option::is_none")]
    function: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    column: Option<u32>,
}

impl Frame {
    fn from_location(location: &Location<'_>) -> Self {
        Self {
            function: None,
            file: Some(location.file().to_owned()),
            line: Some(location.line()),
            column: Some(location.column()),
        }
    }

    fn from_symbol(symbol: &Symbol) -> Self {
        Self {
            function: symbol.name().map(|name| format!("{name:#}")),
            file: symbol.filename().map(|path| path.display().to_string()),
            line: symbol.lineno(),
            column: symbol.colno(),
        }
    }

    /// Name of the function this frame belongs to, if it could be resolved.
    #[must_use]
    pub fn function(&self) -> Option<&str> {
        self.function.as_deref()
    }

    /// Source file of this frame, if known.
    #[must_use]
    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    /// Source line of this frame, if known.
    #[must_use]
    pub fn line(&self) -> Option<u32> {
        self.line
    }

    /// Source column of this frame, if known.
    #[must_use]
    pub fn column(&self) -> Option<u32> {
        self.column
    }

    fn is_at(&self, location: &Location<'_>) -> bool {
        self.line == Some(location.line())
            && self
                .file
                .as_deref()
                .is_some_and(|file| Path::new(file).ends_with(location.file()))
    }

    /// A frame is part of the runtime if its source lives in the toolchain,
    /// or, when its source is unknown or a downloaded dependency, if its
    /// symbol belongs to one of the runtime crates.
    fn is_runtime(&self) -> bool {
        let function = self.function.as_deref();
        if function.is_some_and(is_entry_point) {
            return true;
        }
        match self.file.as_deref() {
            Some(file) if is_toolchain_source(file) => true,
            Some(file) if !is_dependency_source(file) => false,
            _ => function.is_some_and(is_runtime_symbol),
        }
    }

    fn is_internal(&self) -> bool {
        self.function
            .as_deref()
            .map(owning_path)
            .is_some_and(|path| path.starts_with(CRATE_PREFIX) && !path.contains("::tests::"))
    }
}

fn is_entry_point(name: &str) -> bool {
    ENTRY_POINTS.contains(&name) || name.starts_with("__libc_start")
}

fn is_runtime_symbol(name: &str) -> bool {
    let path = owning_path(name);
    RUNTIME_PREFIXES
        .iter()
        .any(|prefix| path.starts_with(prefix))
}

fn is_toolchain_source(file: &str) -> bool {
    TOOLCHAIN_DIRS.iter().any(|dir| file.contains(dir))
}

fn is_dependency_source(file: &str) -> bool {
    DEPENDENCY_DIRS.iter().any(|dir| file.contains(dir))
}

/// Returns the path a symbol is defined under.
///
/// For trait impls (`<Type as Trait>::method`) this is the path of the trait,
/// for inherent impls (`<Type>::method`) the path of the type and for
/// anything else the symbol itself.
fn owning_path(name: &str) -> &str {
    let Some(inner) = name.strip_prefix('<') else {
        return name;
    };
    let mut depth = 0usize;
    for (i, c) in inner.char_indices() {
        match c {
            '<' => depth += 1,
            // `->` of fn pointer types
            '>' if inner[..i].ends_with('-') => {}
            '>' if depth == 0 => break,
            '>' => depth -= 1,
            ' ' if depth == 0 && inner[i..].starts_with(" as ") => return &inner[i + 4..],
            _ => {}
        }
    }
    inner
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            write!(f, "{} (", self.function().unwrap_or("<unknown>"))?;
        }
        match (self.file(), self.line) {
            (Some(file), Some(line)) => write!(f, "{file}:{line}")?,
            (Some(file), None) => f.write_str(file)?,
            (None, _) => f.write_str("<unknown>")?,
        }
        if f.alternate() {
            if let Some(column) = self.column {
                write!(f, ":{column}")?;
            }
            f.write_str(")")?;
        }
        Ok(())
    }
}

/// Immutable snapshot of the call frames active when an
/// [`Error`](crate::Error) was wrapped, or re-stacked.
///
/// The topmost frame is always the call site of the operation
/// that captured the stack. Frames of the rust runtime and of this
/// crate are trimmed.
///
/// Cloning a [`CallStack`] is cheap, the frames are shared.
#[derive(Clone, PartialEq, Eq)]
pub struct CallStack {
    frames: Arc<[Frame]>,
}

impl CallStack {
    /// Capture the current call stack, with the caller as topmost frame.
    #[track_caller]
    #[must_use]
    pub fn capture() -> Self {
        Self::capture_at(Location::caller())
    }

    fn capture_at(origin: &Location<'_>) -> Self {
        let mut trace = Vec::new();
        backtrace::trace(|frame| {
            trace.push(frame.clone());
            true
        });

        // symbols are resolved lazily, frame by frame, until the stack is full
        let resolved = trace.iter().flat_map(|frame| {
            let mut symbols = Vec::new();
            backtrace::resolve_frame(frame, |symbol| symbols.push(Frame::from_symbol(symbol)));
            symbols
        });
        Self::from_resolved(origin, resolved)
    }

    fn from_resolved(origin: &Location<'_>, mut resolved: impl Iterator<Item = Frame>) -> Self {
        let mut above = Vec::new();
        let mut caller = None;
        for frame in resolved.by_ref() {
            if frame.is_at(origin) {
                caller = Some(frame);
                break;
            }
            above.push(frame);
        }

        let mut top = Frame::from_location(origin);
        let mut frames = Vec::with_capacity(MAX_FRAMES);
        match caller {
            Some(caller) => {
                top.function = caller.function;
                frames.push(top);
                let below = resolved.filter(|frame| !frame.is_runtime());
                frames.extend(below.take(MAX_FRAMES - 1));
            }
            None => {
                // no debug info to line the caller up with, rely on symbol names only
                let mut below = above
                    .into_iter()
                    .skip_while(|frame| frame.is_runtime() || frame.is_internal())
                    .filter(|frame| !frame.is_runtime());
                // the first frame left is the caller itself
                if let Some(caller) = below.next() {
                    top.function = caller.function;
                }
                frames.push(top);
                frames.extend(below.take(MAX_FRAMES - 1));
            }
        }

        Self {
            frames: Arc::from(frames),
        }
    }

    /// Returns the topmost frame, the call site of the capture.
    #[must_use]
    pub fn top(&self) -> Option<&Frame> {
        self.frames.first()
    }

    /// Returns all frames, topmost first.
    #[must_use]
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Iterate over the frames, topmost first.
    pub fn iter(&self) -> slice::Iter<'_, Frame> {
        self.frames.iter()
    }

    /// Returns the number of frames.
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Returns true if no frames were captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Returns true if both stacks share the same frames in memory.
    #[must_use]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.frames, &b.frames)
    }
}

impl<'a> IntoIterator for &'a CallStack {
    type Item = &'a Frame;
    type IntoIter = slice::Iter<'a, Frame>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Debug for CallStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.frames.iter()).finish()
    }
}

/// `[a.rs:1 b.rs:2]`, or one frame per line in alternate mode.
impl fmt::Display for CallStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            for (i, frame) in self.frames.iter().enumerate() {
                if i > 0 {
                    writeln!(f)?;
                }
                write!(f, "{i:>4}: {frame:#}")?;
            }
            return Ok(());
        }

        f.write_str("[")?;
        for (i, frame) in self.frames.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{frame}")?;
        }
        f.write_str("]")
    }
}

impl Serialize for CallStack {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.frames.iter())
    }
}
