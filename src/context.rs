//! Provenance-aware diagnostic messages
//!
//! Every structural failure names where the offending file came from: the
//! workspace object, the shock node and filename, a download URL, a staging
//! path or a local path. Only the facts that are known are rendered; an
//! unknown field is left out rather than printed as a placeholder.
//!
//! Fields are always rendered in the same order and with the same labels:
//!
//! 1. `Workspace reads object {name} ({ref})`
//! 2. for each file: `Shock node {id}`, `Shock filename {name}`,
//!    `File URL {url}`, `Staging file name {path}`, `Path {path}`
//!
//! Files belonging to a pair get a `Forward ` / `Reverse ` prefix on each label.
//!
//! # Example
//!
//! ```
//! use readsutils::context::{ErrorContext, FileProvenance, ObjectRef};
//!
//! let context = ErrorContext::new()
//!     .with_object(ObjectRef::new("1/2/3").with_name("reads"))
//!     .with_file(FileProvenance::new().with_shock_node("abc").with_shock_filename("r.fq"));
//!
//! assert_eq!(
//!     context.render("Reading FASTQ record failed."),
//!     "Reading FASTQ record failed. Workspace reads object reads (1/2/3), \
//!      Shock node abc, Shock filename r.fq."
//! );
//! ```

use std::path::{Path, PathBuf};

/// Workspace object a reads file belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    /// Reference in `ws/obj/ver` form
    pub reference: String,
    /// Object name, when known
    pub name: Option<String>,
}

impl ObjectRef {
    /// Create an object reference without a name
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            name: None,
        }
    }

    /// Attach the object name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Identifying facts about where one physical file came from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileProvenance {
    /// Shock node id
    pub shock_node: Option<String>,
    /// Filename recorded by shock or the handle
    pub shock_filename: Option<String>,
    /// Source URL for web uploads
    pub file_url: Option<String>,
    /// Subdirectory path inside the user's staging area
    pub staging_path: Option<String>,
    /// Local path the file was read from
    pub local_path: Option<PathBuf>,
}

impl FileProvenance {
    /// Empty provenance
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the shock node id
    pub fn with_shock_node(mut self, node: impl Into<String>) -> Self {
        self.shock_node = Some(node.into());
        self
    }

    /// Set the shock or handle filename
    pub fn with_shock_filename(mut self, name: impl Into<String>) -> Self {
        self.shock_filename = Some(name.into());
        self
    }

    /// Set the optional shock or handle filename
    pub fn with_optional_shock_filename(mut self, name: Option<String>) -> Self {
        self.shock_filename = name;
        self
    }

    /// Set the source URL
    pub fn with_file_url(mut self, url: impl Into<String>) -> Self {
        self.file_url = Some(url.into());
        self
    }

    /// Set the staging file path
    pub fn with_staging_path(mut self, path: impl Into<String>) -> Self {
        self.staging_path = Some(path.into());
        self
    }

    /// Set the local path
    pub fn with_local_path(mut self, path: impl AsRef<Path>) -> Self {
        self.local_path = Some(path.as_ref().to_path_buf());
        self
    }

    fn push_fields(&self, prefix: &str, out: &mut Vec<String>) {
        if let Some(node) = &self.shock_node {
            out.push(format!("{prefix}Shock node {node}"));
        }
        if let Some(name) = &self.shock_filename {
            out.push(format!("{prefix}Shock filename {name}"));
        }
        if let Some(url) = &self.file_url {
            out.push(format!("{prefix}File URL {url}"));
        }
        if let Some(path) = &self.staging_path {
            out.push(format!("{prefix}Staging file name {path}"));
        }
        if let Some(path) = &self.local_path {
            out.push(format!("{prefix}Path {}", path.display()));
        }
    }
}

/// Which member of a pair a file is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Forward / left reads
    Forward,
    /// Reverse / right reads
    Reverse,
}

impl Side {
    fn label(&self) -> &'static str {
        match self {
            Side::Forward => "Forward ",
            Side::Reverse => "Reverse ",
        }
    }
}

/// Everything known about the inputs of one operation, for diagnostics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    object: Option<ObjectRef>,
    file: Option<FileProvenance>,
    forward: Option<FileProvenance>,
    reverse: Option<FileProvenance>,
}

impl ErrorContext {
    /// A context with nothing known
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the owning workspace object
    pub fn with_object(mut self, object: ObjectRef) -> Self {
        self.object = Some(object);
        self
    }

    /// Provenance of the single (unpaired) file
    pub fn with_file(mut self, file: FileProvenance) -> Self {
        self.file = Some(file);
        self
    }

    /// Provenance of one member of a pair
    pub fn with_side(mut self, side: Side, file: FileProvenance) -> Self {
        match side {
            Side::Forward => self.forward = Some(file),
            Side::Reverse => self.reverse = Some(file),
        }
        self
    }

    /// Narrow a paired context to one side
    ///
    /// The object is kept and the side's provenance becomes the unlabelled
    /// file, so errors about reading one file name only that file.
    pub fn side(&self, side: Side) -> ErrorContext {
        let file = match side {
            Side::Forward => self.forward.clone(),
            Side::Reverse => self.reverse.clone(),
        };
        ErrorContext {
            object: self.object.clone(),
            file: file.or_else(|| self.file.clone()),
            forward: None,
            reverse: None,
        }
    }

    /// The owning object, if known
    pub fn object(&self) -> Option<&ObjectRef> {
        self.object.as_ref()
    }

    /// Rendered fields in their stable order
    pub fn fields(&self) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(object) = &self.object {
            match &object.name {
                Some(name) => out.push(format!("Workspace reads object {name} ({})", object.reference)),
                None => out.push(format!("Workspace reads object {}", object.reference)),
            }
        }
        if let Some(file) = &self.file {
            file.push_fields("", &mut out);
        }
        if let Some(file) = &self.forward {
            file.push_fields(Side::Forward.label(), &mut out);
        }
        if let Some(file) = &self.reverse {
            file.push_fields(Side::Reverse.label(), &mut out);
        }
        out
    }

    /// Append the known fields to `base`
    ///
    /// The result is `"{base} {field}, {field}."`, or `base` alone (with a
    /// closing period) when nothing is known.
    pub fn render(&self, base: &str) -> String {
        let base = base.trim_end();
        let fields = self.fields();
        if fields.is_empty() {
            return terminate(base.to_string());
        }
        terminate(format!("{base} {}", fields.join(", ")))
    }
}

fn terminate(mut message: String) -> String {
    if !message.ends_with('.') {
        message.push('.');
    }
    message
}
