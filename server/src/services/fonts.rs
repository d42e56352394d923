//! Font resolution for the PDF renderer.
//!
//! Branded fonts are optional assets. Resolution reads them once at startup
//! and substitutes the built-in Helvetica faces for anything missing or
//! unreadable, so rendering always has a usable style.

use printpdf::BuiltinFont;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const REGULAR_FILE: &str = "Roboto-Regular.ttf";
const BOLD_FILE: &str = "Roboto-Bold.ttf";

#[derive(Clone)]
pub enum FontFace {
    Branded { name: String, bytes: Arc<Vec<u8>> },
    Builtin(BuiltinFont),
}

impl fmt::Debug for FontFace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Branded { name, bytes } => f
                .debug_struct("Branded")
                .field("name", name)
                .field("len", &bytes.len())
                .finish(),
            Self::Builtin(font) => f.debug_tuple("Builtin").field(font).finish(),
        }
    }
}

impl FontFace {
    pub fn is_branded(&self) -> bool {
        matches!(self, Self::Branded { .. })
    }
}

/// Resolved style descriptor handed to the renderer.
#[derive(Debug, Clone)]
pub struct FontStyle {
    pub regular: FontFace,
    pub bold: FontFace,
}

impl FontStyle {
    pub fn builtin() -> Self {
        Self {
            regular: FontFace::Builtin(BuiltinFont::Helvetica),
            bold: FontFace::Builtin(BuiltinFont::HelveticaBold),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FontResolver {
    dir: PathBuf,
}

impl FontResolver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Never fails: each face falls back independently.
    pub fn resolve(&self) -> FontStyle {
        let style = FontStyle {
            regular: load_face(&self.dir.join(REGULAR_FILE), BuiltinFont::Helvetica),
            bold: load_face(&self.dir.join(BOLD_FILE), BuiltinFont::HelveticaBold),
        };
        tracing::info!(
            dir = %self.dir.display(),
            regular_branded = style.regular.is_branded(),
            bold_branded = style.bold.is_branded(),
            "resolved PDF fonts"
        );
        style
    }
}

fn load_face(path: &Path, fallback: BuiltinFont) -> FontFace {
    match std::fs::read(path) {
        Ok(bytes) if !bytes.is_empty() => FontFace::Branded {
            name: path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default(),
            bytes: Arc::new(bytes),
        },
        Ok(_) => {
            tracing::warn!(path = %path.display(), "font file is empty, using built-in face");
            FontFace::Builtin(fallback)
        }
        Err(err) => {
            tracing::debug!(path = %path.display(), error = %err, "font not available, using built-in face");
            FontFace::Builtin(fallback)
        }
    }
}
