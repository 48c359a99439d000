//! Session context for the external-component codec.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{ExtCompError, ExtCompResult};

/// Default rollover threshold of an external-component file in bytes.
pub const DEFAULT_SEGMENT_SIZE: u64 = i32::MAX as u64;

/// Default file name stem of written external-component files.
pub const DEFAULT_FILENAME_STEM: &str = "extcomp";

/// How local column values are presented to readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueMatrixMode {
    /// Generation parameters are applied to raw values.
    #[default]
    Calculated,
    /// Raw values are returned as stored.
    Storage,
}

impl fmt::Display for ValueMatrixMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueMatrixMode::Calculated => f.write_str("CALCULATED"),
            ValueMatrixMode::Storage => f.write_str("STORAGE"),
        }
    }
}

impl FromStr for ValueMatrixMode {
    type Err = ExtCompError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("CALCULATED") {
            Ok(ValueMatrixMode::Calculated)
        } else if s.eq_ignore_ascii_case("STORAGE") {
            Ok(ValueMatrixMode::Storage)
        } else {
            Err(ExtCompError::bad_parameter(format!(
                "unknown value matrix mode '{}'",
                s
            )))
        }
    }
}

/// Context parameters of a codec session.
///
/// # Example
///
/// ```rust
/// use atfx_extcomp::{SessionContext, ValueMatrixMode};
///
/// let context = SessionContext::builder()
///     .with_file_root("/data/run42")
///     .with_segment_size(64 * 1024 * 1024)
///     .with_valuematrix_mode(ValueMatrixMode::Storage)
///     .build();
/// assert_eq!(context.ext_comp_filename_stem, "extcomp");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    /// Base directory of relative file references.
    pub file_root: PathBuf,
    /// Size in bytes after which writes roll over to the next numbered file.
    pub ext_comp_segsize: u64,
    /// Raw or calculated presentation of local column values.
    pub valuematrix_mode: ValueMatrixMode,
    /// Stem of written file names, e.g. `extcomp` for `extcomp_1.btf`.
    pub ext_comp_filename_stem: String,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self {
            file_root: PathBuf::from("."),
            ext_comp_segsize: DEFAULT_SEGMENT_SIZE,
            valuematrix_mode: ValueMatrixMode::default(),
            ext_comp_filename_stem: DEFAULT_FILENAME_STEM.to_string(),
        }
    }
}

impl SessionContext {
    /// Creates a new builder for SessionContext.
    pub fn builder() -> SessionContextBuilder {
        SessionContextBuilder::default()
    }

    /// Parses exchange-format context parameters.
    ///
    /// Recognized keys (case-insensitive) are `FILE_ROOT`,
    /// `EXT_COMP_SEGSIZE`, `VALUEMATRIX_MODE` and `EXT_COMP_FILENAME`; other
    /// keys are ignored. An `EXT_COMP_FILENAME` with an extension contributes
    /// its stem only.
    pub fn from_params<'a, I>(params: I) -> ExtCompResult<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut builder = Self::builder();
        for (key, value) in params {
            let value = value.trim();
            match key.to_ascii_uppercase().as_str() {
                "FILE_ROOT" => builder = builder.with_file_root(value),
                "EXT_COMP_SEGSIZE" => {
                    let size = value.parse::<u64>().map_err(|_| {
                        ExtCompError::bad_parameter(format!(
                            "EXT_COMP_SEGSIZE must be a positive integer, got '{}'",
                            value
                        ))
                    })?;
                    if size == 0 {
                        return Err(ExtCompError::bad_parameter("EXT_COMP_SEGSIZE must not be 0"));
                    }
                    builder = builder.with_segment_size(size);
                }
                "VALUEMATRIX_MODE" => builder = builder.with_valuematrix_mode(value.parse()?),
                "EXT_COMP_FILENAME" => {
                    let stem = Path::new(value)
                        .file_stem()
                        .and_then(|s| s.to_str())
                        .filter(|s| !s.is_empty())
                        .ok_or_else(|| {
                            ExtCompError::bad_parameter(format!(
                                "invalid EXT_COMP_FILENAME '{}'",
                                value
                            ))
                        })?;
                    builder = builder.with_filename_stem(stem);
                }
                _ => {}
            }
        }
        Ok(builder.build())
    }

    /// Resolves a file reference against the file root.
    ///
    /// Absolute paths are returned unchanged; a `file:` URL scheme is stripped.
    pub fn resolve(&self, url: &str) -> PathBuf {
        let path = url
            .strip_prefix("file://")
            .or_else(|| url.strip_prefix("file:"))
            .unwrap_or(url);
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.file_root.join(path)
        }
    }
}

/// Builder for SessionContext.
#[derive(Debug, Clone, Default)]
pub struct SessionContextBuilder {
    file_root: Option<PathBuf>,
    ext_comp_segsize: Option<u64>,
    valuematrix_mode: Option<ValueMatrixMode>,
    ext_comp_filename_stem: Option<String>,
}

impl SessionContextBuilder {
    /// Sets the base directory of relative file references.
    pub fn with_file_root(mut self, file_root: impl Into<PathBuf>) -> Self {
        self.file_root = Some(file_root.into());
        self
    }

    /// Sets the rollover threshold in bytes.
    pub fn with_segment_size(mut self, bytes: u64) -> Self {
        self.ext_comp_segsize = Some(bytes);
        self
    }

    /// Sets the value matrix mode.
    pub fn with_valuematrix_mode(mut self, mode: ValueMatrixMode) -> Self {
        self.valuematrix_mode = Some(mode);
        self
    }

    /// Sets the stem of written file names.
    pub fn with_filename_stem(mut self, stem: impl Into<String>) -> Self {
        self.ext_comp_filename_stem = Some(stem.into());
        self
    }

    /// Builds the SessionContext.
    pub fn build(self) -> SessionContext {
        let defaults = SessionContext::default();
        SessionContext {
            file_root: self.file_root.unwrap_or(defaults.file_root),
            ext_comp_segsize: self.ext_comp_segsize.unwrap_or(defaults.ext_comp_segsize),
            valuematrix_mode: self.valuematrix_mode.unwrap_or(defaults.valuematrix_mode),
            ext_comp_filename_stem: self
                .ext_comp_filename_stem
                .unwrap_or(defaults.ext_comp_filename_stem),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_context() {
        let context = SessionContext::default();
        assert_eq!(context.ext_comp_segsize, 2_147_483_647);
        assert_eq!(context.valuematrix_mode, ValueMatrixMode::Calculated);
        assert_eq!(context.ext_comp_filename_stem, "extcomp");
    }

    #[test]
    fn test_from_params() {
        let context = SessionContext::from_params([
            ("FILE_ROOT", "/data"),
            ("ext_comp_segsize", "1024"),
            ("VALUEMATRIX_MODE", "storage"),
            ("EXT_COMP_FILENAME", "run42.btf"),
            ("WRITE_EXTERNALCOMPONENTS", "TRUE"),
        ])
        .unwrap();
        assert_eq!(context.file_root, PathBuf::from("/data"));
        assert_eq!(context.ext_comp_segsize, 1024);
        assert_eq!(context.valuematrix_mode, ValueMatrixMode::Storage);
        assert_eq!(context.ext_comp_filename_stem, "run42");
    }

    #[test]
    fn test_from_params_rejects_bad_values() {
        assert!(SessionContext::from_params([("EXT_COMP_SEGSIZE", "big")]).is_err());
        assert!(SessionContext::from_params([("EXT_COMP_SEGSIZE", "0")]).is_err());
        assert!(SessionContext::from_params([("VALUEMATRIX_MODE", "raw")]).is_err());
    }

    #[test]
    fn test_resolve() {
        let context = SessionContext::builder().with_file_root("/data").build();
        assert_eq!(context.resolve("a.btf"), PathBuf::from("/data/a.btf"));
        assert_eq!(context.resolve("file:sub/a.btf"), PathBuf::from("/data/sub/a.btf"));
        assert_eq!(context.resolve("/abs/a.btf"), PathBuf::from("/abs/a.btf"));
    }
}
