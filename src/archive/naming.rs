//! Collision-safe entry naming for download archives

use std::collections::HashSet;

/// Name used when a document's display name sanitizes to nothing
pub const FALLBACK_ENTRY_NAME: &str = "document";

/// Entry names already used within one archive build.
///
/// Comparison ignores ASCII case so archives extract cleanly on
/// case-insensitive filesystems. Only the archive's single reader touches it.
#[derive(Debug, Default)]
pub struct NameRegistry {
    used: HashSet<String>,
}

impl NameRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of claimed names
    pub fn len(&self) -> usize {
        self.used.len()
    }

    /// Whether nothing has been claimed yet
    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }

    /// Whether `name` (ignoring case) is already taken
    pub fn contains(&self, name: &str) -> bool {
        self.used.contains(&name.to_ascii_lowercase())
    }

    /// Claim a unique entry name derived from `display_name`.
    ///
    /// The name is sanitized first. If it is taken, `_1`, `_2`, ... is
    /// inserted before the extension until a free name is found:
    /// `report.pdf` then `report_1.pdf` then `report_2.pdf`.
    pub fn claim(&mut self, display_name: &str) -> String {
        let candidate = sanitize_entry_name(display_name);
        if self.used.insert(candidate.to_ascii_lowercase()) {
            return candidate;
        }

        let (stem, extension) = split_extension(&candidate);
        let mut n: u64 = 1;
        loop {
            let renamed = match extension {
                Some(ext) => format!("{stem}_{n}.{ext}"),
                None => format!("{stem}_{n}"),
            };
            if self.used.insert(renamed.to_ascii_lowercase()) {
                return renamed;
            }
            n += 1;
        }
    }

    /// Give back a name whose entry could not be written
    pub fn release(&mut self, name: &str) {
        self.used.remove(&name.to_ascii_lowercase());
    }
}

/// Make a display name safe to use as a flat archive entry name.
///
/// Path separators and control characters become `_`, so an entry can never
/// escape the extraction directory or create subdirectories. Names that are
/// empty or consist only of dots fall back to [`FALLBACK_ENTRY_NAME`].
pub fn sanitize_entry_name(display_name: &str) -> String {
    let cleaned: String = display_name
        .trim()
        .chars()
        .map(|c| {
            if c == '/' || c == '\\' || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        FALLBACK_ENTRY_NAME.to_string()
    } else {
        cleaned
    }
}

/// Split `name` at its last dot into stem and extension.
///
/// A leading dot (`.env`) or trailing dot (`notes.`) is not an extension.
pub fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(pos) if pos > 0 && pos + 1 < name.len() => (&name[..pos], Some(&name[pos + 1..])),
        _ => (name, None),
    }
}
