//! Extension-based file categorization.
//!
//! A [`CategoryTable`] maps category names to extension sets and keeps the
//! categories in insertion order. [`Classifier`] walks that order and returns
//! the first category claiming a file's extension, or [`FALLBACK_CATEGORY`].
//!
//! # Examples
//!
//! ```
//! use dirsort::file_category::{CategoryTable, Classifier};
//! use std::path::Path;
//!
//! let table = CategoryTable::default();
//! let classifier = Classifier::new(&table);
//! assert_eq!(classifier.classify(Path::new("holiday.JPG")), "images");
//! assert_eq!(classifier.classify(Path::new("notes.txt")), "documents");
//! assert_eq!(classifier.classify(Path::new("mystery.xyz")), "other");
//! ```

use crate::error::ConfigError;
use std::collections::HashSet;
use std::path::Path;

/// Category used when no configured extension matches.
pub const FALLBACK_CATEGORY: &str = "other";

/// A named group of extensions. Extensions are stored lower-cased with a
/// leading dot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    name: String,
    extensions: Vec<String>,
    lookup: HashSet<String>,
}

impl Category {
    /// The category name, also used as the destination subdirectory name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Extensions in the order they were configured.
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Returns true if `extension` (already normalized) belongs to this category.
    pub fn contains(&self, extension: &str) -> bool {
        self.lookup.contains(extension)
    }
}

/// Ordered mapping from category name to extensions.
///
/// The same extension may appear under several categories; the one added
/// first wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryTable {
    categories: Vec<Category>,
}

impl CategoryTable {
    /// Creates an empty table. Every file classifies as [`FALLBACK_CATEGORY`].
    pub fn empty() -> Self {
        Self {
            categories: Vec::new(),
        }
    }

    /// Appends a category.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyCategoryName`] for a blank name and
    /// [`ConfigError::DuplicateCategory`] if the name is already present.
    pub fn add_category<I, S>(&mut self, name: &str, extensions: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let name = name.trim();
        if name.is_empty() {
            return Err(ConfigError::EmptyCategoryName);
        }
        if self.get(name).is_some() {
            return Err(ConfigError::DuplicateCategory(name.to_string()));
        }

        let mut ordered = Vec::new();
        let mut lookup = HashSet::new();
        for ext in extensions {
            let ext = normalize_extension(ext.as_ref());
            if ext.len() > 1 && lookup.insert(ext.clone()) {
                ordered.push(ext);
            }
        }

        self.categories.push(Category {
            name: name.to_string(),
            extensions: ordered,
            lookup,
        });
        Ok(())
    }

    /// Builder-style [`add_category`](Self::add_category).
    pub fn with_category<I, S>(mut self, name: &str, extensions: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.add_category(name, extensions)?;
        Ok(self)
    }

    /// Looks up a category by name.
    pub fn get(&self, name: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.name == name)
    }

    /// Iterates categories in table order.
    pub fn iter(&self) -> impl Iterator<Item = &Category> {
        self.categories.iter()
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Returns true if a directory called `dir_name` is one this tool would
    /// create: a configured category or the fallback.
    ///
    /// This is a name match only. A user directory that happens to be called
    /// `images` is treated as already organized.
    pub fn is_category_dir(&self, dir_name: &str) -> bool {
        dir_name == FALLBACK_CATEGORY || self.get(dir_name).is_some()
    }
}

impl Default for CategoryTable {
    /// The stock table: images, documents, spreadsheets, presentations,
    /// archives, audio, video, code, executables.
    fn default() -> Self {
        const STOCK: &[(&str, &[&str])] = &[
            (
                "images",
                &[".jpg", ".jpeg", ".png", ".gif", ".bmp", ".svg", ".webp"],
            ),
            ("documents", &[".pdf", ".doc", ".docx", ".txt", ".rtf", ".odt"]),
            ("spreadsheets", &[".xls", ".xlsx", ".csv", ".ods"]),
            ("presentations", &[".ppt", ".pptx", ".odp"]),
            ("archives", &[".zip", ".rar", ".7z", ".tar", ".gz", ".bz2"]),
            ("audio", &[".mp3", ".wav", ".flac", ".aac", ".ogg", ".m4a"]),
            ("video", &[".mp4", ".avi", ".mkv", ".mov", ".wmv", ".flv"]),
            (
                "code",
                &[".py", ".js", ".html", ".css", ".java", ".cpp", ".c", ".h"],
            ),
            ("executables", &[".exe", ".msi", ".dmg", ".pkg", ".deb", ".rpm"]),
        ];

        let mut table = Self::empty();
        for (name, extensions) in STOCK {
            // Stock names are non-empty and distinct.
            let _ = table.add_category(name, extensions.iter());
        }
        table
    }
}

/// Lower-cases an extension and makes sure it starts with a dot.
///
/// ```
/// use dirsort::file_category::normalize_extension;
/// assert_eq!(normalize_extension("JPG"), ".jpg");
/// assert_eq!(normalize_extension(" .Tar "), ".tar");
/// ```
pub fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{}", ext)
    }
}

/// Picks a category for a file from its extension.
#[derive(Debug, Clone, Copy)]
pub struct Classifier<'a> {
    table: &'a CategoryTable,
}

impl<'a> Classifier<'a> {
    pub fn new(table: &'a CategoryTable) -> Self {
        Self { table }
    }

    /// Returns the category name for `file_path`. Never fails: files without
    /// a matching (or any) extension land in [`FALLBACK_CATEGORY`].
    pub fn classify(&self, file_path: &Path) -> &'a str {
        let Some(ext) = file_path.extension() else {
            return FALLBACK_CATEGORY;
        };
        let ext = normalize_extension(&ext.to_string_lossy());

        self.table
            .iter()
            .find(|category| category.contains(&ext))
            .map(Category::name)
            .unwrap_or(FALLBACK_CATEGORY)
    }
}
