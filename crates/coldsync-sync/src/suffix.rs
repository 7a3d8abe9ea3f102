//! Suffix registry for remote keys
//!
//! Every remote key is `prefix/logical-path` followed by the suffixes of its
//! [`ObjectLayout`]. All listing code recovers logical paths through
//! [`ObjectLayout::strip_known_suffixes`] so that the suffix convention lives
//! in exactly one place.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A known key suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Suffix {
    /// zstd stream
    Zstd,
    /// zip container
    Zip,
}

impl Suffix {
    /// Literal suffix, including the leading dot
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Zstd => ".zst",
            Self::Zip => ".zip",
        }
    }
}

impl fmt::Display for Suffix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a logical path's payload is encoded remotely
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectLayout {
    /// Key is the logical path, payload untouched
    Raw,
    /// `.zst`: one compressed file
    Compressed,
    /// `.zip.zst`: a compressed archive of a subtree
    CompressedArchive,
}

impl ObjectLayout {
    /// Suffixes in the order they are appended
    pub fn suffixes(self) -> &'static [Suffix] {
        match self {
            Self::Raw => &[],
            Self::Compressed => &[Suffix::Zstd],
            Self::CompressedArchive => &[Suffix::Zip, Suffix::Zstd],
        }
    }

    /// Append this layout's suffixes to `name`
    pub fn append_suffixes(self, name: &str) -> String {
        let mut key = String::with_capacity(name.len() + 8);
        key.push_str(name);
        for suffix in self.suffixes() {
            key.push_str(suffix.as_str());
        }
        key
    }

    /// Strip exactly this layout's suffixes from `name`.
    ///
    /// Returns `None` when any expected suffix is missing or nothing would be
    /// left; the caller skips such keys.
    pub fn strip_known_suffixes(self, name: &str) -> Option<&str> {
        let mut stripped = name;
        for suffix in self.suffixes().iter().rev() {
            stripped = stripped.strip_suffix(suffix.as_str())?;
        }

        if stripped.is_empty() || stripped.ends_with('/') {
            None
        } else {
            Some(stripped)
        }
    }
}

impl fmt::Display for ObjectLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raw => f.write_str("raw"),
            Self::Compressed => f.write_str("compressed"),
            Self::CompressedArchive => f.write_str("compressed archive"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case(ObjectLayout::Raw, "a/b.txt", "a/b.txt")]
    #[case(ObjectLayout::Compressed, "a/b.txt", "a/b.txt.zst")]
    #[case(ObjectLayout::CompressedArchive, "photos/2020", "photos/2020.zip.zst")]
    fn test_append(#[case] layout: ObjectLayout, #[case] name: &str, #[case] expected: &str) {
        assert_eq!(layout.append_suffixes(name), expected);
    }

    #[rstest]
    #[case::missing_archive_suffix(ObjectLayout::CompressedArchive, "a.zst")]
    #[case::missing_compression_suffix(ObjectLayout::Compressed, "a.txt")]
    #[case::wrong_order(ObjectLayout::CompressedArchive, "a.zst.zip")]
    #[case::nothing_left(ObjectLayout::Compressed, ".zst")]
    #[case::directory_marker(ObjectLayout::Compressed, "dir/.zst")]
    fn test_strip_rejects(#[case] layout: ObjectLayout, #[case] name: &str) {
        assert_eq!(layout.strip_known_suffixes(name), None);
    }

    #[test]
    fn test_strip_only_removes_expected_suffixes() {
        // A flat backup of a file that is itself a zip keeps the .zip
        assert_eq!(
            ObjectLayout::Compressed.strip_known_suffixes("a/b.zip.zst"),
            Some("a/b.zip")
        );
        assert_eq!(
            ObjectLayout::CompressedArchive.strip_known_suffixes("a/b.zst.zip.zst"),
            Some("a/b.zst")
        );
    }

    proptest! {
        #[test]
        fn test_strip_inverts_append(
            name in "[a-z0-9_.-]{1,12}(/[a-z0-9_.-]{1,12}){0,3}",
            layout in prop_oneof![
                Just(ObjectLayout::Raw),
                Just(ObjectLayout::Compressed),
                Just(ObjectLayout::CompressedArchive),
            ],
        ) {
            let key = layout.append_suffixes(&name);
            prop_assert_eq!(layout.strip_known_suffixes(&key), Some(name.as_str()));
        }
    }
}
