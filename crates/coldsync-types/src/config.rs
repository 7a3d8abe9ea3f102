//! Configuration types for coldsync
//!
//! Validated newtypes shared by the configuration layer, the CLI and the
//! sync engine.

/// Streaming buffer size with validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BufferSize(usize);

impl BufferSize {
    /// Minimum buffer size (4KB)
    pub const MIN: usize = 4 * 1024;
    /// Maximum buffer size (64MB)
    pub const MAX: usize = 64 * 1024 * 1024;
    /// Default buffer size (64KB)
    pub const DEFAULT: usize = 64 * 1024;

    /// Create a new buffer size with validation
    pub fn new(size: usize) -> Result<Self, String> {
        if size < Self::MIN {
            Err(format!("Buffer size {} is below minimum {}", size, Self::MIN))
        } else if size > Self::MAX {
            Err(format!("Buffer size {} exceeds maximum {}", size, Self::MAX))
        } else if !size.is_power_of_two() {
            Err(format!("Buffer size {} must be a power of two", size))
        } else {
            Ok(Self(size))
        }
    }

    /// Get the buffer size value
    pub fn get(self) -> usize {
        self.0
    }
}

impl Default for BufferSize {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

/// Worker count with validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ThreadCount(usize);

impl ThreadCount {
    /// Minimum thread count
    pub const MIN: usize = 1;
    /// Maximum thread count
    pub const MAX: usize = 256;

    /// Create a new thread count with validation
    pub fn new(count: usize) -> Result<Self, String> {
        if count < Self::MIN {
            Err(format!("Thread count {} is below minimum {}", count, Self::MIN))
        } else if count > Self::MAX {
            Err(format!("Thread count {} exceeds maximum {}", count, Self::MAX))
        } else {
            Ok(Self(count))
        }
    }

    /// Get the thread count value
    pub fn get(self) -> usize {
        self.0
    }

    /// Get the optimal thread count for the current system
    pub fn optimal() -> Self {
        Self(num_cpus::get().clamp(Self::MIN, Self::MAX))
    }
}

impl Default for ThreadCount {
    fn default() -> Self {
        Self::optimal()
    }
}

/// Zstandard compression level with validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CompressionLevel(u8);

impl CompressionLevel {
    /// Fastest compression
    pub const FASTEST: u8 = 1;
    /// Default compression
    pub const DEFAULT: u8 = 3;
    /// Best compression
    pub const BEST: u8 = 22;

    /// Create a new compression level with validation
    pub fn new(level: u8) -> Result<Self, String> {
        if level < Self::FASTEST {
            Err(format!("Compression level {} is below minimum {}", level, Self::FASTEST))
        } else if level > Self::BEST {
            Err(format!("Compression level {} exceeds maximum {}", level, Self::BEST))
        } else {
            Ok(Self(level))
        }
    }

    /// Get the compression level value
    pub fn get(self) -> u8 {
        self.0
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

/// Directory depth at which local subtrees are batched into one archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GroupDepth(usize);

impl GroupDepth {
    /// Create a new grouping depth; depth 0 would group the root itself
    pub fn new(depth: usize) -> Result<Self, String> {
        if depth == 0 {
            Err("Grouping depth must be at least 1".to_string())
        } else {
            Ok(Self(depth))
        }
    }

    /// Get the depth value
    pub fn get(self) -> usize {
        self.0
    }
}
