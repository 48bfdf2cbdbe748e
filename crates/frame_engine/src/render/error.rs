//! Render error types and non-fatal outcome enums
//!
//! Fatal conditions travel as [`VulkanError`]. Stale or suboptimal swapchain
//! results are not errors: they come back as [`AcquireOutcome`] and
//! [`PresentOutcome`] so callers branch on them explicitly.

use ash::vk;
use thiserror::Error;

/// Vulkan-specific error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VulkanError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// The logical device was lost; nothing on it can be recovered
    #[error("Device lost")]
    DeviceLost,

    /// A bounded fence wait expired
    #[error("Timed out waiting for the GPU")]
    Timeout,

    /// Upload larger than the vertex arena
    #[error("Vertex upload of {requested} vertices exceeds arena capacity of {capacity}")]
    CapacityExceeded {
        /// Total vertices in the rejected upload
        requested: usize,
        /// Fixed arena capacity in vertices
        capacity: usize,
    },

    /// Setup failed before the frame loop could start
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// No suitable memory type found for allocation
    #[error("No suitable memory type found")]
    NoSuitableMemoryType,

    /// Invalid operation attempted
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Description of why the operation is invalid
        reason: String,
    },
}

impl From<vk::Result> for VulkanError {
    fn from(result: vk::Result) -> Self {
        match result {
            vk::Result::ERROR_DEVICE_LOST => Self::DeviceLost,
            vk::Result::TIMEOUT => Self::Timeout,
            other => Self::Api(other),
        }
    }
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;

/// Result of asking the swapchain for the next presentable image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// An image was acquired; `suboptimal` still allows drawing
    Acquired {
        /// Index into the current epoch's images
        image_index: u32,
        /// Surface properties no longer match exactly
        suboptimal: bool,
    },
    /// The swapchain is stale and must be rebuilt before drawing
    OutOfDate,
}

/// Result of queueing an image for presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    /// Presented normally
    Presented,
    /// Presented, but the swapchain should be rebuilt
    Suboptimal,
    /// Not presented, the swapchain is stale
    OutOfDate,
}

impl PresentOutcome {
    /// Whether this outcome calls for a swapchain rebuild
    pub fn needs_rebuild(self) -> bool {
        !matches!(self, Self::Presented)
    }
}
