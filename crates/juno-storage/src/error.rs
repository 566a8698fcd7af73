use thiserror::Error;

pub type Result<T> = std::result::Result<T, DiskError>;

#[derive(Debug, Error)]
pub enum DiskError {
    /// The image file's size does not match the drive geometry it is being
    /// attached as.
    #[error("image is {actual} bytes, geometry requires {expected}")]
    ImageSize { actual: u64, expected: u64 },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
