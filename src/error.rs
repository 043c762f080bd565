use crate::types::Pt;
use std::fmt;

#[derive(Debug)]
pub enum PageTileError {
    /// A rasterized block breaks its contract (zero width, bad id, wrong role, misplaced anchor).
    InvalidBlock(String),
    /// Page geometry is malformed or cannot fit the header and footer.
    Geometry(String),
    /// An unsplittable block is taller than a whole content band.
    BlockTooLarge {
        block_id: String,
        height: Pt,
        available: Pt,
    },
    Asset(String),
    Io(std::io::Error),
}

pub type Result<T> = std::result::Result<T, PageTileError>;

impl fmt::Display for PageTileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageTileError::InvalidBlock(message) => write!(f, "invalid block: {}", message),
            PageTileError::Geometry(message) => write!(f, "invalid page geometry: {}", message),
            PageTileError::BlockTooLarge {
                block_id,
                height,
                available,
            } => write!(
                f,
                "unsplittable block '{}' is {}pt tall but a page only holds {}pt of content",
                block_id, height, available
            ),
            PageTileError::Asset(message) => write!(f, "asset error: {}", message),
            PageTileError::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl std::error::Error for PageTileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PageTileError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PageTileError {
    fn from(value: std::io::Error) -> Self {
        PageTileError::Io(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_too_large_message_names_block_and_heights() {
        let err = PageTileError::BlockTooLarge {
            block_id: "signatures".to_string(),
            height: Pt::from_f32(120.5),
            available: Pt::from_f32(100.0),
        };
        assert_eq!(
            err.to_string(),
            "unsplittable block 'signatures' is 120.5pt tall but a page only holds 100pt of content"
        );
    }

    #[test]
    fn io_errors_keep_their_source() {
        use std::error::Error;
        let err: PageTileError = std::io::Error::other("disk full").into();
        assert!(err.source().is_some());
        assert_eq!(err.to_string(), "io error: disk full");
    }
}
