use std::fmt;

pub type Result<T> = std::result::Result<T, StampError>;

#[derive(Debug)]
pub enum StampError {
    /// Source document could not be parsed.
    Document(String),
    /// A stamp's page range does not satisfy 1 <= from <= to <= page_count.
    InvalidPageRange {
        from: u32,
        to: u32,
        page_count: u32,
    },
    /// Geometry or style field outside its valid domain.
    InvalidStamp(String),
    /// A color string was not a #RRGGBB triple.
    InvalidColor(String),
    /// Security settings rejected before any encoding work.
    InvalidSecurity(String),
    /// Interactive preview is bounded; the requested page is past the bound.
    PreviewUnavailable { page_index: usize, limit: usize },
    /// Raster surface allocation or encode failure.
    Raster(String),
    /// Final document encode/encrypt/serialize failure.
    Encode(String),
    /// Template (de)serialization failure.
    Template(String),
}

impl fmt::Display for StampError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StampError::Document(message) => write!(f, "document error: {}", message),
            StampError::InvalidPageRange {
                from,
                to,
                page_count,
            } => write!(
                f,
                "invalid page range {}..={} for a {}-page document",
                from, to, page_count
            ),
            StampError::InvalidStamp(message) => write!(f, "invalid stamp: {}", message),
            StampError::InvalidColor(value) => {
                write!(f, "invalid color: expected #RRGGBB, found '{}'", value)
            }
            StampError::InvalidSecurity(message) => {
                write!(f, "invalid security settings: {}", message)
            }
            StampError::PreviewUnavailable { page_index, limit } => write!(
                f,
                "preview page {} is past the preview bound of {} pages",
                page_index, limit
            ),
            StampError::Raster(message) => write!(f, "raster error: {}", message),
            StampError::Encode(message) => write!(f, "encode error: {}", message),
            StampError::Template(message) => write!(f, "template error: {}", message),
        }
    }
}

impl std::error::Error for StampError {}

impl From<lopdf::Error> for StampError {
    fn from(value: lopdf::Error) -> Self {
        StampError::Document(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let err = StampError::InvalidPageRange {
            from: 3,
            to: 2,
            page_count: 5,
        };
        assert_eq!(
            err.to_string(),
            "invalid page range 3..=2 for a 5-page document"
        );

        let err = StampError::PreviewUnavailable {
            page_index: 12,
            limit: 10,
        };
        assert!(err.to_string().contains("preview bound"));
    }

    #[test]
    fn error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<StampError>();
    }
}
