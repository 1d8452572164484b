//! Error taxonomy for media loading

use std::path::PathBuf;

/// Errors surfaced synchronously when opening media.
///
/// Everything that can go wrong *after* a successful load is recovered
/// locally inside the decode loop and never reaches the caller: a bad
/// packet or frame is dropped and playback continues.
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    /// The path does not exist or is not readable
    #[error("no such file: {0}")]
    NotFound(PathBuf),

    /// The container has no decodable video stream, or the header is corrupt
    #[error("no decodable video stream in {path}: {reason}")]
    InvalidMedia { path: PathBuf, reason: String },

    /// Initial decode buffer allocation failed
    #[error("out of memory while allocating decode buffers")]
    OutOfMemory,
}

impl MediaError {
    /// Invalid-media error with a fixed reason
    pub fn invalid(path: &std::path::Path, reason: &str) -> Self {
        MediaError::InvalidMedia {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    /// Map an ffmpeg error from `open()` into the taxonomy.
    ///
    /// ENOMEM becomes [`MediaError::OutOfMemory`]; everything else from the
    /// open path means the stream cannot be decoded.
    pub fn from_open(path: &std::path::Path, err: ffmpeg_next::Error) -> Self {
        match err {
            ffmpeg_next::Error::Other { errno } if errno == libc::ENOMEM => {
                MediaError::OutOfMemory
            }
            other => MediaError::InvalidMedia {
                path: path.to_path_buf(),
                reason: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = MediaError::NotFound(PathBuf::from("/tmp/missing.mp4"));
        assert!(err.to_string().contains("missing.mp4"));
    }

    #[test]
    fn test_invalid_media_display() {
        let err = MediaError::InvalidMedia {
            path: PathBuf::from("clip.bin"),
            reason: "unknown container".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("clip.bin"));
        assert!(msg.contains("unknown container"));
    }
}
