#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("utf8 conversion: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("found magic of {0:#x} instead of {:#x}", super::MAGIC)]
    Magic(u32),
    #[error("implementation tag {0:#x} is not supported, expected {:#x}", super::IMPL_TAG)]
    ImplTag(u16),
    #[error("standard version {0} is not supported (max {max})", max = super::MAX_VERSION)]
    StandardVersion(u16),
    #[error("corrupt archive: {0}")]
    Corruption(&'static str),

    #[error("fsid {0} is out of range")]
    FsidOutOfRange(u32),
    #[error("symlink payload must be exactly 4 bytes, got {0}")]
    InvalidSymlinkPayload(usize),
    #[error("directory payload size {got} does not match expected {expected} for {count} children")]
    InvalidPathPayload {
        got: usize,
        expected: usize,
        count: u32,
    },

    #[error("archive is encrypted but no key was provided")]
    Encrypted,
    #[error("missing password for key index {0}")]
    MissingPassword(u32),
    #[error("incorrect password for key index {0}")]
    IncorrectPassword(u32),

    #[error("decompression failed: {0}")]
    Decompression(String),
    #[error("decompressed frame has unknown or missing content size")]
    UnknownFrameSize,

    #[error("duplicate path: {0}")]
    DuplicatePath(String),
    #[error("duplicate key index: {0}")]
    DuplicateKey(u32),
    #[error("duplicate exec priority for: {0}")]
    DuplicateExecPriority(String),
    #[error("symlink target not found: {0}")]
    SymlinkTargetNotFound(String),
    #[error("missing exec priority for script: {0}")]
    MissingExecPriority(String),
    #[error("compiled without the '{0}' feature")]
    FeatureDisabled(&'static str),
    #[error("entry not found: {0}")]
    MissingEntry(String),

    #[error("{0}")]
    Other(String),
}
