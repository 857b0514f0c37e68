use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Malformed data: {0}")]
    Format(String),
    #[error("Unknown object type: {0}")]
    SchemaMismatch(String),
    #[error("Invalid object schema `{type_name}`: {reason}")]
    InvalidSchema { type_name: String, reason: String },
    #[error("Object `{obj_type}` is missing property `{prop}`")]
    MissingProperty { obj_type: String, prop: String },
    #[error("Value {value:#X} does not fit in {len}-bit field `{prop}`")]
    FieldOutOfRange { prop: String, value: u32, len: u8 },
    #[error("Could not access {path}:\n- {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Compressor failed on room {room:02X}: {message}")]
    ExternalTool { room: usize, message: String },
}

pub type CodecResult<T> = Result<T, CodecError>;
