use crate::utils::TableError;

#[derive(Debug, Fail)]
pub enum Error {
    #[fail(display = "{} is invalid.", _0)]
    InvalidHandle(String),
    #[fail(display = "Range [{}, {}) is out of the {} floats of {}.", offset, end, len, name)]
    OutOfRange {
        name: String,
        offset: usize,
        end: usize,
        len: usize,
    },
    #[fail(display = "Texture dimensions {}x{} are invalid.", _0, _1)]
    InvalidDimensions(u32, u32),
    #[fail(display = "Texture atlas can not fit {}x{} within {}x{}.", _0, _1, _2, _2)]
    AtlasFull(u32, u32, u32),
    #[fail(display = "Failed to create shader program, errors: \n{}", _0)]
    ShaderCompile(String),
    #[fail(display = "CRITICAL ERROR: built-in program {:?} failed, errors: \n{}", _0, _1)]
    BuiltInProgram(String, String),
    #[fail(display = "Device: {}", _0)]
    Device(String),
}

pub type Result<T> = ::std::result::Result<T, Error>;

impl From<failure::Error> for Error {
    fn from(err: failure::Error) -> Error {
        Error::Device(format!("{}", err))
    }
}

impl From<TableError> for Error {
    fn from(err: TableError) -> Error {
        Error::InvalidHandle(format!("{}", err))
    }
}
