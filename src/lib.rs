//! _Dynacoe_ is the resource management and draw dispatch core of a small multimedia engine.
//!
//! * `utils` holds generational handles and the tables every resource lives in.
//! * `video` holds the renderer contract, a programmable-pipeline renderer over OpenGL or a
//!   headless device, the texture atlas, render-buffer pools and framebuffers.
//! * `res` holds the `DataTable`, a named and serializable property store.

#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;

#[macro_use]
pub mod utils;
pub mod errors;
pub mod math;
pub mod res;
pub mod video;

pub mod prelude;
