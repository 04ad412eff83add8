pub use crate::math;
pub use crate::math::prelude::{Matrix, One, SquareMatrix, Zero};

pub use crate::utils::prelude::*;

pub use crate::res::prelude::*;

pub use crate::video::prelude::*;
