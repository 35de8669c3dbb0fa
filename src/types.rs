pub type Lengthf32    = f32;
pub type Intensityf32 = f32;

pub const TWOPI: f64 = std::f64::consts::TAU;
