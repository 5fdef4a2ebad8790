//! Linear algebra & model fitting for the rescoring step

pub mod gauss;
pub mod linear_discriminant;
pub mod matrix;

pub fn norm(slice: &[f64]) -> f64 {
    slice.iter().fold(0.0, |acc, x| acc + x.powi(2)).sqrt()
}
