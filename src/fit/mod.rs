//! Curve and regression fitting used by the photobleach corrector.
//!
//! - [`exp2`]: biexponential model and its Levenberg-Marquardt fit.
//! - [`huber`]: robust straight-line regression (Huber loss, IRLS).

pub mod exp2;
pub mod huber;

pub use exp2::{
    exp2, exp2_curve, fit_exp2, fit_exp2_from, initial_guess, linspace01, nan_median, Exp2Fit,
    Exp2Params, FitError, FitOptions, FitStatus,
};
pub use huber::{huber_fit, HuberFit, HUBER_EPSILON};
