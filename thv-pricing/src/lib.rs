//! Pricing engine for the Cash Futures THV service
//!
//! Pure, side-effect-free closed-form computations: theoretical futures
//! value, standard-deviation bands, Black-Scholes prices and greeks.
//! Every function has a scalar form; [`batch`] applies the same scalar
//! functions element-wise over parallel arrays.

pub mod batch;
pub mod black_scholes;
pub mod error;
pub mod futures;
pub mod normal;

pub use batch::{price_batch, BatchInputs, BatchOutput};
pub use black_scholes::{black_scholes, greeks, Greeks, OptionSide};
pub use error::{PricingError, PricingResult};
pub use futures::{sdv_levels, theoretical_value, SdvLevels};
pub use normal::{norm_cdf, norm_pdf};
