//! Standard normal distribution
//!
//! Every pricing path in this crate goes through [`norm_cdf`]; there is no
//! second, "exact" CDF anywhere in the workspace.

const INV_SQRT_2PI: f64 = 0.398_942_280_401_432_7;

/// Standard normal probability density
#[inline]
pub fn norm_pdf(x: f64) -> f64 {
    INV_SQRT_2PI * (-0.5 * x * x).exp()
}

/// Standard normal cumulative distribution
///
/// Abramowitz & Stegun 26.2.17 rational approximation, absolute error
/// below 7.5e-8 over the whole real line.
#[inline]
pub fn norm_cdf(x: f64) -> f64 {
    let z = x.abs();
    let t = 1.0 / (1.0 + 0.231_641_9 * z);
    let poly = t
        * (0.319_381_530
            + t * (-0.356_563_782
                + t * (1.781_477_937 + t * (-1.821_255_978 + t * 1.330_274_429))));
    let upper = 1.0 - norm_pdf(z) * poly;
    if x >= 0.0 {
        upper
    } else {
        1.0 - upper
    }
}
