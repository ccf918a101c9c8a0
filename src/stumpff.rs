//! Stumpff function evaluation.
//!
//! The universal Kepler equation and its derivatives are written in terms
//! of the Stumpff functions `c0..c3` of the argument `x = s^2 * alpha`.
//! Expressing the equation this way removes the case split between
//! elliptic and hyperbolic motion: for `x > 0` the functions continue the
//! familiar `cos`/`sin` combinations, for `x < 0` their `cosh`/`sinh`
//! counterparts, and at `x = 0` the polynomial (parabolic) limit, all
//! from one series.

/// The first four Stumpff functions evaluated at a common argument.
///
/// The members satisfy
///
/// - `c0 = 1 - x * c2`
/// - `c1 = 1 - x * c3`
///
/// and at `x = 0` take the values `(1, 1, 1/2, 1/6)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Stumpff {
    /// `c0(x)`; equals `cos(sqrt(x))` for positive arguments.
    pub c0: f64,
    /// `c1(x)`; equals `sin(sqrt(x)) / sqrt(x)` for positive arguments.
    pub c1: f64,
    /// `c2(x)`; equals `(1 - cos(sqrt(x))) / x` for positive arguments.
    pub c2: f64,
    /// `c3(x)`; equals `(sqrt(x) - sin(sqrt(x))) / x^(3/2)` for positive
    /// arguments.
    pub c3: f64,
}

/// Evaluate the Stumpff functions `c0..c3` at `x`.
///
/// The argument is repeatedly quartered until it lies within `|x| < 0.1`,
/// where a fixed-degree nested series for `c2` and `c3` is accurate to
/// roughly `1e-13`; `c1` and `c0` follow from the two identities above.
/// The quartering is then undone with the duplication rule
///
/// ```text
/// c3(4x) = (c2(x) + c0(x) * c3(x)) / 4
/// c2(4x) = c1(x)^2 / 2
/// c1(4x) = c0(x) * c1(x)
/// c0(4x) = 2 * c0(x)^2 - 1
/// ```
///
/// which is exact, so the accuracy of the small-argument series carries
/// over to arbitrarily large arguments of either sign. This function has
/// no failure mode.
///
/// # Example
///
/// ```rust
/// let c = kepler_drift::stumpff(0.0);
/// assert_eq!(c.c0, 1.0);
/// assert_eq!(c.c1, 1.0);
/// assert_eq!(c.c2, 0.5);
/// assert_eq!(c.c3, 1.0 / 6.0);
/// ```
#[must_use]
pub fn stumpff(x: f64) -> Stumpff {
    let mut x = x;
    let mut halvings = 0u32;
    while x.abs() >= 0.1 {
        x /= 4.0;
        halvings += 1;
    }

    // Nested truncations of the defining series
    //   c2(x) = sum_k (-x)^k / (2k + 2)!
    //   c3(x) = sum_k (-x)^k / (2k + 3)!
    // carried to the x^6 term.
    let mut c2 =
        (1. - x * (1. - x * (1. - x * (1. - x * (1. - x * (1. - x / 182.) / 132.) / 90.) / 56.) / 30.) / 12.) / 2.;
    let mut c3 =
        (1. - x * (1. - x * (1. - x * (1. - x * (1. - x * (1. - x / 210.) / 156.) / 110.) / 72.) / 42.) / 20.) / 6.;
    let mut c1 = 1.0 - x * c3;
    let mut c0 = 1.0 - x * c2;

    // Order matters below: each line consumes the previous argument's
    // values, so c3 must be updated before c2, and c2 before c1.
    for _ in 0..halvings {
        c3 = (c2 + c0 * c3) / 4.0;
        c2 = c1 * c1 / 2.0;
        c1 = c0 * c1;
        c0 = 2.0 * c0 * c0 - 1.0;
    }

    Stumpff { c0, c1, c2, c3 }
}
