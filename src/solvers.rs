//! Root finders for the universal Kepler equation.
//!
//! The equation being solved for the universal anomaly `s` is
//!
//! ```text
//! f(s) = r0 * s * c1(x) + u * s^2 * c2(x) + mu * s^3 * c3(x) - dt = 0,
//! x = s^2 * alpha
//! ```
//!
//! where `r0` is the initial separation, `u = r . v` the radial velocity
//! proxy, `mu` the combined gravitational parameter, and
//! `alpha = 2 mu / r0 - v^2` the vis-viva energy parameter. `f'(s)` is the
//! instantaneous separation, so `f` is monotone increasing, but its
//! curvature near parabolic orbits and for very long steps still defeats a
//! naive Newton iteration, hence the guess/primary/fallback split below.

use crate::stumpff::stumpff;
use crate::{
    DANBYB, GUESS_ECC_OFFSET, GUESS_SERIES_MAX_STEP, LAGUERRE_FPP_DAMPING, LAGUERRE_MAX_ITERS,
    LAGUERRE_N, NEWTON_MAX_ITERS,
};

/// A converged universal-variable solve.
///
/// `c1`, `c2`, `c3` are the Stumpff values already multiplied by `s`,
/// `s^2`, and `s^3` respectively, and `fp` is the residual derivative
/// (the separation at the end of the step): exactly the quantities the
/// Lagrange coefficients are built from.
#[derive(Clone, Copy, Debug)]
pub(crate) struct UniversalSolution {
    pub s: f64,
    pub fp: f64,
    pub c1: f64,
    pub c2: f64,
    pub c3: f64,
}

/// Kepler-equation residual at a trial anomaly `s`.
pub(crate) fn kepler_residual(dt: f64, r0: f64, mu: f64, alpha: f64, u: f64, s: f64) -> f64 {
    let c = stumpff(s * s * alpha);
    let c1 = c.c1 * s;
    let c2 = c.c2 * s * s;
    let c3 = c.c3 * s * s * s;
    r0 * c1 + u * c2 + mu * c3 - dt
}

/// Initial guess for hyperbolic and parabolic orbits via a depressed
/// cubic.
///
/// Truncating the universal Kepler equation at the cubic term and dividing
/// through by the leading coefficient `(mu - alpha * r0) / 6` leaves
/// `s^3 + a2 s^2 + a1 s + a0 = 0`, whose single real root (when the
/// discriminant allows one) is a good starting point for unbound motion.
/// Returns `None` when the discriminant is negative and the real-root
/// Cardano formula does not apply.
pub(crate) fn cubic_guess(dt: f64, r0: f64, mu: f64, alpha: f64, u: f64) -> Option<f64> {
    let denom = (mu - alpha * r0) / 6.0;
    let a2 = 0.5 * u / denom;
    let a1 = r0 / denom;
    let a0 = -dt / denom;

    let q = (a1 - a2 * a2 / 3.0) / 3.0;
    let r = (a1 * a2 - 3.0 * a0) / 6.0 - a2 * a2 * a2 / 27.0;
    let discriminant = q * q * q + r * r;

    if discriminant < 0.0 {
        return None;
    }

    let sq = discriminant.sqrt();
    let p1 = (r + sq).cbrt();
    let p2 = (r - sq).cbrt();
    Some(p1 + p2 - a2 / 3.0)
}

/// Orbit-type-aware starting point for the universal anomaly.
///
/// Elliptic orbits with a short step get a truncated series in `dt / r0`;
/// longer elliptic steps get a trigonometric estimate seeded a fraction of
/// the eccentricity past the mean-anomaly angle, in the direction the
/// residual is known to lie. Unbound orbits use the cubic guess, falling
/// back to the trivial `dt / r0` when the cubic has no real root.
pub(crate) fn initial_guess(dt: f64, r0: f64, mu: f64, alpha: f64, u: f64) -> f64 {
    if alpha > 0.0 {
        // Elliptic motion.
        if dt / r0 <= GUESS_SERIES_MAX_STEP {
            dt / r0 - (dt * dt * u) / (2.0 * r0 * r0 * r0)
        } else {
            let a = mu / alpha;
            let en = (mu / (a * a * a)).sqrt();
            let ec = 1.0 - r0 / a;
            let es = u / (en * a * a);
            let e = (ec * ec + es * es).sqrt();
            let y = en * dt - es;
            let (sy, cy) = y.sin_cos();
            let sigma = if es * cy + ec * sy >= 0.0 { 1.0 } else { -1.0 };
            let x = y + sigma * GUESS_ECC_OFFSET * e;
            x / alpha.sqrt()
        }
    } else {
        // Hyperbolic or parabolic motion.
        cubic_guess(dt, r0, mu, alpha, u).unwrap_or(dt / r0)
    }
}

/// Primary solver: bounded Newton iteration with third-order corrections.
///
/// Each pass evaluates the residual and its first three derivatives from
/// one Stumpff call, then sharpens the plain Newton step twice using the
/// higher derivatives (the Halley-family refinement
/// `ds = -f / (fp + ds fpp / 2 + ds^2 fppp / 6)`). On success the
/// converged [`UniversalSolution`] is returned; on failure the last
/// iterate is handed back so the caller can compare it against the
/// original guess before engaging the fallback.
pub(crate) fn newton_solve(
    guess: f64,
    dt: f64,
    r0: f64,
    mu: f64,
    alpha: f64,
    u: f64,
) -> Result<UniversalSolution, f64> {
    let mut s = guess;
    for _ in 0..NEWTON_MAX_ITERS {
        let x = s * s * alpha;
        let c = stumpff(x);
        let c1 = c.c1 * s;
        let c2 = c.c2 * s * s;
        let c3 = c.c3 * s * s * s;

        let f = r0 * c1 + u * c2 + mu * c3 - dt;
        let fp = r0 * c.c0 + u * c1 + mu * c2;
        let fpp = (mu - r0 * alpha) * c1 + u * c.c0;
        let fppp = (mu - r0 * alpha) * c.c0 - u * alpha * c1;

        let mut ds = -f / fp;
        ds = -f / (fp + ds * fpp / 2.0);
        ds = -f / (fp + ds * fpp / 2.0 + ds * ds * fppp / 6.0);
        s += ds;

        let fdt = f / dt;
        if fdt * fdt < DANBYB * DANBYB {
            return Ok(UniversalSolution { s, fp, c1, c2, c3 });
        }
    }
    Err(s)
}

/// Fallback solver: the Laguerre-Conway iteration.
///
/// Much slower per digit than the Newton path but converges from nearly
/// anywhere. The second derivative is estimated with the fixed
/// [`LAGUERRE_FPP_DAMPING`] constant in place of the `s^2 * alpha` scaling,
/// and the sign under the square root is chosen to match `fp` so the
/// denominator magnitudes add instead of cancelling. Returns `None` only
/// when the iteration budget is exhausted, which is fatal for the solve.
pub(crate) fn laguerre_solve(
    guess: f64,
    dt: f64,
    r0: f64,
    mu: f64,
    alpha: f64,
    u: f64,
) -> Option<UniversalSolution> {
    let n = LAGUERRE_N;
    let mut s = guess;
    for _ in 0..LAGUERRE_MAX_ITERS {
        let x = s * s * alpha;
        let c = stumpff(x);
        let c1 = c.c1 * s;
        let c2 = c.c2 * s * s;
        let c3 = c.c3 * s * s * s;

        let f = r0 * c1 + u * c2 + mu * c3 - dt;
        let fp = r0 * c.c0 + u * c1 + mu * c2;
        let fpp = (mu - LAGUERRE_FPP_DAMPING * alpha) * c1 + u * c.c0;

        let sign = if fp > 0.0 { 1.0 } else { -1.0 };
        let radical = ((n - 1.0) * (n - 1.0) * fp * fp - n * (n - 1.0) * f * fpp)
            .abs()
            .sqrt();
        let ds = -n * f / (fp + sign * radical);
        s += ds;

        let fdt = f / dt;
        if fdt * fdt < DANBYB * DANBYB {
            return Some(UniversalSolution { s, fp, c1, c2, c3 });
        }
    }
    None
}

/// Solve the universal Kepler equation for a time increment `dt`.
///
/// Generates a starting point, runs the Newton solver, and on
/// non-convergence restarts the Laguerre-Conway fallback from whichever of
/// the original guess and Newton's final iterate has the smaller residual.
/// `None` means even the fallback diverged and this solve attempt is lost.
pub(crate) fn solve_universal(
    dt: f64,
    r0: f64,
    mu: f64,
    alpha: f64,
    u: f64,
) -> Option<UniversalSolution> {
    let guess = initial_guess(dt, r0, mu, alpha, u);
    match newton_solve(guess, dt, r0, mu, alpha, u) {
        Ok(solution) => Some(solution),
        Err(newton_s) => {
            let f_guess = kepler_residual(dt, r0, mu, alpha, u, guess);
            let f_newton = kepler_residual(dt, r0, mu, alpha, u, newton_s);
            let restart = if f_guess.abs() < f_newton.abs() {
                guess
            } else {
                newton_s
            };
            laguerre_solve(restart, dt, r0, mu, alpha, u)
        }
    }
}
