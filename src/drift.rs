//! Per-body Keplerian propagation.
//!
//! A drift advances one body along its instantaneous two-body orbit about
//! the central mass for a time increment `dt`. The body's state is first
//! taken relative to the central body; the relative state is then mapped
//! forward analytically with the Lagrange f and g coefficients, and the
//! result translated back into absolute coordinates. Two routes produce
//! the coefficients:
//!
//! - a fast path for short, mildly eccentric elliptic steps that solves
//!   the classical Kepler equation for one wrapped mean-anomaly increment
//!   with a series seed and a fixed number of refinements, and
//! - the general universal-variable path in [`crate::solvers`].

use core::fmt;
use std::error::Error;
use std::f64::consts::TAU;

use crate::solvers::solve_universal;
use crate::system::Particle;
use crate::{DANBYB, FAST_GATE_DM2, FAST_GATE_ESQ, FAST_GATE_ESQ_DM2};

/// Failure of a single drift attempt.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriftError {
    /// Neither the Newton iteration nor the Laguerre-Conway fallback
    /// converged on the universal Kepler equation for this body and step.
    SolverDiverged,
}

impl fmt::Display for DriftError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriftError::SolverDiverged => {
                write!(f, "the universal Kepler solver failed to converge")
            }
        }
    }
}

impl Error for DriftError {}

/// The Lagrange coefficients of one propagation step.
///
/// They define the linear map from the initial relative state to the final
/// relative state,
///
/// ```text
/// r(t + dt) = f * r(t) + g * v(t)
/// v(t + dt) = fdot * r(t) + gdot * v(t)
/// ```
///
/// which is the exact two-body flow. In particular it conserves the
/// two-body energy and angular momentum, which is what makes drifting
/// preferable to integrating the central force numerically.
#[derive(Clone, Copy, Debug)]
struct Lagrange {
    f: f64,
    g: f64,
    fdot: f64,
    gdot: f64,
}

impl Lagrange {
    fn apply(&self, pos: glam::DVec3, vel: glam::DVec3) -> (glam::DVec3, glam::DVec3) {
        (
            pos * self.f + vel * self.g,
            pos * self.fdot + vel * self.gdot,
        )
    }
}

// 11!, 11!/6, 11!/120, ...: the sine series coefficients scaled so the
// leading one is integral.
const A0: f64 = 39_916_800.;
const A1: f64 = 6_652_800.;
const A2: f64 = 332_640.;
const A3: f64 = 7_920.;
const A4: f64 = 110.;

/// Quintic-order sine series and the matching cosine.
///
/// Only valid for the small increments the fast-path gate admits; the
/// positive square root is the correct cosine branch there.
fn sin_cos_series(x: f64) -> (f64, f64) {
    let y = x * x;
    let s = x * (A0 - y * (A1 - y * (A2 - y * (A3 - y * (A4 - y))))) / A0;
    (s, (1.0 - s * s).sqrt())
}

/// Solve the classical elliptic Kepler equation for one short mean-anomaly
/// increment `dm`, with eccentricity components `(es, ec)`.
///
/// The seed is a closed-form expansion in `dm`; it is then sharpened by
/// exactly two third-order refinement passes rather than an open-ended
/// loop (the gate guarantees two passes reach the tolerance whenever the
/// method is applicable at all). Returns the eccentric-anomaly increment with its
/// sine and cosine, or `None` when the residual check shows the step was
/// outside the method's reach after all.
fn mean_anomaly_step(dm: f64, es: f64, ec: f64) -> Option<(f64, f64, f64)> {
    let fac1 = 1.0 / (1.0 - ec);
    let q = fac1 * dm;
    let fac2 = es * es * fac1 - ec / 3.0;
    let mut x = q * (1.0 - 0.5 * fac1 * q * (es - q * fac2));
    let (mut sx, mut cx) = sin_cos_series(x);

    for _ in 0..2 {
        let f = x - ec * sx + es * (1.0 - cx) - dm;
        let fp = 1.0 - ec * cx + es * sx;
        let fpp = ec * sx + es * cx;
        let fppp = ec * cx - es * sx;
        let mut dx = -f / fp;
        dx = -f / (fp + 0.5 * dx * fpp);
        dx = -f / (fp + 0.5 * dx * fpp + dx * dx * fppp / 6.0);
        x += dx;
        (sx, cx) = sin_cos_series(x);
    }

    let residual = x - ec * sx + es * (1.0 - cx) - dm;
    if residual * residual > DANBYB {
        return None;
    }
    Some((x, sx, cx))
}

/// Drift one body along its two-body orbit about `central` for `dt`.
///
/// `central` is a read-only snapshot; only `particle` is mutated, and only
/// when the solve succeeds. On error the body is left exactly as it was.
pub(crate) fn drift_particle(
    particle: &mut Particle,
    central: &Particle,
    g: f64,
    dt: f64,
) -> Result<(), DriftError> {
    let pos0 = particle.position - central.position;
    let vel0 = particle.velocity;

    let r0 = pos0.length();
    let v0s = vel0.length_squared();
    let u = pos0.dot(vel0);
    let mu = g * (central.mass + particle.mass);
    let alpha = 2.0 * mu / r0 - v0s;

    let mut dt1 = dt;
    if alpha > 0.0 {
        // Bound orbit: wrap the step into one orbital period and try the
        // fast path when both the step and the eccentricity are small.
        let a = mu / alpha;
        let asq = a * a;
        let en = (mu / (a * asq)).sqrt();
        let ec = 1.0 - r0 / a;
        let es = u / (en * asq);
        let esq = ec * ec + es * es;
        let dm = dt1 * en - (dt1 * en / TAU).floor() * TAU;
        dt1 = dm / en;

        if esq * dm * dm < FAST_GATE_ESQ_DM2 && !(dm * dm > FAST_GATE_DM2 || esq > FAST_GATE_ESQ) {
            if let Some((x, sx, cx)) = mean_anomaly_step(dm, es, ec) {
                let fp = 1.0 - ec * cx + es * sx;
                let lagrange = Lagrange {
                    f: (a / r0) * (cx - 1.0) + 1.0,
                    g: dt1 + (sx - x) / en,
                    fdot: -(a / (r0 * fp)) * en * sx,
                    gdot: (cx - 1.0) / fp + 1.0,
                };
                let (pos, vel) = lagrange.apply(pos0, vel0);
                particle.position = pos + central.position;
                particle.velocity = vel;
                return Ok(());
            }
        }
    }

    let solution = solve_universal(dt1, r0, mu, alpha, u).ok_or(DriftError::SolverDiverged)?;
    let lagrange = Lagrange {
        f: 1.0 - (mu / r0) * solution.c2,
        g: dt1 - mu * solution.c3,
        fdot: -(mu / (solution.fp * r0)) * solution.c1,
        gdot: 1.0 - (mu / solution.fp) * solution.c2,
    };
    let (pos, vel) = lagrange.apply(pos0, vel0);
    particle.position = pos + central.position;
    particle.velocity = vel;
    Ok(())
}
