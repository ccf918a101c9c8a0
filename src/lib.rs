//! # Universal-variable Kepler drift
//!
//! This library crate implements the "drift" half of a mixed-variable
//! (Wisdom-Holman) symplectic integrator for gravitational N-body systems
//! dominated by a central mass.
//!
//! In a Wisdom-Holman scheme the motion of every body is split into two
//! alternating parts: a *drift* along the body's instantaneous two-body
//! (Keplerian) orbit about the central mass, and a *kick* that applies the
//! mutual perturbations between the orbiting bodies. The drift is exact for
//! any step size, being the analytic solution of the two-body problem, so
//! the scheme stays well-behaved even with steps that would destabilize a
//! direct force integration.
//!
//! The drift itself is the hard part. This crate solves the universal
//! Kepler equation, which handles elliptic, parabolic, and hyperbolic
//! motion through a single generalized anomaly, using:
//!
//! - [Stumpff functions](stumpff()) with quarter-argument range reduction,
//! - a fast closed-form-like path for short, low-eccentricity elliptic
//!   steps,
//! - a bounded Newton iteration with third-order (Halley-family)
//!   corrections, and
//! - a Laguerre-Conway fallback with a very wide convergence basin.
//!
//! Bodies are propagated independently against a snapshot of the central
//! body, so the per-body loop runs in parallel.
//!
//! ## Example
//!
//! ```rust
//! use glam::DVec3;
//! use kepler_drift::{Particle, ParticleSystem};
//!
//! // Central mass 1 with G = 1, plus a satellite on a circular orbit of
//! // radius 1. The orbital period is 2 pi.
//! let mut system = ParticleSystem::new(1.0);
//! system.add_particle(Particle::new(DVec3::ZERO, DVec3::ZERO, 1.0));
//! system.add_particle(Particle::new(
//!     DVec3::new(1.0, 0.0, 0.0),
//!     DVec3::new(0.0, 1.0, 0.0),
//!     0.0,
//! ));
//!
//! // Half a period later the satellite is on the far side of the orbit.
//! system.drift(std::f64::consts::PI).unwrap();
//!
//! let satellite = &system.particles[1];
//! assert!((satellite.position - DVec3::new(-1.0, 0.0, 0.0)).length() < 1e-9);
//! assert!((satellite.velocity - DVec3::new(0.0, -1.0, 0.0)).length() < 1e-9);
//! ```

#![warn(missing_docs)]

mod drift;
mod solvers;
mod stumpff;
mod system;

pub use drift::DriftError;
pub use stumpff::{stumpff, Stumpff};
pub use system::{DriftPassError, ForceModel, Particle, ParticleSystem, PartialDrift};

/// Convergence tolerance for the Kepler-equation residual, normalized by
/// the timestep.
///
/// A solve is accepted when `(f / dt)^2 < DANBYB^2`, i.e. when the
/// remaining time error is below `1e-13` of the step being taken.
///
/// The value is the classic tuning from Danby's treatment of the universal
/// Kepler equation ("Fundamentals of Celestial Mechanics", 2nd ed., §6.9)
/// and is used unchanged: it encodes an empirically balanced margin between
/// accuracy and wasted iterations.
pub(crate) const DANBYB: f64 = 1.0e-13;

/// Iteration budget for the primary Newton solver.
///
/// With a decent starting guess and third-order corrections, the Newton
/// iteration either converges in a handful of steps or is not going to
/// converge at all; six attempts is enough to tell the two cases apart
/// before handing over to the fallback.
pub(crate) const NEWTON_MAX_ITERS: usize = 6;

/// Iteration budget for the Laguerre-Conway fallback.
///
/// The fallback trades speed for an essentially global convergence basin,
/// so it gets a far larger budget than the Newton path. Exhausting it is
/// fatal for the solve attempt.
pub(crate) const LAGUERRE_MAX_ITERS: usize = 400;

/// The order constant `n` of the Laguerre-Conway iteration.
///
/// The paper "An improved algorithm due to Laguerre for the solution of
/// Kepler's equation" by Bruce A. Conway says:
///
/// > Similar experimentation has been done with values of n both greater and smaller
/// > than n = 5. The speed of convergence seems to be very insensitive to the choice of n.
/// > No value of n was found to yield consistently better convergence properties than the
/// > choice of n = 5 though specific cases were found where other choices would give
/// > faster convergence.
pub(crate) const LAGUERRE_N: f64 = 5.0;

/// Fixed constant standing in for `s^2` in the fallback's second-derivative
/// estimate.
///
/// Deliberately oversized: damping the curvature term keeps the
/// Laguerre-Conway denominator well away from cancellation when the step
/// (and therefore `s`) is very large.
pub(crate) const LAGUERRE_FPP_DAMPING: f64 = 40.0;

/// Joint gate on `(e^2, dm^2)` for the fast elliptic path:
/// `e^2 * dm^2` must stay below this.
pub(crate) const FAST_GATE_ESQ_DM2: f64 = 0.0016;

/// Fast elliptic path gate: squared mean-anomaly increment above this is
/// too long a step for the series seed.
pub(crate) const FAST_GATE_DM2: f64 = 0.16;

/// Fast elliptic path gate: squared eccentricity above this is too
/// eccentric for the series seed.
pub(crate) const FAST_GATE_ESQ: f64 = 0.36;

/// Largest `dt / r0` for which the truncated-series initial guess is used
/// on elliptic orbits; beyond it the trigonometric estimate takes over.
pub(crate) const GUESS_SERIES_MAX_STEP: f64 = 0.4;

/// Offset factor for the trigonometric initial guess, displacing the seed
/// by a fraction of the eccentricity toward the root.
pub(crate) const GUESS_ECC_OFFSET: f64 = 0.85;

/// Number of substeps a body is retried with after its full-step solve
/// fails to converge (each substep is the step divided by this count).
pub(crate) const RETRY_SUBSTEPS: usize = 10;
