//! The particle system and the drift scheduler.
//!
//! A [`ParticleSystem`] owns the bodies and the gravitational constant;
//! there is no global state, so independent systems can be stepped side by
//! side (and tests can build tiny synthetic ones). The body at index 0 is
//! the central mass: it is never drifted, and during a drift pass every
//! other body reads only a snapshot of it, which is what makes the
//! per-body loop safe to run in parallel.

use core::fmt;
use std::error::Error;

use glam::DVec3;
use rayon::prelude::*;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::drift::{drift_particle, DriftError};
use crate::RETRY_SUBSTEPS;

/// A point mass with mutable Cartesian state.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Particle {
    /// Position, in the simulation's length unit.
    pub position: DVec3,
    /// Velocity, in the simulation's length unit per time unit.
    pub velocity: DVec3,
    /// Mass, in the simulation's mass unit.
    pub mass: f64,
}

impl Particle {
    /// Creates a new particle from its state vectors and mass.
    pub fn new(position: DVec3, velocity: DVec3, mass: f64) -> Self {
        Self {
            position,
            velocity,
            mass,
        }
    }
}

/// A body that could not complete a drift pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PartialDrift {
    /// Index of the body in [`ParticleSystem::particles`].
    pub index: usize,
    /// How many of the ten retry substeps completed before the solver
    /// diverged again. The body's state corresponds to its last completed
    /// substep, so `0` means it did not move at all this pass.
    pub completed_substeps: usize,
}

/// Outcome of a drift pass in which at least one body failed to converge.
///
/// Every body not listed in `failures` was advanced by the full step; the
/// listed ones were advanced by `completed_substeps / 10` of it. The pass
/// never panics and never leaves a body in a half-applied state. This
/// error exists so the caller can decide whether partially advanced bodies
/// are acceptable, rather than having the condition swallowed silently.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DriftPassError {
    /// The bodies that failed, in index order.
    pub failures: Vec<PartialDrift>,
}

impl fmt::Display for DriftPassError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Kepler drift did not converge for {} bodies (index: completed substeps):",
            self.failures.len()
        )?;
        for failure in &self.failures {
            write!(
                f,
                " {}: {}/{}",
                failure.index, failure.completed_substeps, RETRY_SUBSTEPS
            )?;
        }
        Ok(())
    }
}

impl Error for DriftPassError {}

/// A provider of per-particle accelerations for the kick phase.
///
/// The force computation itself lives outside this crate; the integrator
/// only needs something that can fill an acceleration buffer. The buffer
/// arrives zeroed with one slot per particle (central body included, since
/// its acceleration feeds the indirect term), and implementations add
/// their contributions into it.
pub trait ForceModel {
    /// Accumulate accelerations for every particle into `accel`.
    fn accumulate(&self, particles: &[Particle], g: f64, accel: &mut [DVec3]);
}

/// An N-body system dominated by the central mass at index 0.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ParticleSystem {
    /// The bodies. Index 0 is the central mass; it is read but never moved
    /// by the drift pass.
    pub particles: Vec<Particle>,
    /// The gravitational constant in the simulation's unit system.
    pub g: f64,
}

impl ParticleSystem {
    /// Creates an empty system with the given gravitational constant.
    pub fn new(g: f64) -> Self {
        Self {
            particles: Vec::new(),
            g,
        }
    }

    /// Appends a particle and returns its index. The first particle added
    /// becomes the central body.
    pub fn add_particle(&mut self, particle: Particle) -> usize {
        self.particles.push(particle);
        self.particles.len() - 1
    }

    /// Advance every non-central body along its two-body orbit for `dt`.
    ///
    /// Bodies are propagated independently and in parallel against a
    /// snapshot of the central body; the call returns only once the whole
    /// pass is complete, so the caller can read any body's state (or run
    /// the kick phase) immediately afterwards.
    ///
    /// A body whose solve diverges is retried with ten substeps of
    /// `dt / 10`; if a substep diverges too, the body stays at
    /// its last completed substep and the pass reports it in the returned
    /// [`DriftPassError`]. All other bodies still complete the full step.
    ///
    /// A zero step is a no-op.
    pub fn drift(&mut self, dt: f64) -> Result<(), DriftPassError> {
        if dt == 0.0 {
            return Ok(());
        }
        let Some((central, rest)) = self.particles.split_first_mut() else {
            return Ok(());
        };
        let central = *central;
        let g = self.g;

        let mut failures: Vec<PartialDrift> = rest
            .par_iter_mut()
            .enumerate()
            .filter_map(|(i, particle)| {
                drift_with_retry(particle, &central, g, dt)
                    .err()
                    .map(|completed_substeps| PartialDrift {
                        // The slice starts after the central body.
                        index: i + 1,
                        completed_substeps,
                    })
            })
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            failures.sort_unstable_by_key(|failure| failure.index);
            Err(DriftPassError { failures })
        }
    }

    /// Advance the whole system by one Wisdom-Holman step.
    ///
    /// With `self_gravity` enabled this is the drift-kick-drift leapfrog:
    /// half a drift, one velocity kick from the supplied accelerations,
    /// and the second half drift. The central body's acceleration is
    /// subtracted from every kick (the indirect term), keeping the frame
    /// centered on it. With `self_gravity` disabled the bodies do not
    /// perturb each other and the step is a single full-length drift.
    ///
    /// Partial failures from both drift passes are merged into one report;
    /// the kick still runs between them, matching the always-produce-some-
    /// output policy of the drift pass itself.
    pub fn step(
        &mut self,
        dt: f64,
        forces: &impl ForceModel,
        self_gravity: bool,
    ) -> Result<(), DriftPassError> {
        if !self_gravity {
            return self.drift(dt);
        }

        let mut failures = Vec::new();
        if let Err(error) = self.drift(dt / 2.0) {
            failures.extend(error.failures);
        }

        let mut accel = vec![DVec3::ZERO; self.particles.len()];
        forces.accumulate(&self.particles, self.g, &mut accel);
        let central_accel = accel.first().copied().unwrap_or(DVec3::ZERO);
        for (particle, a) in self.particles.iter_mut().zip(accel.iter()).skip(1) {
            particle.velocity += dt * (*a - central_accel);
        }

        if let Err(error) = self.drift(dt / 2.0) {
            failures.extend(error.failures);
        }

        if failures.is_empty() {
            Ok(())
        } else {
            failures.sort_unstable_by_key(|failure| failure.index);
            Err(DriftPassError { failures })
        }
    }
}

/// Drift one body, falling back to ten substeps when the full step fails.
///
/// `Err(n)` reports that substep `n` (zero-based) diverged; the body keeps
/// the state from the `n` substeps that did complete.
fn drift_with_retry(
    particle: &mut Particle,
    central: &Particle,
    g: f64,
    dt: f64,
) -> Result<(), usize> {
    match drift_particle(particle, central, g, dt) {
        Ok(()) => Ok(()),
        Err(DriftError::SolverDiverged) => {
            let substep = dt / RETRY_SUBSTEPS as f64;
            for completed in 0..RETRY_SUBSTEPS {
                if drift_particle(particle, central, g, substep).is_err() {
                    return Err(completed);
                }
            }
            Ok(())
        }
    }
}
