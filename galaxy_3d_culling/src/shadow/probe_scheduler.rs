/// Reflection probe render queue.
///
/// Redrawing a probe is a pipeline: six cube faces, then one roughness
/// layer per step. Probes in `Once` mode share a single lane: only the
/// probe at its head advances, one step per frame. Probes in `Always`
/// mode run their whole pipeline every frame they are queued.

use std::collections::VecDeque;
use rustc_hash::FxHashSet;
use crate::backend::{BackendHandle, ReflectionProbeUpdateMode};
use crate::scene::InstanceKey;

/// Cube faces rendered per probe update.
pub const PROBE_FACES: u32 = 6;

/// One unit of probe work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStep {
    /// Render one cube face (face 0 also acquires the atlas slot)
    Face(u32),
    /// Filter one roughness layer of the rendered cube
    RoughnessLayer(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ProbeJob {
    key: InstanceKey,
    handle: BackendHandle,
    mode: ReflectionProbeUpdateMode,
    next_step: u32,
}

impl ProbeJob {
    fn step(&self) -> ProbeStep {
        if self.next_step < PROBE_FACES {
            ProbeStep::Face(self.next_step)
        } else {
            ProbeStep::RoughnessLayer(self.next_step - PROBE_FACES)
        }
    }
}

/// Deduplicated queue of probes waiting for a redraw.
#[derive(Debug, Clone, Default)]
pub struct ProbeRenderQueue {
    jobs: VecDeque<ProbeJob>,
    queued: FxHashSet<InstanceKey>,
}

impl ProbeRenderQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a probe. Returns `false` if it was already queued.
    pub fn schedule(&mut self, key: InstanceKey, handle: BackendHandle, mode: ReflectionProbeUpdateMode) -> bool {
        if !self.queued.insert(key) {
            return false;
        }
        self.jobs.push_back(ProbeJob { key, handle, mode, next_step: 0 });
        true
    }

    pub fn contains(&self, key: InstanceKey) -> bool {
        self.queued.contains(&key)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Drop a probe (freed or moved out of the scenario).
    pub fn remove(&mut self, key: InstanceKey) {
        if self.queued.remove(&key) {
            self.jobs.retain(|job| job.key != key);
        }
    }

    /// Append the jobs of `other` not queued here yet, keeping their progress.
    pub fn merge(&mut self, other: ProbeRenderQueue) {
        for job in other.jobs {
            if self.queued.insert(job.key) {
                self.jobs.push_back(job);
            }
        }
    }

    /// Steps in progress for a probe, if queued.
    pub fn progress(&self, key: InstanceKey) -> Option<u32> {
        self.jobs.iter().find(|job| job.key == key).map(|job| job.next_step)
    }

    /// Advance the queue by one frame.
    ///
    /// `run` performs a step and returns `false` when it could not run
    /// (no atlas slot). The job then keeps its place for the next frame.
    /// Returns the probes whose pipeline completed.
    pub fn advance<F>(&mut self, roughness_layers: u32, mut run: F) -> Vec<InstanceKey>
    where
        F: FnMut(InstanceKey, BackendHandle, ProbeStep) -> bool,
    {
        let total_steps = PROBE_FACES + roughness_layers;
        let mut finished = Vec::new();
        let mut once_lane_used = false;

        for job in self.jobs.iter_mut() {
            match job.mode {
                ReflectionProbeUpdateMode::Always => {
                    while job.next_step < total_steps {
                        if !run(job.key, job.handle, job.step()) {
                            break;
                        }
                        job.next_step += 1;
                    }
                }
                ReflectionProbeUpdateMode::Once => {
                    if once_lane_used {
                        continue;
                    }
                    once_lane_used = true;
                    if run(job.key, job.handle, job.step()) {
                        job.next_step += 1;
                    }
                }
            }
            if job.next_step >= total_steps {
                finished.push(job.key);
            }
        }

        for key in &finished {
            self.queued.remove(key);
        }
        self.jobs.retain(|job| job.next_step < total_steps);
        finished
    }
}

#[cfg(test)]
#[path = "probe_scheduler_tests.rs"]
mod tests;
