//! Interactive frame loop: commands are applied between frames, never during one.

use std::collections::VecDeque;

use crate::config::Config;
use crate::output::{OutputImage, Resolution};
use crate::params::{Command, ParameterStore, SimulationParameters};
use crate::ray_tracer::RayTracer;

pub struct Session {
    store: ParameterStore,
    tracer: RayTracer,
    resolution: Resolution,
    pending: VecDeque<Command>,
    frames: u64,
}

impl Session {
    pub fn new(config: &Config) -> Session {
        Session {
            store: ParameterStore::new(config.defaults),
            tracer: RayTracer::new(config).with_progress(false),
            resolution: Resolution::new(config.render.width, config.render.height),
            pending: VecDeque::new(),
            frames: 0,
        }
    }

    pub fn with_resolution(mut self, resolution: Resolution) -> Session {
        self.resolution = resolution;
        self
    }

    /// Queue a command for the start of the next frame.
    pub fn queue(&mut self, command: Command) {
        self.pending.push_back(command);
    }

    pub fn params(&self) -> SimulationParameters {
        self.store.params()
    }

    pub fn store(&self) -> &ParameterStore {
        &self.store
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Apply pending commands, advance the clock by `dt` unless paused and
    /// render one frame with the resulting parameters.
    pub fn frame(&mut self, dt: f64) -> OutputImage {
        while let Some(command) = self.pending.pop_front() {
            self.store.apply(command);
        }
        self.store.advance_time(dt);

        let params = self.store.params();
        let image = self.tracer.render(&params, self.resolution);
        self.frames += 1;
        log::trace!("Frame {} at t = {:.3}", self.frames, params.time);
        image
    }
}
