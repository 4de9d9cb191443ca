pub mod black_body;
pub mod camera;
pub mod config;
pub mod curved_space;
pub mod disk;
pub mod error;
pub mod geodesic;
pub mod logging;
pub mod output;
pub mod params;
pub mod post;
pub mod ray_tracer;
pub mod session;
pub mod sky;
pub mod trajectory;

pub use config::Config;
pub use error::{Error, Result};
pub use output::{OutputImage, Resolution};
pub use params::{Command, ParameterStore, SimulationParameters};
pub use ray_tracer::{render, RayTracer, RenderOutput, Termination};
pub use session::Session;
