//! Frame rendering: camera and palette, the CPU backend, and the parallel sweep.

pub mod backend;
pub mod camera;
/// `vello_cpu` scatter renderer writing PNG frames.
pub mod cpu;
pub mod palette;
/// 360-degree fan-out/fan-in over a worker pool.
pub mod sweep;
