//! StepSource port - per-tick progress increments.

/// Yields the increment applied by one tick.
///
/// Implementations must return a finite value in `[0, max_step]`.
pub trait StepSource: Send {
    fn next_step(&mut self, max_step: f64) -> f64;
}

impl<S: StepSource + ?Sized> StepSource for Box<S> {
    fn next_step(&mut self, max_step: f64) -> f64 {
        (**self).next_step(max_step)
    }
}
