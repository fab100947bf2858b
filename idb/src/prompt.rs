//! Operator interaction
//!
//! Every interaction blocks until the operator answers. There is no timeout.

use std::future::Future;

/// The operator sitting in front of the device
pub trait Prompt: Send {
    /// Shows a progress or guidance line
    fn say(&mut self, message: &str);

    /// Waits until the operator has done what `message` asks for
    fn pause(&mut self, message: &str) -> impl Future<Output = ()> + Send;

    /// Asks a yes/no question
    fn agree(&mut self, question: &str) -> impl Future<Output = bool> + Send;

    /// Lets the operator pick one of `options`, `None` when they pick nothing
    fn choose(
        &mut self,
        question: &str,
        options: &[String],
    ) -> impl Future<Output = Option<usize>> + Send;
}
