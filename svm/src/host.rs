/// Receives the effects a running program performs.
pub trait Host {
    fn echo(&mut self, value: f32);
}

/// Collects printed values, mostly for tests.
impl Host for Vec<f32> {
    fn echo(&mut self, value: f32) {
        self.push(value);
    }
}

/// Prints one value per line.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutHost;

impl Host for StdoutHost {
    fn echo(&mut self, value: f32) {
        println!("{}", value);
    }
}
