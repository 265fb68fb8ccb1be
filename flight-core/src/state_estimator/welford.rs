/// Online mean and variance of a scalar stream. NaN samples are skipped so a
/// sensor dropout does not poison the pad reference.
#[derive(Debug, Clone, Default)]
pub struct Welford {
    count: u32,
    mean: f32,
    m2: f32,
}

impl Welford {
    pub const fn new() -> Self {
        Self {
            count: 0,
            mean: 0.0,
            m2: 0.0,
        }
    }

    pub fn update(&mut self, x: f32) {
        if x.is_nan() {
            return;
        }
        self.count = self.count.saturating_add(1);
        let n = self.count as f32;

        let delta = x - self.mean;
        self.mean += delta / n;
        let delta2 = x - self.mean;
        self.m2 += delta * delta2;
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn mean(&self) -> Option<f32> {
        if self.count > 0 { Some(self.mean) } else { None }
    }

    /// Population variance.
    pub fn variance(&self) -> Option<f32> {
        if self.count > 0 {
            Some(self.m2 / self.count as f32)
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        *self = Self::new();
    }
}
