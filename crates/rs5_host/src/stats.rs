//! Cost statistics for plugin operations.
//!
//! The software model has no wall clock of its own: an operation costs the
//! number of simulated ticks between its first register access and its
//! result. These figures are what the `parallel` and `convert` commands
//! report.

/// Number of histogram buckets. The last bucket collects everything above.
const BUCKETS: usize = 16;

/// Running min/max/average of per-operation tick counts with a coarse
/// histogram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickStats {
    pub min: u64,
    pub max: u64,
    pub sum: u64,
    pub count: u64,
    pub bucket_width: u64,
    pub buckets: [u64; BUCKETS],
}

impl TickStats {
    /// Empty tracker whose histogram buckets are `bucket_width` ticks wide.
    pub fn new(bucket_width: u64) -> Self {
        Self {
            min: u64::MAX,
            max: 0,
            sum: 0,
            count: 0,
            bucket_width: bucket_width.max(1),
            buckets: [0; BUCKETS],
        }
    }

    /// Records the cost of one operation.
    pub fn update(&mut self, ticks: u64) {
        self.min = self.min.min(ticks);
        self.max = self.max.max(ticks);
        self.sum += ticks;
        self.count += 1;
        let idx = (ticks / self.bucket_width).min(BUCKETS as u64 - 1) as usize;
        self.buckets[idx] += 1;
    }

    /// Folds another tracker with the same bucket width into this one.
    pub fn merge(mut self, other: &Self) -> Self {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.sum += other.sum;
        self.count += other.count;
        for (mine, theirs) in self.buckets.iter_mut().zip(other.buckets) {
            *mine += theirs;
        }
        self
    }

    /// Average ticks per operation, or 0.0 before the first update.
    pub fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum as f64 / self.count as f64
        }
    }

    /// Prints min/avg/max and the tick histogram to stdout.
    pub fn print_report(&self) {
        println!("\nOperation cost (simulated ticks)");
        println!("Count: {}", self.count);
        if self.count == 0 {
            return;
        }
        println!("Min:   {}", self.min);
        println!("Avg:   {:.2}", self.avg());
        println!("Max:   {}", self.max);

        println!("Distribution ({} tick buckets):", self.bucket_width);
        for (i, &count) in self.buckets.iter().enumerate() {
            if count > 0 {
                let lower = i as u64 * self.bucket_width;
                let upper = lower + self.bucket_width;
                let open = if i == BUCKETS - 1 { "+" } else { "" };
                println!("[{lower:6}-{upper:6}{open}]: {count}");
            }
        }
    }
}
