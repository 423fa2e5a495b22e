use serde::Serialize;

pub const DEFAULT_CAPACITY: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryPoint {
    /// Wall-clock label, `HH:MM:SS`.
    pub timestamp: String,
    pub cpu_pct: f32,
    pub mem_pct: f32,
}

impl HistoryPoint {
    pub fn now(cpu_pct: f32, mem_pct: f32) -> Self {
        HistoryPoint {
            timestamp: chrono::Local::now().format("%H:%M:%S").to_string(),
            cpu_pct,
            mem_pct,
        }
    }
}

/// Fixed-capacity rolling window of samples, oldest evicted first.
///
/// Storage is allocated once; appends past capacity overwrite the slot under
/// the write cursor. Not synchronized: callers sharing it across threads must
/// serialize access.
#[derive(Debug, Clone)]
pub struct HistoryBuffer<T = HistoryPoint> {
    slots: Vec<T>,
    write_pos: usize,
    capacity: usize,
}

impl<T> HistoryBuffer<T> {
    /// A zero capacity makes every append a no-op.
    pub fn new(capacity: usize) -> Self {
        HistoryBuffer {
            slots: Vec::with_capacity(capacity),
            write_pos: 0,
            capacity,
        }
    }

    pub fn append(&mut self, point: T) {
        if self.capacity == 0 {
            return;
        }
        if self.slots.len() < self.capacity {
            self.slots.push(point);
        } else {
            self.slots[self.write_pos] = point;
        }
        self.write_pos = (self.write_pos + 1) % self.capacity;
    }

    /// Points oldest-first.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        // Until the buffer wraps, the oldest point is at index 0.
        let head = if self.slots.len() < self.capacity {
            0
        } else {
            self.write_pos
        };
        self.slots[head..].iter().chain(&self.slots[..head])
    }

    pub fn snapshot(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<&T> {
        if self.slots.is_empty() {
            return None;
        }
        let idx = (self.write_pos + self.capacity - 1) % self.capacity;
        self.slots.get(idx)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T> Default for HistoryBuffer<T> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
