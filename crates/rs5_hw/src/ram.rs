use std::collections::HashMap;

/// Word-granular memory that only stores words written at least once.
///
/// Unwritten words read as zero. Addresses are byte addresses and are
/// truncated to word alignment.
#[derive(Debug, Default, Clone)]
pub struct Ram {
    words: HashMap<usize, u32>,
}

impl Ram {
    /// Empty memory; every word reads as zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Word at `addr`.
    pub fn read(&self, addr: usize) -> u32 {
        self.words.get(&(addr & !3)).copied().unwrap_or(0)
    }

    /// Stores `value` at `addr`.
    pub fn write(&mut self, addr: usize, value: u32) {
        self.words.insert(addr & !3, value);
    }

    /// Copies `words` into consecutive words starting at `addr`.
    pub fn load(&mut self, addr: usize, words: &[u32]) {
        for (i, &w) in words.iter().enumerate() {
            self.write(addr + i * 4, w);
        }
    }

    /// Reads `count` consecutive words starting at `addr`.
    pub fn dump(&self, addr: usize, count: usize) -> Vec<u32> {
        (0..count).map(|i| self.read(addr + i * 4)).collect()
    }

    /// Number of words ever written.
    pub fn resident_words(&self) -> usize {
        self.words.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwritten_words_read_zero() {
        let mut ram = Ram::new();
        ram.load(0x8000_2000, &[1, 2, 3]);
        assert_eq!(ram.dump(0x8000_1FFC, 5), vec![0, 1, 2, 3, 0]);
        assert_eq!(ram.read(0x8000_2006), 2);
        assert_eq!(ram.resident_words(), 3);
    }
}
