use crate::error::BoundsFault;

/// Fixed-size, zero-initialised cell array. Addresses are signed so that a
/// negative operand reports as a bounds fault instead of wrapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Memory {
    cells: Vec<i64>,
}

impl Memory {
    pub fn new(size: usize) -> Self {
        Self {
            cells: vec![0; size],
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn read(&self, addr: i64) -> Result<i64, BoundsFault> {
        self.index(addr)
            .map(|i| self.cells[i])
            .ok_or(BoundsFault::Read {
                addr,
                size: self.len(),
            })
    }

    pub fn write(&mut self, addr: i64, value: i64) -> Result<(), BoundsFault> {
        let i = self.index(addr).ok_or(BoundsFault::Write {
            addr,
            size: self.len(),
        })?;
        self.cells[i] = value;
        Ok(())
    }

    pub fn clear(&mut self) {
        self.cells.fill(0);
    }

    pub fn cells(&self) -> &[i64] {
        &self.cells
    }

    fn index(&self, addr: i64) -> Option<usize> {
        usize::try_from(addr).ok().filter(|&i| i < self.cells.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_negative_and_past_end() {
        let mut mem = Memory::new(4);
        assert_eq!(mem.read(-1), Err(BoundsFault::Read { addr: -1, size: 4 }));
        assert_eq!(mem.write(4, 9), Err(BoundsFault::Write { addr: 4, size: 4 }));
        assert!(mem.cells().iter().all(|&c| c == 0));
        mem.write(3, 9).unwrap();
        assert_eq!(mem.read(3), Ok(9));
    }
}
