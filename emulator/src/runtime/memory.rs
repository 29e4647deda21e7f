use thiserror::Error;
use tracing::trace;

use crate::constants::{Address, Value};

/// Represents errors related to memory accesses
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MemoryError {
    /// The address (or the end of the requested range) falls outside memory
    #[error("address {address} out of bounds (memory holds {len} cells)")]
    OutOfBounds { address: Address, len: usize },
}

/// Holds the memory cells of one machine.
///
/// Built as a defensive copy of the source program, so machines constructed
/// from the same program never alias state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Memory {
    cells: Vec<Value>,
}

impl From<&[Value]> for Memory {
    fn from(program: &[Value]) -> Self {
        trace!(cells = program.len(), "memory created");
        Self {
            cells: program.to_vec(),
        }
    }
}

impl Memory {
    /// Get the value of a cell
    ///
    /// # Errors
    ///
    /// It fails if the address is out of bounds.
    pub fn get(&self, address: Address) -> Result<Value, MemoryError> {
        let value = self
            .cells
            .get(address)
            .copied()
            .ok_or(MemoryError::OutOfBounds {
                address,
                len: self.cells.len(),
            })?;

        trace!(address, value, "memory get");

        Ok(value)
    }

    /// Get a view of `length` cells starting at `address`
    ///
    /// The slice borrows from the memory, so it cannot be kept across writes.
    ///
    /// # Errors
    ///
    /// It fails if any part of the range is out of bounds.
    pub fn get_range(&self, address: Address, length: usize) -> Result<&[Value], MemoryError> {
        let error = MemoryError::OutOfBounds {
            address,
            len: self.cells.len(),
        };
        let end = address.checked_add(length).ok_or(error)?;
        let cells = self.cells.get(address..end).ok_or(error)?;

        trace!(address, length, "memory get range");

        Ok(cells)
    }

    /// Set the value of a cell
    ///
    /// Any integer is a legal cell value; no semantic validation happens here.
    ///
    /// # Errors
    ///
    /// It fails if the address is out of bounds.
    pub fn set(&mut self, address: Address, value: Value) -> Result<(), MemoryError> {
        let len = self.cells.len();
        let cell = self
            .cells
            .get_mut(address)
            .ok_or(MemoryError::OutOfBounds { address, len })?;

        trace!(address, value, old_value = *cell, "memory set");

        *cell = value;
        Ok(())
    }

    /// Number of cells
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// The whole memory as a slice, mostly useful for inspection in tests
    /// and memory dumps
    #[must_use]
    pub fn as_slice(&self) -> &[Value] {
        &self.cells
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn get_test() {
        let memory = Memory::from([1, 2, 3].as_slice());

        assert_eq!(memory.get(0), Ok(1));
        assert_eq!(memory.get(2), Ok(3));
        assert_eq!(
            memory.get(3),
            Err(MemoryError::OutOfBounds { address: 3, len: 3 })
        );
    }

    #[test]
    fn get_range_test() {
        let memory = Memory::from([1, 2, 3, 4].as_slice());

        assert_eq!(memory.get_range(1, 3), Ok([2, 3, 4].as_slice()));
        assert_eq!(memory.get_range(4, 0), Ok([].as_slice()));
        assert_eq!(
            memory.get_range(2, 3),
            Err(MemoryError::OutOfBounds { address: 2, len: 4 })
        );
    }

    #[test]
    fn set_test() {
        let mut memory = Memory::from([1, 2, 3].as_slice());

        memory.set(1, -42).unwrap();

        assert_eq!(memory.as_slice(), &[1, -42, 3]);
        assert_eq!(
            memory.set(3, 0),
            Err(MemoryError::OutOfBounds { address: 3, len: 3 })
        );
    }

    #[test]
    fn defensive_copy_test() {
        let program = vec![1, 2, 3];
        let mut memory = Memory::from(program.as_slice());

        memory.set(0, 99).unwrap();

        assert_eq!(program, vec![1, 2, 3]);
        assert_eq!(memory.as_slice(), &[99, 2, 3]);
    }
}
