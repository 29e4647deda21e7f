/// Index of a cell in a machine's memory
pub type Address = usize;

/// Content of a memory cell
///
/// This is also the unit exchanged on machine input/output channels.
pub type Value = i64;
