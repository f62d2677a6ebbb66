/// Position of an event within the history of its aggregate instance. Starts from 1.
pub type SequenceNumber = i32;

/// Global position of an event in the event log. Strictly increasing, not necessarily dense.
pub type Offset = i64;
