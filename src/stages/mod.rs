//! Built-in stages.

pub mod collector;
pub mod constants;
#[cfg(feature = "io-csv")]
pub mod csv_output;
pub mod csv_input;
pub mod generator;

pub use collector::{CollectedRows, RowCollector};
pub use constants::{AddConstants, ConstantField, ConstantsConfig};
#[cfg(feature = "io-csv")]
pub use csv_output::{CsvOutput, CsvOutputConfig};
pub use csv_input::{CsvInput, CsvInputConfig};
pub use generator::RowsInput;
