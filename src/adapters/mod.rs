//! Adapters: concrete implementations of the port traits.
//!
//! | Adapter     | Implements                     | Connects to            |
//! |-------------|--------------------------------|------------------------|
//! | `csv_store` | SessionSink                    | CSV file per session   |
//! | `sim`       | OutputPin, VoltagePort, Clock  | Simulated cuff model   |
//! | `time`      | ClockPort                      | Host monotonic + local |

pub mod csv_store;
pub mod sim;
pub mod time;

pub use csv_store::CsvSessionStore;
pub use sim::SimulatedCuff;
pub use time::SystemClock;
