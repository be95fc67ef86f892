//! Domain types for stockpulse

pub mod bar;
pub mod series;
pub mod symbol;
pub mod window;

pub use bar::Bar;
pub use series::{PriceSeries, SeriesError};
pub use symbol::{Exchange, Symbol, SymbolError};
pub use window::{parse_date, DateWindow, Period, PeriodError};
