mod money;

pub mod op;

pub use money::{Money, MoneyConversionError, THB_CURRENCY_CODE, THB_CURRENCY_CODE_LOWER};
