pub mod effective;
pub mod masking;

pub use effective::{effective_table_access, ColumnAccess, EffectiveTableAccess};
pub use masking::mask;
