// Entity Models
// Typed records exchanged with the store. The engine never sees raw rows.
//
// Each entity has:
// - Stable identity (UUID string) that never changes
// - A closed set of statuses / flags (unknown values are rejected on load)

pub mod budget;
pub mod draw;
pub mod invoice;
pub mod wire_batch;

pub use budget::BudgetLine;
pub use draw::{DrawRequest, DrawRequestLine, DrawStatus, LineFlag};
pub use invoice::{Invoice, InvoiceFlags, InvoiceStatus, StatusDetail};
pub use wire_batch::{WireBatch, WireBatchStatus};
