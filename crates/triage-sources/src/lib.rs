pub mod handler;
pub mod helpdesk;
pub mod table;

pub use handler::{TicketBundle, TicketSource};
pub use helpdesk::{HelpdeskClient, HelpdeskError, HelpdeskSettings};
pub use table::{TicketTable, load_table, resolve_ticket_ids};
