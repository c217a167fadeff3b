pub mod tickets;

pub use tickets::{ticket_transition, TicketService};
