//! Concrete repository implementations.

pub mod ticket_type;

pub use ticket_type::TicketTypeRepository;
