pub mod booking;
pub mod conflict;
pub mod lock;
pub mod memory_store;
pub mod participants;
pub mod store;
pub mod supabase_store;

pub use booking::AppointmentScheduler;
pub use conflict::SlotConflictChecker;
pub use memory_store::InMemoryAppointmentStore;
pub use participants::{ParticipantDirectory, SupabaseParticipantDirectory};
pub use store::{AppointmentStore, StoreError};
pub use supabase_store::SupabaseAppointmentStore;
