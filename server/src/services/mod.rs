pub mod booking;
pub mod entry;
pub mod fonts;
pub mod gateway;
pub mod ids;
pub mod notifier;
pub mod pdf;
pub mod qr;
pub mod retry;
pub mod signature;
pub mod storage;

pub use booking::{BookingPipeline, IssueRequest, Issuance, IssuanceError, Stage, StageError};
pub use entry::{EntryError, EntryOutcome, EntryVerifier};
pub use gateway::{CreateOrder, GatewayError, GatewayOrder, OrderNotes, PaymentGateway, RazorpayClient};
pub use notifier::{BookingConfirmation, LogNotifier, NotificationError, Notifier, SmtpNotifier};
pub use storage::{MemoryObjectStore, ObjectStore, StorageError, SupabaseStore};
