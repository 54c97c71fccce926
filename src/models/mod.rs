pub mod audit_log;
pub mod inventory;
pub mod patrimony;
pub mod sector;
pub mod transfer;
pub mod user;
pub mod write_off;

pub use audit_log::{Attachment, AttachmentQuery, AuditLog, AuditLogQuery};
pub use inventory::{
    AddItem, BulkAddItems, BulkAddResult, CreateSession, FinalizeSession, InventoryItem,
    InventorySession, InventoryStats, ItemSituation, ReviewItem, ScopeType, SessionQuery,
    SessionStatus, SessionWithItems, UpdateSession,
};
pub use patrimony::{AssetStatus, CreatePatrimony, Patrimony, PatrimonyQuery, UpdatePatrimony};
pub use sector::{Category, CreateCategory, CreateSector, Sector, UpdateCategory, UpdateSector};
pub use transfer::{
    ApproveTransfer, CreateTransfer, RejectTransfer, Transfer, TransferQuery, TransferStatus,
};
pub use user::{CreateUser, LoginRequest, LoginResponse, UpdateUser, User, UserRole};
pub use write_off::{
    ApproveWriteOff, CreateWriteOff, RejectWriteOff, WriteOff, WriteOffQuery, WriteOffStatus,
};
