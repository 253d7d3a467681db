pub mod crypto;
pub mod domain;
pub mod error;
pub mod ports;
pub mod service;

pub use crypto::{decrypt, encrypt, hash_password, verify_password, CryptoError, EncryptedPayload};
pub use domain::{
    Category, CategoryId, ClonedFormDraft, Form, FormId, FormMeta, ModificationKey, MoveDirection,
    Question, QuestionId, Selection, ShareId, SharedFormRecord, StoredFormRecord,
};
pub use error::{FormError, FormResult};
pub use ports::{FormStore, StoreError, StoreResult};
pub use service::{
    FormService, PublishReceipt, PublishRequest, ShareAccess, VerifiedForm, RECENT_FORMS_LIMIT,
};
