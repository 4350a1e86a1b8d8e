//! Core error types for the Punnet SDK.

use thiserror::Error;

/// A trait for assigning a stable, machine-readable string code to an error.
pub trait ErrorCode {
    /// Returns the unique, stable string identifier for this error variant.
    fn code(&self) -> &'static str;
}

/// Errors raised by the raw store stack (backing store, prefix store,
/// caches, typed stores).
#[derive(Error, Debug)]
pub enum StoreError {
    /// The supplied key was empty or otherwise unusable.
    #[error("Invalid store key: {0}")]
    InvalidKey(String),
    /// The supplied value failed validation before being stored.
    #[error("Invalid store value: {0}")]
    InvalidValue(String),
    /// The store has been closed and rejects all further operations.
    #[error("Store is closed")]
    StoreClosed,
    /// The iterator has been closed and rejects all further operations.
    #[error("Iterator is closed")]
    IteratorClosed,
    /// The operation's cancellation scope was cancelled.
    #[error("Operation cancelled")]
    Cancelled,
    /// The requested version does not exist in the versioned store.
    #[error("Unknown store version: {0}")]
    UnknownVersion(u64),
    /// A record failed to deserialize.
    #[error("Decode error: {0}")]
    Decode(String),
    /// A record failed to serialize.
    #[error("Encode error: {0}")]
    Encode(String),
    /// An error occurred in the store backend.
    #[error("Store backend error: {0}")]
    Backend(String),
    /// A commitment proof failed verification.
    #[error("Proof verification failed: {0}")]
    InvalidProof(String),
}

impl ErrorCode for StoreError {
    fn code(&self) -> &'static str {
        match self {
            Self::InvalidKey(_) => "STORE_INVALID_KEY",
            Self::InvalidValue(_) => "STORE_INVALID_VALUE",
            Self::StoreClosed => "STORE_CLOSED",
            Self::IteratorClosed => "STORE_ITERATOR_CLOSED",
            Self::Cancelled => "STORE_CANCELLED",
            Self::UnknownVersion(_) => "STORE_UNKNOWN_VERSION",
            Self::Decode(_) => "STORE_DECODE_ERROR",
            Self::Encode(_) => "STORE_ENCODE_ERROR",
            Self::Backend(_) => "STORE_BACKEND_ERROR",
            Self::InvalidProof(_) => "STORE_INVALID_PROOF",
        }
    }
}

/// Errors raised by the domain stores and capability layer.
#[derive(Error, Debug)]
pub enum StateError {
    /// The requested record was not found.
    #[error("Not found: {0}")]
    NotFound(String),
    /// An account name or account record failed validation.
    #[error("Invalid account: {0}")]
    InvalidAccount(String),
    /// A balance subtraction exceeded the available amount.
    #[error("Insufficient funds for {account}/{denom}: have {have}, need {need}")]
    InsufficientFunds {
        /// The account whose balance was debited.
        account: String,
        /// The denomination of the balance.
        denom: String,
        /// The amount currently held.
        have: u64,
        /// The amount the operation required.
        need: u64,
    },
    /// A balance addition overflowed the u64 amount.
    #[error("Balance overflow for {account}/{denom}")]
    BalanceOverflow {
        /// The account whose balance was credited.
        account: String,
        /// The denomination of the balance.
        denom: String,
    },
    /// A domain record failed validation.
    #[error("Invalid value: {0}")]
    InvalidValue(String),
    /// An error from the underlying store stack.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl ErrorCode for StateError {
    fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "STATE_NOT_FOUND",
            Self::InvalidAccount(_) => "STATE_INVALID_ACCOUNT",
            Self::InsufficientFunds { .. } => "STATE_INSUFFICIENT_FUNDS",
            Self::BalanceOverflow { .. } => "STATE_BALANCE_OVERFLOW",
            Self::InvalidValue(_) => "STATE_INVALID_VALUE",
            Self::Store(e) => e.code(),
        }
    }
}

/// Errors from cryptographic operations.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// The signature failed cryptographic verification.
    #[error("Signature verification failed")]
    VerificationFailed,
    /// The provided key material is malformed or invalid for the inferred algorithm.
    #[error("Invalid cryptographic key: {0}")]
    InvalidKey(String),
    /// The provided signature material is malformed for the inferred algorithm.
    #[error("Invalid signature format: {0}")]
    InvalidSignature(String),
}

impl ErrorCode for CryptoError {
    fn code(&self) -> &'static str {
        match self {
            Self::VerificationFailed => "CRYPTO_VERIFICATION_FAILED",
            Self::InvalidKey(_) => "CRYPTO_INVALID_KEY",
            Self::InvalidSignature(_) => "CRYPTO_INVALID_SIGNATURE",
        }
    }
}

/// Errors raised by authorization verification.
#[derive(Error, Debug)]
pub enum AuthError {
    /// A supplied signature did not verify over the message.
    #[error("Bad signature: {0}")]
    BadSignature(#[from] CryptoError),
    /// The credited weight did not reach the account's threshold.
    #[error("Insufficient weight: credited {have}, threshold {need}")]
    InsufficientWeight {
        /// The total weight credited by valid signatures and sub-authorizations.
        have: u64,
        /// The account authority's threshold.
        need: u64,
    },
    /// The recursion depth bound was exceeded.
    #[error("Authorization recursion exceeded depth {0}")]
    MaxRecursionDepth(u32),
    /// A delegation cycle was detected between accounts.
    #[error("Authorization cycle detected at account '{0}'")]
    CycleDetected(String),
    /// The authority record itself is malformed.
    #[error("Invalid authority: {0}")]
    InvalidAuthority(String),
    /// A delegated account could not be resolved.
    #[error("Account resolution failed: {0}")]
    Account(#[from] StateError),
}

impl ErrorCode for AuthError {
    fn code(&self) -> &'static str {
        match self {
            Self::BadSignature(_) => "AUTH_BAD_SIGNATURE",
            Self::InsufficientWeight { .. } => "AUTH_INSUFFICIENT_WEIGHT",
            Self::MaxRecursionDepth(_) => "AUTH_MAX_RECURSION_DEPTH",
            Self::CycleDetected(_) => "AUTH_CYCLE_DETECTED",
            Self::InvalidAuthority(_) => "AUTH_INVALID_AUTHORITY",
            Self::Account(e) => e.code(),
        }
    }
}

/// Errors raised by transaction verification and the sign-doc codec.
#[derive(Error, Debug)]
pub enum TxError {
    /// The transaction nonce does not match the account's expected nonce.
    #[error("Invalid nonce: expected {expected}, got {got}")]
    InvalidNonce {
        /// The expected nonce from the signer's account.
        expected: u64,
        /// The nonce supplied by the transaction.
        got: u64,
    },
    /// The transaction is structurally invalid.
    #[error("Invalid transaction: {0}")]
    Invalid(String),
    /// An error occurred during sign-doc serialization.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// An error occurred during sign-doc deserialization.
    #[error("Deserialization error: {0}")]
    Deserialization(String),
    /// Authorization verification failed.
    #[error("Authorization failed: {0}")]
    Auth(#[from] AuthError),
    /// A domain store operation failed.
    #[error("State error: {0}")]
    State(#[from] StateError),
}

impl ErrorCode for TxError {
    fn code(&self) -> &'static str {
        match self {
            Self::InvalidNonce { .. } => "TX_INVALID_NONCE",
            Self::Invalid(_) => "TX_INVALID",
            Self::Serialization(_) => "TX_SERIALIZATION_ERROR",
            Self::Deserialization(_) => "TX_DESERIALIZATION_ERROR",
            Self::Auth(e) => e.code(),
            Self::State(e) => e.code(),
        }
    }
}

/// Errors raised by the module runtime and capability manager.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// A module with the same name has already been registered.
    #[error("Module '{0}' is already registered")]
    DuplicateModule(String),
    /// The named module has not been registered.
    #[error("Module '{0}' not found")]
    ModuleNotFound(String),
    /// A module declares a dependency that is not part of the configuration.
    #[error("Module '{module}' depends on missing module '{dependency}'")]
    MissingDependency {
        /// The module declaring the dependency.
        module: String,
        /// The dependency that could not be resolved.
        dependency: String,
    },
    /// The module dependency graph contains a cycle.
    #[error("Cyclic module dependency involving '{0}'")]
    CyclicDependency(String),
    /// Two modules registered a handler for the same message type.
    #[error("Duplicate handler for message type '{0}'")]
    DuplicateHandler(String),
    /// No handler is registered for the message type.
    #[error("No handler for message type '{0}'")]
    UnknownMsgType(String),
    /// No handler is registered for the query path.
    #[error("No handler for query path '{0}'")]
    UnknownQueryPath(String),
    /// A capability handle was absent where one was required.
    #[error("Capability is nil: {0}")]
    CapabilityNil(String),
    /// A message handler returned an error.
    #[error("Handler error: {0}")]
    Handler(String),
    /// No block is in progress for the requested operation.
    #[error("Invalid block lifecycle: {0}")]
    Lifecycle(String),
    /// Transaction verification failed.
    #[error("Transaction error: {0}")]
    Tx(#[from] TxError),
    /// A domain store operation failed.
    #[error("State error: {0}")]
    State(#[from] StateError),
    /// A raw store operation failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl ErrorCode for RuntimeError {
    fn code(&self) -> &'static str {
        match self {
            Self::DuplicateModule(_) => "RUNTIME_DUPLICATE_MODULE",
            Self::ModuleNotFound(_) => "RUNTIME_MODULE_NOT_FOUND",
            Self::MissingDependency { .. } => "RUNTIME_MISSING_DEPENDENCY",
            Self::CyclicDependency(_) => "RUNTIME_CYCLIC_DEPENDENCY",
            Self::DuplicateHandler(_) => "RUNTIME_DUPLICATE_HANDLER",
            Self::UnknownMsgType(_) => "RUNTIME_UNKNOWN_MSG_TYPE",
            Self::UnknownQueryPath(_) => "RUNTIME_UNKNOWN_QUERY_PATH",
            Self::CapabilityNil(_) => "RUNTIME_CAPABILITY_NIL",
            Self::Handler(_) => "RUNTIME_HANDLER_ERROR",
            Self::Lifecycle(_) => "RUNTIME_LIFECYCLE_ERROR",
            Self::Tx(e) => e.code(),
            Self::State(e) => e.code(),
            Self::Store(e) => e.code(),
        }
    }
}

impl From<AuthError> for RuntimeError {
    fn from(e: AuthError) -> Self {
        RuntimeError::Tx(TxError::Auth(e))
    }
}
