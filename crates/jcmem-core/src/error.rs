use std::fmt;
use thiserror::Error as ThisError;

///
/// CardError
///
/// Structured runtime error carrying the exception class an applet would
/// observe plus the numeric reason code it branches on.
///

#[derive(Debug, ThisError)]
#[error("{message}")]
pub struct CardError {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,

    /// Typed reason code.
    /// The variant (if present) must correspond to `class`.
    pub detail: Option<ErrorDetail>,
}

impl CardError {
    /// Construct a CardError without a reason detail.
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
            detail: None,
        }
    }

    fn with_detail(
        class: ErrorClass,
        origin: ErrorOrigin,
        detail: ErrorDetail,
        message: impl Into<String>,
    ) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
            detail: Some(detail),
        }
    }

    pub(crate) fn system(origin: ErrorOrigin, reason: SystemReason, message: impl Into<String>) -> Self {
        Self::with_detail(ErrorClass::System, origin, ErrorDetail::System(reason), message)
    }

    pub(crate) fn transaction(reason: TransactionReason, message: impl Into<String>) -> Self {
        Self::with_detail(
            ErrorClass::Transaction,
            ErrorOrigin::Transaction,
            ErrorDetail::Transaction(reason),
            message,
        )
    }

    pub(crate) fn util(origin: ErrorOrigin, reason: UtilReason, message: impl Into<String>) -> Self {
        Self::with_detail(ErrorClass::Util, origin, ErrorDetail::Util(reason), message)
    }

    pub(crate) fn bio(reason: BioReason, message: impl Into<String>) -> Self {
        Self::with_detail(ErrorClass::Bio, ErrorOrigin::Bio, ErrorDetail::Bio(reason), message)
    }

    pub fn external(reason: ExternalReason, message: impl Into<String>) -> Self {
        Self::with_detail(
            ErrorClass::External,
            ErrorOrigin::Store,
            ErrorDetail::External(reason),
            message,
        )
    }

    pub(crate) fn security(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Security, origin, message)
    }

    pub(crate) fn index_out_of_bounds(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::ArrayIndexOutOfBounds, origin, message)
    }

    pub(crate) fn null_pointer(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::NullPointer, origin, message)
    }

    pub(crate) fn power_loss(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::PowerLoss, origin, message)
    }

    /// Numeric reason code, or 0 for classes that carry none.
    #[must_use]
    pub const fn reason_code(&self) -> u16 {
        match &self.detail {
            Some(detail) => detail.code(),
            None => 0,
        }
    }

    #[must_use]
    pub const fn is_buffer_full(&self) -> bool {
        matches!(
            self.detail,
            Some(ErrorDetail::Transaction(TransactionReason::BufferFull))
        )
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}:{}: {}", self.origin, self.class, self.message)
    }
}

///
/// ErrorDetail
///
/// Reason code attached to a [`CardError`]. Codes are part of the applet
/// ABI and must never be renumbered.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, ThisError)]
pub enum ErrorDetail {
    #[error("{0}")]
    System(SystemReason),
    #[error("{0}")]
    Transaction(TransactionReason),
    #[error("{0}")]
    Util(UtilReason),
    #[error("{0}")]
    Bio(BioReason),
    #[error("{0}")]
    External(ExternalReason),
}

impl ErrorDetail {
    #[must_use]
    pub const fn code(self) -> u16 {
        match self {
            Self::System(reason) => reason as u16,
            Self::Transaction(reason) => reason as u16,
            Self::Util(reason) => reason as u16,
            Self::Bio(reason) => reason as u16,
            Self::External(reason) => reason as u16,
        }
    }
}

///
/// SystemReason
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, ThisError)]
#[repr(u16)]
pub enum SystemReason {
    #[error("illegal value")]
    IllegalValue = 1,
    #[error("no transient space")]
    NoTransientSpace = 2,
    #[error("illegal transient request")]
    IllegalTransient = 3,
    #[error("illegal AID")]
    IllegalAid = 4,
    #[error("no resource")]
    NoResource = 5,
    #[error("illegal use")]
    IllegalUse = 6,
}

///
/// TransactionReason
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, ThisError)]
#[repr(u16)]
pub enum TransactionReason {
    #[error("transaction in progress")]
    InProgress = 1,
    #[error("transaction not in progress")]
    NotInProgress = 2,
    #[error("commit buffer full")]
    BufferFull = 3,
    #[error("internal transaction failure")]
    InternalFailure = 4,
    #[error("illegal use")]
    IllegalUse = 5,
}

///
/// UtilReason
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, ThisError)]
#[repr(u16)]
pub enum UtilReason {
    #[error("illegal value")]
    IllegalValue = 1,
    #[error("type mismatched")]
    TypeMismatched = 2,
}

///
/// BioReason
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, ThisError)]
#[repr(u16)]
pub enum BioReason {
    #[error("illegal value")]
    IllegalValue = 1,
    #[error("invalid data")]
    InvalidData = 2,
    #[error("no such bio template")]
    NoSuchBioTemplate = 3,
    #[error("no templates enrolled")]
    NoTemplatesEnrolled = 4,
    #[error("illegal use")]
    IllegalUse = 5,
}

///
/// ExternalReason
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, ThisError)]
#[repr(u16)]
pub enum ExternalReason {
    #[error("no such subsystem")]
    NoSuchSubsystem = 1,
    #[error("invalid parameter")]
    InvalidParam = 2,
    #[error("internal error")]
    InternalError = 3,
}

///
/// ErrorClass
/// Exception taxonomy as seen by applet code.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    System,
    Transaction,
    Util,
    Bio,
    External,
    Security,
    ArrayIndexOutOfBounds,
    NullPointer,
    /// Simulated card tear; never produced on real silicon paths.
    PowerLoss,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::System => "system",
            Self::Transaction => "transaction",
            Self::Util => "util",
            Self::Bio => "bio",
            Self::External => "external",
            Self::Security => "security",
            Self::ArrayIndexOutOfBounds => "array_index_out_of_bounds",
            Self::NullPointer => "null_pointer",
            Self::PowerLoss => "power_loss",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
/// Subsystem that raised the error.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Store,
    Transaction,
    Array,
    Sensitive,
    Bio,
    Image,
    Config,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Store => "store",
            Self::Transaction => "transaction",
            Self::Array => "array",
            Self::Sensitive => "sensitive",
            Self::Bio => "bio",
            Self::Image => "image",
            Self::Config => "config",
        };
        write!(f, "{label}")
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_codes_match_card_abi() {
        assert_eq!(ErrorDetail::System(SystemReason::IllegalValue).code(), 1);
        assert_eq!(ErrorDetail::System(SystemReason::NoTransientSpace).code(), 2);
        assert_eq!(ErrorDetail::System(SystemReason::IllegalTransient).code(), 3);
        assert_eq!(ErrorDetail::System(SystemReason::IllegalUse).code(), 6);
        assert_eq!(ErrorDetail::Transaction(TransactionReason::InProgress).code(), 1);
        assert_eq!(ErrorDetail::Transaction(TransactionReason::NotInProgress).code(), 2);
        assert_eq!(ErrorDetail::Transaction(TransactionReason::BufferFull).code(), 3);
        assert_eq!(ErrorDetail::Util(UtilReason::IllegalValue).code(), 1);
        assert_eq!(ErrorDetail::Util(UtilReason::TypeMismatched).code(), 2);
        assert_eq!(ErrorDetail::Bio(BioReason::NoTemplatesEnrolled).code(), 4);
        assert_eq!(ErrorDetail::External(ExternalReason::InternalError).code(), 3);
    }

    #[test]
    fn classes_without_reason_report_zero() {
        let err = CardError::security(ErrorOrigin::Array, "integrity-sensitive destination");

        assert_eq!(err.reason_code(), 0);
        assert_eq!(
            err.display_with_class(),
            "array:security: integrity-sensitive destination"
        );
    }
}
