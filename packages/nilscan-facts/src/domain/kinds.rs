//! Producer and consumer kinds
//!
//! Closed sum types for the two sides of a trigger. Producers describe where
//! a possibly-nil value came from; consumers describe a use that requires
//! non-nil. Both sides cross the package boundary inside residual
//! implication edges, so they live in the wire crate and round-trip through
//! the codec. Exhaustive matches at every use site keep new kinds from
//! being forgotten.

use serde::{Deserialize, Serialize};

/// Where a possibly-nil value originates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProducerKind {
    /// Result `index` of a called function or method
    FuncReturn { index: u8 },
    /// Result `index` of an interface method (affiliation analysis)
    InterfaceReturn { index: u8 },
    /// Read of a struct field
    FieldRead,
    /// Read of a package-level variable
    GlobalRead,
    /// Value of parameter `index` as observed inside the function body
    ParamIn { index: u8 },
    /// Value of the receiver as observed inside the method body
    ReceiverIn,
    /// Local declared without assignment; zero value of a nilable type
    UnassignedLocal,
    /// A literal `nil`
    LiteralNil,
    /// Unconditionally non-nil: address-of, composite literal, `new`/`make`,
    /// function object, recognized error constructor
    LiteralNonnil,
    /// Result of a trusted check helper, always non-nil
    TrustedResult,
    /// Element read out of a map/slice/channel
    DeepRead,
    /// Map index expression without a trailing ok-guard
    MapIndex,
    /// Comma-ok guarded read (map index, channel receive, type assert)
    OkRead,
    /// Result `index` duplicated through an inferred nonnil-to-nonnil
    /// contract at a call site
    ContractedReturn { index: u8 },
}

impl ProducerKind {
    /// Kinds whose value needs a guard witness on the consumer side before
    /// it may be treated as the guarded (non-nil) variant.
    pub fn needs_guard(&self) -> bool {
        matches!(self, ProducerKind::MapIndex | ProducerKind::OkRead)
    }

    /// Kinds that answer their own nilability without consulting a site.
    pub fn literal_answer(&self) -> Option<super::Nilability> {
        match self {
            ProducerKind::LiteralNil | ProducerKind::UnassignedLocal => {
                Some(super::Nilability::Nilable)
            }
            ProducerKind::LiteralNonnil | ProducerKind::TrustedResult => {
                Some(super::Nilability::Nonnil)
            }
            _ => None,
        }
    }
}

/// A use that requires a non-nil value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConsumerKind {
    /// Pointer dereference `*x`
    Deref,
    /// Field access through a pointer `x.f`
    FieldAccess,
    /// Receiver of a method call `x.m()`
    MethodRecv,
    /// Argument `index` of a call
    CallArg { index: u8 },
    /// Calling a function-typed value
    CallExpr,
    /// Index into a map/slice `x[i]`
    Index,
    /// Value returned at result position `index`
    ReturnAt { index: u8 },
    /// Value assigned into a struct field
    FieldAssign,
    /// Value assigned into a package-level variable
    GlobalAssign,
    /// Value assigned into a map/slice element
    DeepAssign,
    /// Parameter `index` of an interface method (contravariance)
    InterfaceParam { index: u8 },
}
