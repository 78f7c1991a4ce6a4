////////////////////////////////////////////////////////////////////////////////
// This file is part of "Astra Meta", a runtime reflection layer for Rust     //
// types.                                                                     //
//                                                                            //
// This work is proprietary software with source-available code.              //
//                                                                            //
// To copy, use, distribute, or contribute to this work, you must agree to    //
// the terms of the General License Agreement:                                //
//                                                                            //
// https://github.com/Eliah-Lakhin/ad-astra/blob/master/EULA.md               //
//                                                                            //
// The agreement grants a Basic Commercial License, allowing you to use       //
// this work in non-commercial and limited commercial products with a total   //
// gross revenue cap. To remove this commercial limit for one of your         //
// products, you must acquire a Full Commercial License.                      //
//                                                                            //
// If you contribute to the source code, documentation, or related materials, //
// you must grant me an exclusive license to these contributions.             //
// Contributions are governed by the "Contributions" section of the General   //
// License Agreement.                                                         //
//                                                                            //
// Copying the work in parts is strictly forbidden, except as permitted       //
// under the General License Agreement.                                       //
//                                                                            //
// If you do not or cannot agree to the terms of this Agreement,              //
// do not use this work.                                                      //
//                                                                            //
// This work is provided "as is", without any warranties, express or implied, //
// except where such disclaimers are legally invalid.                         //
//                                                                            //
// Copyright (c) 2024 Ilya Lakhin (Илья Александрович Лахин).                 //
// All rights reserved.                                                       //
////////////////////////////////////////////////////////////////////////////////

use std::{
    error::Error as StdError,
    fmt::{Debug, Display, Formatter},
    result::Result as StdResult,
};

use compact_str::CompactString;

use crate::runtime::{MemberKind, Origin};

/// A result of a reflection declaration, which can either be a normal value
/// or a [MetaError].
pub type MetaResult<T> = StdResult<T, MetaError>;

/// A helper trait for the [MetaResult] object.
///
/// This trait is automatically implemented for MetaResult and provides the
/// [expect_blame](Self::expect_blame) function, which either unwraps the
/// underlying value or panics pointing to the Rust code where the rejected
/// declaration [originated](MetaError::origin).
pub trait MetaResultExt {
    /// The [Ok] type of the underlying [Result].
    type OkType;

    /// If the result is [Ok], returns the underlying data; otherwise, panics
    /// at the location where the failed declaration was made.
    fn expect_blame(self, message: &str) -> Self::OkType;
}

impl<T> MetaResultExt for MetaResult<T> {
    type OkType = T;

    #[inline(always)]
    fn expect_blame(self, message: &str) -> Self::OkType {
        match self {
            Ok(ok) => ok,
            Err(error) => error.origin().blame(&format!("{message}\n{error}")),
        }
    }
}

/// A defect in the reflection declarations.
///
/// The [Factory](crate::runtime::Factory) checks every declaration before it
/// touches the registry, so a declaration that returns an error leaves the
/// registry state unchanged.
///
/// Failures of the type-erased calls (argument mismatches, wrong instance
/// types, writes into read-only data) are not errors of this kind: they are
/// reported through the [Nil Cell](crate::runtime::Cell::nil) or a `false`
/// flag.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum MetaError {
    /// An entity with the same identity has already been declared.
    Duplicate {
        /// The Rust code of the rejected declaration.
        origin: Origin,

        /// The Rust code of the previous declaration.
        previous: Origin,

        /// The kind of the declared entity.
        kind: MemberKind,

        /// The Rust name of the type that owns the entity.
        owner: &'static str,

        /// The name of the entity, or its signature if the entity is unnamed.
        member: CompactString,
    },

    /// The name of the declared type hashes to the same id as the name of
    /// another registered type.
    IdCollision {
        /// The Rust code of the rejected declaration.
        origin: Origin,

        /// The Rust code where the other type has been declared.
        previous: Origin,

        /// The name of the declared type.
        name: CompactString,

        /// The name of the other type.
        other: CompactString,

        /// The colliding id.
        id: u64,
    },

    /// Two properties of the same entity have equal keys.
    DuplicateProperty {
        /// The Rust code of the rejected declaration.
        origin: Origin,

        /// The Rust name of the type that owns the entity.
        owner: &'static str,

        /// The Rust name of the property key type.
        key: &'static str,
    },
}

impl Display for MetaError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Duplicate {
                previous,
                kind,
                owner,
                member,
                ..
            } => match member.is_empty() {
                true => formatter.write_fmt(format_args!(
                    "{kind} of '{owner}' already declared in {previous}",
                )),

                false => formatter.write_fmt(format_args!(
                    "{kind} '{member}' of '{owner}' already declared in {previous}",
                )),
            },

            Self::IdCollision {
                previous,
                name,
                other,
                id,
                ..
            } => formatter.write_fmt(format_args!(
                "type name '{name}' has the same id {id:#018x} as type name '{other}' \
                declared in {previous}",
            )),

            Self::DuplicateProperty { owner, key, .. } => formatter.write_fmt(format_args!(
                "duplicate property key of '{key}' type in the declaration of '{owner}'",
            )),
        }
    }
}

impl StdError for MetaError {}

impl MetaError {
    /// Returns the Rust code of the rejected declaration.
    #[inline(always)]
    pub fn origin(&self) -> Origin {
        match self {
            Self::Duplicate { origin, .. } => *origin,
            Self::IdCollision { origin, .. } => *origin,
            Self::DuplicateProperty { origin, .. } => *origin,
        }
    }

    /// Returns the Rust code of the previous declaration that conflicts with
    /// the rejected one, if any.
    #[inline(always)]
    pub fn previous(&self) -> Option<Origin> {
        match self {
            Self::Duplicate { previous, .. } => Some(*previous),
            Self::IdCollision { previous, .. } => Some(*previous),
            Self::DuplicateProperty { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use compact_str::CompactString;

    use crate::runtime::{MemberKind, MetaError, MetaResult, MetaResultExt, Origin};

    #[test]
    fn test_error_display() {
        let error = MetaError::Duplicate {
            origin: Origin::caller(),
            previous: Origin::nil(),
            kind: MemberKind::Function,
            owner: "app::Player",
            member: CompactString::from("jump"),
        };

        assert_eq!(
            error.to_string(),
            "function 'jump' of 'app::Player' already declared in [?]",
        );
        assert_eq!(error.previous(), Some(Origin::nil()));
        assert!(!error.origin().is_nil());

        let error = MetaError::Duplicate {
            origin: Origin::caller(),
            previous: Origin::nil(),
            kind: MemberKind::Destructor,
            owner: "app::Player",
            member: CompactString::default(),
        };

        assert_eq!(
            error.to_string(),
            "destructor of 'app::Player' already declared in [?]",
        );
    }

    #[test]
    #[should_panic(expected = "declaration failed")]
    fn test_error_blame() {
        let result: MetaResult<()> = Err(MetaError::DuplicateProperty {
            origin: Origin::caller(),
            owner: "app::Player",
            key: "&str",
        });

        result.expect_blame("declaration failed");
    }
}
